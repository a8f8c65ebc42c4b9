//! Process spawning and management for the agent CLI.

use crate::error::{Error, Result};
use crate::stream::read_stderr;
use parking_lot::Mutex;
use std::io::{self, Write};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread;
use tracing::{debug, info};

/// Handle to a running CLI process.
///
/// Owns the child and the thread draining its stderr. Dropping a handle that
/// was never waited on kills the process.
pub struct ProcessHandle {
    child: Option<Child>,
    stderr_thread: Option<thread::JoinHandle<String>>,
}

impl ProcessHandle {
    /// Spawns the command with all three standard streams piped.
    ///
    /// Returns the handle, the writer for the process input and the raw
    /// process output for the read loop.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SpawnFailed`] if the process cannot be started.
    pub fn spawn(mut cmd: Command) -> Result<(Self, ProcessInput, ChildStdout)> {
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let mut child = cmd.spawn().map_err(|e| Error::SpawnFailed { source: e })?;
        info!(pid = child.id(), program = ?cmd.get_program(), "spawned agent process");

        let stderr_thread = child
            .stderr
            .take()
            .map(|err| thread::spawn(move || read_stderr(err)));
        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let handle = Self {
            child: Some(child),
            stderr_thread,
        };

        match (stdin, stdout) {
            (Some(stdin), Some(stdout)) => Ok((handle, ProcessInput::new(stdin), stdout)),
            _ => Err(Error::SpawnFailed {
                source: io::Error::other("process streams were not piped"),
            }),
        }
    }

    /// The OS process id, while the process is owned by this handle.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// Waits for the process to exit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProcessFailed`] with the captured stderr if the
    /// process exited unsuccessfully, or [`Error::WaitFailed`] if the status
    /// could not be collected.
    pub fn wait(&mut self) -> Result<()> {
        let Some(child) = self.child.as_mut() else {
            return Ok(());
        };
        let status = child.wait().map_err(|e| Error::WaitFailed { source: e })?;
        self.child = None;
        let stderr = self
            .stderr_thread
            .take()
            .and_then(|handle| handle.join().ok())
            .filter(|text| !text.trim().is_empty());
        if status.success() {
            debug!("agent process exited cleanly");
            Ok(())
        } else {
            Err(Error::ProcessFailed {
                exit_code: status.code(),
                stderr,
            })
        }
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        if let Some(ref mut child) = self.child {
            let _ = child.kill();
            let _ = child.wait();
        }
        if let Some(handle) = self.stderr_thread.take() {
            let _ = handle.join();
        }
    }
}

/// The write side of the process connection.
///
/// Each line is written and flushed under a single lock so concurrent callers
/// never interleave partial lines.
pub struct ProcessInput {
    writer: Mutex<Option<Box<dyn Write + Send>>>,
}

impl ProcessInput {
    /// Wraps a writer, normally the child's stdin.
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Mutex::new(Some(Box::new(writer))),
        }
    }

    /// Writes one line followed by a newline and flushes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InputClosed`] after `close`, or
    /// [`Error::StdinWriteFailed`] if the write fails.
    pub fn write_line(&self, line: &str) -> Result<()> {
        let mut guard = self.writer.lock();
        let writer = guard.as_mut().ok_or(Error::InputClosed)?;
        writer
            .write_all(line.as_bytes())
            .and_then(|()| writer.write_all(b"\n"))
            .and_then(|()| writer.flush())
            .map_err(|e| Error::StdinWriteFailed { source: e })
    }

    /// Closes the input stream. Closing twice is harmless.
    ///
    /// Returns `true` if this call closed the stream.
    pub fn close(&self) -> bool {
        if let Some(mut writer) = self.writer.lock().take() {
            let _ = writer.flush();
            debug!("closed agent process input");
            true
        } else {
            debug!("agent process input already closed");
            false
        }
    }

    /// Whether `close` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.writer.lock().is_none()
    }
}
