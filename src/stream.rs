//! Stream reading and parsing for agent CLI output.

use crate::event::Event;
use std::io::{BufRead, BufReader, ErrorKind, Read};
use tracing::{debug, warn};

/// Reads the stdout stream of the agent CLI and decodes one event per line.
pub struct EventReader<R: Read> {
    reader: BufReader<R>,
}

impl<R: Read> EventReader<R> {
    /// Creates a new event reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
        }
    }

    /// Reads until end of stream, handing every decoded event to `on_event`.
    ///
    /// Blank lines are skipped. Lines that are not UTF-8 or not a JSON object
    /// are logged and dropped.
    /// Returns the number of events decoded.
    pub fn for_each_event<F>(mut self, mut on_event: F) -> usize
    where
        F: FnMut(Event),
    {
        let mut buf = Vec::new();
        let mut decoded = 0;
        loop {
            buf.clear();
            match self.reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    let line = match std::str::from_utf8(&buf) {
                        Ok(line) => line,
                        Err(e) => {
                            warn!(error = %e, "skipping output line that is not UTF-8");
                            continue;
                        }
                    };
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    match Event::from_line(trimmed) {
                        Ok(event) => {
                            decoded += 1;
                            on_event(event);
                        }
                        Err(e) => warn!(error = %e, line = trimmed, "skipping malformed output line"),
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    debug!(error = %e, "read error on agent output");
                    break;
                }
            }
        }
        decoded
    }
}

/// Drains stderr and returns everything read, one line per entry.
///
/// Bytes that are not UTF-8 are replaced rather than ending the drain.
pub fn read_stderr<S: Read>(reader: S) -> String {
    let mut buf_reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut captured = String::new();
    loop {
        buf.clear();
        match buf_reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&buf);
                let text = text.trim_end_matches(['\r', '\n']);
                if text.trim().is_empty() {
                    continue;
                }
                debug!(line = %text, "agent stderr");
                if !captured.is_empty() {
                    captured.push('\n');
                }
                captured.push_str(text);
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(_) => break,
        }
    }
    captured
}
