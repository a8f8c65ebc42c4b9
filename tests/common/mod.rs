//! Helpers shared by the integration tests.

#![allow(dead_code)]

use agent_cli_session::{AgentConfig, LaunchCommand};
use serde_json::{Map, Value};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn has_sh() -> bool {
    std::process::Command::new("sh")
        .arg("-c")
        .arg("command -v cat")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// A config whose process is `sh -c <script>` running in `dir`.
pub fn sh_config(dir: &Path, script: &str) -> AgentConfig {
    AgentConfig::new().with_sandbox_dir(dir).with_launch(
        LaunchCommand::new("sh")
            .arg("-c")
            .arg(script)
            .current_dir(dir),
    )
}

/// A config whose process echoes every input line back as output.
pub fn echo_config(dir: &Path) -> AgentConfig {
    sh_config(dir, "exec cat")
}

pub fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

pub fn control_response(request_id: &str, subtype: &str) -> Map<String, Value> {
    object(serde_json::json!({
        "type": "control_response",
        "response": {
            "subtype": subtype,
            "request_id": request_id,
        },
    }))
}

/// An in-memory writer whose contents stay readable after it is moved.
#[derive(Clone, Default)]
pub struct SharedBuffer(pub Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().expect("buffer lock")).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("buffer lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
