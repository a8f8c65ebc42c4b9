//! Outbound user turns and control requests.
//!
//! Every document written to the process is a single JSON line:
//!
//! ```text
//! {"type":"user","message":{"role":"user","content":"..."},"session_id":"..."}
//! {"type":"control_request","request_id":"...","request":{"subtype":"interrupt"}}
//! ```

use serde_json::{json, Value};

/// Sender name used when none is given.
pub const DEFAULT_SENDER: &str = "User";

/// Sender name that wraps the text in a system-message envelope.
pub const SYSTEM_SENDER: &str = "system";

/// A user turn waiting to be formatted and sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserMessage {
    /// The raw text typed by the sender.
    pub text: String,
    /// Who is speaking.
    pub sender: String,
    /// Extra context blocks appended after the text.
    pub context: Vec<String>,
}

impl Default for UserMessage {
    fn default() -> Self {
        Self::new("")
    }
}

impl UserMessage {
    /// Creates a message from the default sender.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: DEFAULT_SENDER.to_string(),
            context: Vec::new(),
        }
    }

    /// Creates a message wrapped as a system message.
    #[must_use]
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(text).from_sender(SYSTEM_SENDER)
    }

    /// Sets the sender name.
    #[must_use]
    pub fn from_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = sender.into();
        self
    }

    /// Appends a block of additional context.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    /// Whether the text is empty or only whitespace.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Whether this message comes from the system sender.
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.sender.eq_ignore_ascii_case(SYSTEM_SENDER)
    }

    /// Renders the text the process receives as the user turn.
    #[must_use]
    pub fn format(&self) -> String {
        let mut formatted = if self.is_system() {
            format!("<system-message>\n{}\n</system-message>", self.text)
        } else {
            format!("{}: {}", self.sender, self.text)
        };
        let context: Vec<&str> = self
            .context
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .collect();
        if !context.is_empty() {
            formatted.push_str("\n\n<additional-context>\n");
            for block in context {
                formatted.push_str(block);
                formatted.push('\n');
            }
            formatted.push_str("</additional-context>");
        }
        formatted
    }
}

/// The wire document for a user turn; `session_id` is omitted when unknown.
#[must_use]
pub fn user_turn(content: &str, session_id: Option<&str>) -> Value {
    let mut payload = json!({
        "type": "user",
        "message": {
            "role": "user",
            "content": content,
        },
    });
    if let (Some(id), Some(map)) = (session_id, payload.as_object_mut()) {
        map.insert("session_id".to_string(), Value::String(id.to_string()));
    }
    payload
}

/// The wire document for an interrupt request.
#[must_use]
pub fn interrupt_request(request_id: &str) -> Value {
    json!({
        "type": "control_request",
        "request_id": request_id,
        "request": { "subtype": "interrupt" },
    })
}

/// Allocates a fresh correlation id for a control request.
#[must_use]
pub fn new_request_id() -> String {
    format!("req_{}", uuid::Uuid::new_v4().simple())
}
