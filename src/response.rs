//! Accumulated assistant output for one turn.

use crate::event::Event;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Assistant text and the events that produced it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    /// Concatenated assistant text.
    pub text: String,
    /// Events contributing to this response.
    pub events: Vec<Arc<Event>>,
}

impl Response {
    /// Creates an empty response.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the response to the most recent user turn in `history`.
    ///
    /// Collects every event after the last locally asked `user` event and the
    /// text blocks of the assistant messages among them.
    #[must_use]
    pub fn from_history(history: &[Arc<Event>]) -> Self {
        let start = history
            .iter()
            .rposition(|event| event.is_local() && event.event_type() == Some("user"))
            .map_or(0, |i| i + 1);
        let mut response = Self::new();
        for event in &history[start..] {
            if let Some(text) = assistant_text(event) {
                response.append_text(&text);
            }
            response.add_event(Arc::clone(event));
        }
        response
    }

    /// Records a contributing event.
    pub fn add_event(&mut self, event: Arc<Event>) -> &mut Self {
        self.events.push(event);
        self
    }

    /// Appends text to the response.
    pub fn append_text(&mut self, content: &str) -> &mut Self {
        self.text.push_str(content);
        self
    }

    /// The accumulated text.
    #[must_use]
    pub fn final_text(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Text of the `text` content blocks of an assistant event.
#[must_use]
pub fn assistant_text(event: &Event) -> Option<String> {
    if event.event_type() != Some("assistant") {
        return None;
    }
    let blocks = event.pointer("/message/content")?.as_array()?;
    let text: String = blocks
        .iter()
        .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|block| block.get("text").and_then(Value::as_str))
        .collect();
    Some(text)
}

/// Processor yielding the answer so far whenever an assistant event arrives.
///
/// Intended for [`crate::Agent::create_message_callback`].
#[must_use]
pub fn final_text_processor() -> impl Fn(&Event, &[Arc<Event>]) -> Option<Value> + Send + Sync {
    |event: &Event, history: &[Arc<Event>]| {
        assistant_text(event)?;
        let response = Response::from_history(history);
        Some(Value::String(response.text))
    }
}
