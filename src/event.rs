//! Event model for the stream-json conversation.
//!
//! An [`Event`] is one JSON object exchanged with, or synthesised for, the
//! external process. Events keep every key they were created with; the
//! dispatch layer only reads `type`, `subtype` and `message.content[*].type`.

use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};

/// Where an event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventSource {
    /// Parsed from a line written by the external process.
    Wire,
    /// Synthesised locally to notify listeners about a local action.
    Local,
}

/// One structured message unit of the conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    fields: Map<String, Value>,
    source: EventSource,
}

impl Event {
    /// Parses a single stdout line into a wire event.
    ///
    /// # Errors
    ///
    /// Returns an error if the line is not a JSON object.
    pub fn from_line(line: &str) -> serde_json::Result<Self> {
        let fields = serde_json::from_str::<Map<String, Value>>(line)?;
        Ok(Self::wire(fields))
    }

    /// Wraps an already-decoded object as a wire event.
    #[must_use]
    pub const fn wire(fields: Map<String, Value>) -> Self {
        Self {
            fields,
            source: EventSource::Wire,
        }
    }

    /// Creates a locally synthesised event, stamping it with the current time
    /// unless it already carries a `timestamp`.
    #[must_use]
    pub fn local(mut fields: Map<String, Value>) -> Self {
        if !fields.contains_key("timestamp") {
            fields.insert(
                "timestamp".to_string(),
                Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        Self {
            fields,
            source: EventSource::Local,
        }
    }

    /// The local event announcing a user turn before it is written.
    #[must_use]
    pub fn user_turn(raw_text: &str, formatted: &str, sender: &str) -> Self {
        Self::local(object(json!({
            "type": "user",
            "sender": sender,
            "raw_text": raw_text,
            "message": {
                "role": "user",
                "content": formatted,
            },
        })))
    }

    /// The local event announcing an interrupt request before it is written.
    #[must_use]
    pub fn interrupt_request(request_id: &str) -> Self {
        Self::local(object(json!({
            "type": "control_request",
            "request_id": request_id,
            "request": { "subtype": "interrupt" },
        })))
    }

    /// The `type` field.
    #[must_use]
    pub fn event_type(&self) -> Option<&str> {
        self.fields.get("type").and_then(Value::as_str)
    }

    /// The `subtype` field.
    #[must_use]
    pub fn subtype(&self) -> Option<&str> {
        self.fields.get("subtype").and_then(Value::as_str)
    }

    /// The top-level `session_id` field.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.fields.get("session_id").and_then(Value::as_str)
    }

    /// Looks up a top-level field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Looks up a nested field with a JSON pointer such as `/message/id`.
    #[must_use]
    pub fn pointer(&self, pointer: &str) -> Option<&Value> {
        let path = pointer.strip_prefix('/')?;
        let (head, tail) = path
            .split_once('/')
            .map_or((path, None), |(head, tail)| (head, Some(tail)));
        let value = self.fields.get(&unescape_token(head))?;
        tail.map_or(Some(value), |tail| value.pointer(&format!("/{tail}")))
    }

    /// The `type` of every mapping in `message.content`, in order.
    #[must_use]
    pub fn content_types(&self) -> Vec<&str> {
        self.fields
            .get("message")
            .and_then(|message| message.get("content"))
            .and_then(Value::as_array)
            .map(|blocks| {
                blocks
                    .iter()
                    .filter_map(|block| block.get("type").and_then(Value::as_str))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The typed-listener keys this event triggers, in dispatch order:
    /// `"{type}_{subtype}"`, `type`, then one key per nested content element.
    #[must_use]
    pub fn dispatch_keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        if let Some(event_type) = self.event_type() {
            if let Some(subtype) = self.subtype() {
                keys.push(format!("{event_type}_{subtype}"));
            }
            keys.push(event_type.to_string());
        }
        keys.extend(self.content_types().into_iter().map(String::from));
        keys
    }

    /// Where this event was produced.
    #[must_use]
    pub const fn source(&self) -> EventSource {
        self.source
    }

    /// Whether this event was synthesised locally.
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.source == EventSource::Local
    }

    /// All fields of the event.
    #[must_use]
    pub const fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Consumes the event, returning its fields.
    #[must_use]
    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }

    /// Serialises the event as a single JSON line (without the newline).
    ///
    /// # Errors
    ///
    /// Returns an error if a field cannot be serialised.
    pub fn to_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.fields)
    }
}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn unescape_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}
