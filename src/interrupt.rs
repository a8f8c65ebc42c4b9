//! Correlates interrupt requests with their control responses.

use crate::event::Event;
use crate::message::UserMessage;
use parking_lot::Mutex;
use serde_json::Value;

#[derive(Debug, Default)]
struct InterruptState {
    pending_ask: Option<UserMessage>,
    request_id: Option<String>,
    exit_deferred: bool,
}

/// What to do once an interrupt has been acknowledged.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Acknowledgement {
    /// The request id that was acknowledged.
    pub request_id: String,
    /// A staged ask to send now.
    pub replay: Option<UserMessage>,
    /// Whether `exit` was requested while the interrupt was in flight.
    pub exit: bool,
}

/// Tracks the in-flight interrupt, a staged follow-up ask and a deferred exit.
///
/// All fields are empty at rest. `arm` records the correlation id; a matching
/// successful `control_response` clears it and hands back the deferred work.
#[derive(Debug, Default)]
pub struct InterruptController {
    state: Mutex<InterruptState>,
}

impl InterruptController {
    /// Creates an idle controller.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages a message to send once the next interrupt is acknowledged.
    pub fn stage_ask(&self, message: UserMessage) {
        self.state.lock().pending_ask = Some(message);
    }

    /// Returns the staged message, if any.
    #[must_use]
    pub fn staged_ask(&self) -> Option<UserMessage> {
        self.state.lock().pending_ask.clone()
    }

    /// Records an interrupt as in flight.
    pub fn arm(&self, request_id: impl Into<String>) {
        self.state.lock().request_id = Some(request_id.into());
    }

    /// Forgets an in-flight interrupt whose request never reached the process.
    ///
    /// Only clears the state when `request_id` is still the armed one.
    pub fn disarm(&self, request_id: &str) {
        let mut state = self.state.lock();
        if state.request_id.as_deref() == Some(request_id) {
            state.request_id = None;
            state.exit_deferred = false;
        }
    }

    /// The correlation id of the in-flight interrupt.
    #[must_use]
    pub fn in_flight(&self) -> Option<String> {
        self.state.lock().request_id.clone()
    }

    /// Whether an interrupt is in flight.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.state.lock().request_id.is_some()
    }

    /// Defers an exit if an interrupt is in flight.
    ///
    /// Returns `true` when the exit was deferred, `false` when the caller
    /// should exit now.
    pub fn defer_exit(&self) -> bool {
        let mut state = self.state.lock();
        if state.request_id.is_some() {
            state.exit_deferred = true;
            true
        } else {
            false
        }
    }

    /// Whether an exit is waiting on the in-flight interrupt.
    #[must_use]
    pub fn exit_deferred(&self) -> bool {
        self.state.lock().exit_deferred
    }

    /// Resolves the in-flight interrupt if `event` is its successful response.
    ///
    /// Responses for other request ids, failed responses and every other
    /// event leave the controller armed and return `None`.
    pub fn acknowledge(&self, event: &Event) -> Option<Acknowledgement> {
        if event.event_type() != Some("control_response") {
            return None;
        }
        let response = event.get("response")?;
        if response.get("subtype").and_then(Value::as_str) != Some("success") {
            return None;
        }
        let responded_to = response.get("request_id").and_then(Value::as_str)?;

        let mut state = self.state.lock();
        if state.request_id.as_deref() != Some(responded_to) {
            return None;
        }
        let request_id = state.request_id.take().unwrap_or_default();
        Some(Acknowledgement {
            request_id,
            replay: state.pending_ask.take(),
            exit: std::mem::take(&mut state.exit_deferred),
        })
    }
}
