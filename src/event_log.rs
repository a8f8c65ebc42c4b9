//! Append-only, ordered event history.

use crate::event::Event;
use parking_lot::Mutex;
use std::sync::Arc;

/// The ordered history of a session.
///
/// Appending returns the snapshot that includes the appended event and nothing
/// appended after it, so every listener sees a history ending at the event it
/// was invoked for.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<Arc<Event>>>,
}

impl EventLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event and returns the history up to and including it.
    pub fn append(&self, event: Arc<Event>) -> Vec<Arc<Event>> {
        let mut events = self.events.lock();
        events.push(event);
        events.clone()
    }

    /// Returns a copy of the current history.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<Event>> {
        self.events.lock().clone()
    }

    /// Number of events appended so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether nothing has been appended yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}
