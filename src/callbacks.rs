//! Callback registry and dispatch.
//!
//! Three independent tiers receive each event:
//!
//! 1. the general listener, for every event;
//! 2. typed listeners, keyed by `"{type}_{subtype}"`, `type`, or the `type`
//!    of each element of `message.content`;
//! 3. named callbacks, where a processor derives a value from the event and
//!    history and the listener only runs when that value is non-empty.

use crate::error::Error;
use crate::event::Event;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Listener invoked with an event and the history ending at that event.
pub type EventListener = Arc<dyn Fn(&Event, &[Arc<Event>]) + Send + Sync>;

/// Derives a value from an event and its history; `None` means nothing to report.
pub type Processor = Arc<dyn Fn(&Event, &[Arc<Event>]) -> Option<Value> + Send + Sync>;

type NamedListener = Arc<dyn Fn(&Delivery<'_>) + Send + Sync>;

/// Listener invoked with every failure raised by connect, ask or interrupt.
pub type ErrorListener = Arc<dyn Fn(&Error) + Send + Sync>;

/// What a listener registered through [`CallbackRegistry::register`] receives.
#[derive(Debug, Clone, Copy)]
pub struct Delivery<'a> {
    /// The triggering event.
    pub event: &'a Event,
    /// History up to and including the event.
    pub history: &'a [Arc<Event>],
    /// The processor's derived value, for named callbacks only.
    pub derived: Option<&'a Value>,
}

struct NamedCallback {
    name: String,
    processor: Processor,
    listener: NamedListener,
}

#[derive(Default)]
struct Tables {
    general: Option<EventListener>,
    typed: HashMap<String, Vec<EventListener>>,
    processors: HashMap<String, Processor>,
    named: Vec<NamedCallback>,
    error: Option<ErrorListener>,
}

/// Where a `register` call ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// Paired with a declared processor.
    Named,
    /// Added to the typed table.
    Typed,
}

/// Holds every registered listener and routes events to them.
#[derive(Default)]
pub struct CallbackRegistry {
    tables: RwLock<Tables>,
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tables = self.tables.read();
        let mut typed: Vec<&String> = tables.typed.keys().collect();
        typed.sort();
        f.debug_struct("CallbackRegistry")
            .field("general", &tables.general.is_some())
            .field("typed", &typed)
            .field(
                "named",
                &tables.named.iter().map(|c| &c.name).collect::<Vec<_>>(),
            )
            .field("error", &tables.error.is_some())
            .finish()
    }
}

impl CallbackRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the general listener, replacing any previous one.
    pub fn set_general<F>(&self, listener: F)
    where
        F: Fn(&Event, &[Arc<Event>]) + Send + Sync + 'static,
    {
        self.tables.write().general = Some(Arc::new(listener));
    }

    /// Adds a typed listener under a dispatch key.
    pub fn register_typed<F>(&self, key: impl Into<String>, listener: F)
    where
        F: Fn(&Event, &[Arc<Event>]) + Send + Sync + 'static,
    {
        self.tables
            .write()
            .typed
            .entry(key.into())
            .or_default()
            .push(Arc::new(listener));
    }

    /// Declares a processor so a later `register` under the same name becomes
    /// a named callback instead of a typed one.
    pub fn declare_processor<P>(&self, name: impl Into<String>, processor: P)
    where
        P: Fn(&Event, &[Arc<Event>]) -> Option<Value> + Send + Sync + 'static,
    {
        self.tables
            .write()
            .processors
            .insert(name.into(), Arc::new(processor));
    }

    /// Registers a processor and listener pair under a name.
    ///
    /// Re-registering a name replaces the previous pair in place.
    pub fn register_named<P, F>(&self, name: impl Into<String>, processor: P, listener: F)
    where
        P: Fn(&Event, &[Arc<Event>]) -> Option<Value> + Send + Sync + 'static,
        F: Fn(&Value, &Event) + Send + Sync + 'static,
    {
        let name = name.into();
        let processor: Processor = Arc::new(processor);
        let mut tables = self.tables.write();
        tables.processors.insert(name.clone(), Arc::clone(&processor));
        let listener: NamedListener = Arc::new(move |delivery: &Delivery<'_>| {
            if let Some(value) = delivery.derived {
                listener(value, delivery.event);
            }
        });
        insert_named(&mut tables.named, name, processor, listener);
    }

    /// Registers a listener by name, the `on_<name>` convention.
    ///
    /// If a processor was declared under `name` the listener receives its
    /// derived values in [`Delivery::derived`]; otherwise `name` is used as a
    /// typed dispatch key and the listener receives matching events with
    /// `derived` unset.
    pub fn register<F>(&self, name: impl Into<String>, listener: F) -> Registration
    where
        F: Fn(&Delivery<'_>) + Send + Sync + 'static,
    {
        let name = name.into();
        let mut tables = self.tables.write();
        if let Some(processor) = tables.processors.get(&name).cloned() {
            insert_named(&mut tables.named, name, processor, Arc::new(listener));
            return Registration::Named;
        }
        tables
            .typed
            .entry(name)
            .or_default()
            .push(Arc::new(move |event: &Event, history: &[Arc<Event>]| {
                listener(&Delivery {
                    event,
                    history,
                    derived: None,
                });
            }));
        Registration::Typed
    }

    /// Sets the error hook, replacing any previous one.
    pub fn set_error_listener<F>(&self, listener: F)
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.tables.write().error = Some(Arc::new(listener));
    }

    /// Invokes the error hook, if set.
    pub fn notify_error(&self, err: &Error) {
        let listener = self.tables.read().error.clone();
        if let Some(listener) = listener {
            listener(err);
        }
    }

    /// Whether a processor has been declared under `name`.
    #[must_use]
    pub fn has_processor(&self, name: &str) -> bool {
        self.tables.read().processors.contains_key(name)
    }

    /// Number of typed listeners registered under `key`.
    #[must_use]
    pub fn typed_count(&self, key: &str) -> usize {
        self.tables.read().typed.get(key).map_or(0, Vec::len)
    }

    /// Routes one event to every applicable listener.
    pub fn dispatch(&self, event: &Event, history: &[Arc<Event>]) {
        self.dispatch_with(event, history, |_| {});
    }

    /// Routes one event, running `after_general` between the general tier and
    /// the typed tier.
    ///
    /// Listener handles are taken out of the registry before any of them run,
    /// so listeners may register further callbacks.
    pub fn dispatch_with<H>(&self, event: &Event, history: &[Arc<Event>], after_general: H)
    where
        H: FnOnce(&Event),
    {
        let (general, typed, named) = {
            let tables = self.tables.read();
            let typed: Vec<EventListener> = event
                .dispatch_keys()
                .iter()
                .filter_map(|key| tables.typed.get(key))
                .flatten()
                .cloned()
                .collect();
            let named: Vec<(Processor, NamedListener)> = tables
                .named
                .iter()
                .map(|c| (Arc::clone(&c.processor), Arc::clone(&c.listener)))
                .collect();
            (tables.general.clone(), typed, named)
        };

        if let Some(general) = general {
            general(event, history);
        }
        after_general(event);
        for listener in typed {
            listener(event, history);
        }
        for (processor, listener) in named {
            if let Some(value) = processor(event, history).filter(is_present) {
                listener(&Delivery {
                    event,
                    history,
                    derived: Some(&value),
                });
            }
        }
    }
}

fn insert_named(
    named: &mut Vec<NamedCallback>,
    name: String,
    processor: Processor,
    listener: NamedListener,
) {
    if let Some(existing) = named.iter_mut().find(|c| c.name == name) {
        existing.processor = processor;
        existing.listener = listener;
    } else {
        named.push(NamedCallback {
            name,
            processor,
            listener,
        });
    }
}

/// Whether a derived value is worth reporting.
#[must_use]
pub fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}
