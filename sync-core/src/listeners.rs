//! Listener registry and dispatcher.
//!
//! Listeners are keyed by event type and invoked in registration order.
//! Registering the same listener twice means it is called twice.

use roomsync_types::Event;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Error raised by a listener callback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ListenerError(String);

impl ListenerError {
    /// Create an error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    /// The error message.
    pub fn message(&self) -> &str {
        &self.0
    }
}

/// Callback invoked for every dispatched event of a subscribed type.
///
/// Listeners run inline on the polling task and only see a shared
/// reference to the event; they cannot reach the room table.
pub trait EventListener: Send + Sync {
    /// Handle one event.
    fn on_event(&self, event: &Event) -> Result<(), ListenerError>;
}

impl<F> EventListener for F
where
    F: Fn(&Event) -> Result<(), ListenerError> + Send + Sync,
{
    fn on_event(&self, event: &Event) -> Result<(), ListenerError> {
        self(event)
    }
}

/// Ordered multimap from event type to listeners.
#[derive(Default, Clone)]
pub struct ListenerRegistry {
    listeners: HashMap<String, Vec<Arc<dyn EventListener>>>,
}

impl ListenerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listener for `event_type`. No duplicate check.
    pub fn subscribe(&mut self, event_type: &str, listener: Arc<dyn EventListener>) {
        self.listeners
            .entry(event_type.to_string())
            .or_default()
            .push(listener);
    }

    /// Invoke every listener for `event.event_type` in order.
    ///
    /// An unknown type is a no-op. The first listener error stops the
    /// remaining listeners for this event and is returned.
    pub fn dispatch(&self, event: &Event) -> Result<(), ListenerError> {
        let Some(listeners) = self.listeners.get(&event.event_type) else {
            return Ok(());
        };
        for listener in listeners {
            listener.on_event(event)?;
        }
        Ok(())
    }

    /// Number of listeners registered for `event_type`.
    pub fn listener_count(&self, event_type: &str) -> usize {
        self.listeners.get(event_type).map_or(0, Vec::len)
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<&str, usize> = self
            .listeners
            .iter()
            .map(|(k, v)| (k.as_str(), v.len()))
            .collect();
        f.debug_struct("ListenerRegistry")
            .field("listeners", &counts)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomsync_types::Content;
    use std::sync::Mutex;

    fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> Arc<dyn EventListener> {
        let log = Arc::clone(log);
        Arc::new(move |event: &Event| -> Result<(), ListenerError> {
            log.lock()
                .unwrap()
                .push(format!("{}:{}", tag, event.event_type));
            Ok(())
        })
    }

    #[test]
    fn dispatch_preserves_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ListenerRegistry::new();
        registry.subscribe("m.room.message", recorder(&log, "a"));
        registry.subscribe("m.room.message", recorder(&log, "b"));

        registry
            .dispatch(&Event::new("m.room.message", Content::new()))
            .unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:m.room.message", "b:m.room.message"]
        );
    }

    #[test]
    fn duplicate_subscription_fires_twice() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let listener = recorder(&log, "dup");
        let mut registry = ListenerRegistry::new();
        registry.subscribe("m.room.message", Arc::clone(&listener));
        registry.subscribe("m.room.message", listener);

        registry
            .dispatch(&Event::new("m.room.message", Content::new()))
            .unwrap();

        assert_eq!(log.lock().unwrap().len(), 2);
        assert_eq!(registry.listener_count("m.room.message"), 2);
    }

    #[test]
    fn unknown_type_is_a_noop() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ListenerRegistry::new();
        registry.subscribe("m.room.message", recorder(&log, "a"));

        let result = registry.dispatch(&Event::new("com.example.custom", Content::new()));

        assert!(result.is_ok());
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(registry.listener_count("com.example.custom"), 0);
    }

    #[test]
    fn listener_error_stops_later_listeners() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ListenerRegistry::new();
        registry.subscribe(
            "m.room.message",
            Arc::new(|_: &Event| -> Result<(), ListenerError> {
                Err(ListenerError::new("boom"))
            }),
        );
        registry.subscribe("m.room.message", recorder(&log, "after"));

        let err = registry
            .dispatch(&Event::new("m.room.message", Content::new()))
            .unwrap_err();

        assert_eq!(err.message(), "boom");
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn debug_shows_counts_only() {
        let mut registry = ListenerRegistry::new();
        registry.subscribe(
            "m.room.name",
            Arc::new(|_: &Event| -> Result<(), ListenerError> { Ok(()) }),
        );
        let debug = format!("{:?}", registry);
        assert!(debug.contains("m.room.name"));
    }
}
