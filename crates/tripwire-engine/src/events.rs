//! Event bus for host occurrences
//!
//! The host delivers typed occurrences into the bus; nodes subscribe during
//! `init`. Listeners are keyed by the event's concrete type, or by a specific
//! variant for enum-like event kinds, and every listener sees both the
//! "before" and the "after" broadcast of an occurrence.
//!
//! Delivery is synchronous and in registration order. A listener that fails
//! or panics is logged and skipped; the remaining listeners still run.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::Result;
use crate::value::StructuredValue;

/// Key a listener is registered under
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EventKey {
    type_id: TypeId,
    type_name: &'static str,
    variant: Option<&'static str>,
}

impl EventKey {
    /// Key for every occurrence of type `E`
    pub fn of<E: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<E>(),
            type_name: std::any::type_name::<E>(),
            variant: None,
        }
    }

    /// Key for one variant of an enum-like event type
    pub fn variant<E: ?Sized + 'static>(variant: &'static str) -> Self {
        Self {
            variant: Some(variant),
            ..Self::of::<E>()
        }
    }

    /// Short type name, without the module path
    pub fn type_name(&self) -> &'static str {
        self.type_name.rsplit("::").next().unwrap_or(self.type_name)
    }

    pub fn variant_name(&self) -> Option<&'static str> {
        self.variant
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.variant {
            Some(variant) => write!(f, "{}::{}", self.type_name(), variant),
            None => f.write_str(self.type_name()),
        }
    }
}

/// An occurrence the host can fire
///
/// Events are structured values so a listener node can publish them into the
/// variable context and fields can read `{{event.player.name}}`.
pub trait Event: StructuredValue + Any {
    /// Key this occurrence is delivered under
    fn key(&self) -> EventKey {
        EventKey::of::<Self>()
    }
}

/// A registered listener; receives the event and whether this is the
/// "before" broadcast
pub type Listener = Arc<dyn Fn(&Arc<dyn Event>, bool) -> Result<()> + Send + Sync>;

/// Adapt a closure over a concrete event type into a [`Listener`]
///
/// Events of any other type are ignored.
pub fn listener<E, F>(f: F) -> Listener
where
    E: Event,
    F: Fn(&E, bool) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(move |event: &Arc<dyn Event>, before: bool| {
        let any: &dyn Any = &**event;
        match any.downcast_ref::<E>() {
            Some(event) => f(event, before),
            None => Ok(()),
        }
    })
}

/// Multi-listener registry keyed by [`EventKey`]
#[derive(Default)]
pub struct EventBus {
    listeners: HashMap<EventKey, Vec<Listener>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener; the returned handle removes it again
    pub fn on(&mut self, key: EventKey, listener: Listener) -> Listener {
        log::debug!("Listener registered for {}", key);
        self.listeners.entry(key).or_default().push(listener.clone());
        listener
    }

    /// Remove one listener by identity; true if it was registered
    pub fn remove(&mut self, key: &EventKey, listener: &Listener) -> bool {
        let Some(list) = self.listeners.get_mut(key) else {
            return false;
        };
        let Some(pos) = list.iter().position(|l| Arc::ptr_eq(l, listener)) else {
            return false;
        };
        list.remove(pos);
        if list.is_empty() {
            self.listeners.remove(key);
        }
        true
    }

    /// Listeners for a key, in registration order
    pub fn listeners(&self, key: &EventKey) -> Vec<Listener> {
        self.listeners.get(key).cloned().unwrap_or_default()
    }

    /// Deliver an event to every listener registered for its key
    ///
    /// Returns the number of listeners that failed.
    pub fn fire(&self, event: &Arc<dyn Event>, before: bool) -> usize {
        deliver(&self.listeners(&event.key()), event, before)
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }

    /// Total number of registered listeners
    pub fn len(&self) -> usize {
        self.listeners.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

/// Invoke each listener in order, isolating failures and panics
pub fn deliver(listeners: &[Listener], event: &Arc<dyn Event>, before: bool) -> usize {
    let mut failures = 0;
    for listener in listeners {
        match catch_unwind(AssertUnwindSafe(|| listener(event, before))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                failures += 1;
                log::error!("Listener for {} failed: {}", event.key(), e);
            }
            Err(_) => {
                failures += 1;
                log::error!("Listener for {} panicked", event.key());
            }
        }
    }
    failures
}

/// Name → event type lookup used to resolve type-valued fields
#[derive(Debug, Clone, Default)]
pub struct TypeCatalog {
    types: HashMap<String, EventKey>,
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the whole type `E` under `name`
    pub fn register<E: Event>(&mut self, name: impl Into<String>) {
        self.register_key(name, EventKey::of::<E>());
    }

    /// Register an explicit key (e.g. one enum variant) under `name`
    pub fn register_key(&mut self, name: impl Into<String>, key: EventKey) {
        self.types.insert(name.into(), key);
    }

    pub fn get(&self, name: &str) -> Option<EventKey> {
        self.types.get(name).copied()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WorkflowError;
    use crate::value::Value;
    use parking_lot::Mutex;

    #[derive(Debug)]
    struct PlayerJoin {
        name: String,
    }

    impl StructuredValue for PlayerJoin {
        fn get_field(&self, name: &str) -> Option<Value> {
            (name == "name").then(|| Value::from(self.name.as_str()))
        }
    }

    impl Event for PlayerJoin {}

    #[derive(Debug)]
    enum Trigger {
        Update,
        Shock,
    }

    impl StructuredValue for Trigger {
        fn get_field(&self, _name: &str) -> Option<Value> {
            None
        }
    }

    impl Event for Trigger {
        fn key(&self) -> EventKey {
            match self {
                Self::Update => EventKey::variant::<Self>("Update"),
                Self::Shock => EventKey::variant::<Self>("Shock"),
            }
        }
    }

    fn join(name: &str) -> Arc<dyn Event> {
        Arc::new(PlayerJoin {
            name: name.to_string(),
        })
    }

    fn recording(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> Listener {
        let log = log.clone();
        listener::<PlayerJoin, _>(move |event, before| {
            log.lock().push(format!("{}:{}:{}", tag, event.name, before));
            Ok(())
        })
    }

    #[test]
    fn test_delivery_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();
        let key = EventKey::of::<PlayerJoin>();

        bus.on(key, recording(&log, "first"));
        bus.on(key, recording(&log, "second"));
        bus.fire(&join("a"), true);

        assert_eq!(*log.lock(), vec!["first:a:true", "second:a:true"]);
    }

    #[test]
    fn test_remove_listener() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();
        let key = EventKey::of::<PlayerJoin>();

        let first = bus.on(key, recording(&log, "first"));
        bus.on(key, recording(&log, "second"));

        assert!(bus.remove(&key, &first));
        assert!(!bus.remove(&key, &first));

        bus.fire(&join("b"), false);
        assert_eq!(*log.lock(), vec!["second:b:false"]);
        assert_eq!(bus.len(), 1);
    }

    #[test]
    fn test_failing_listener_does_not_block_others() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();
        let key = EventKey::of::<PlayerJoin>();

        bus.on(
            key,
            listener::<PlayerJoin, _>(|_, _| Err(WorkflowError::Listener("boom".to_string()))),
        );
        bus.on(key, listener::<PlayerJoin, _>(|_, _| panic!("listener panic")));
        bus.on(key, recording(&log, "survivor"));

        let failures = bus.fire(&join("c"), true);
        assert_eq!(failures, 2);
        assert_eq!(*log.lock(), vec!["survivor:c:true"]);
    }

    #[test]
    fn test_enum_variants_have_distinct_keys() {
        let hits = Arc::new(Mutex::new(0));
        let mut bus = EventBus::new();
        let counter = hits.clone();
        bus.on(
            EventKey::variant::<Trigger>("Shock"),
            Arc::new(move |_, _| {
                *counter.lock() += 1;
                Ok(())
            }),
        );

        bus.fire(&(Arc::new(Trigger::Update) as Arc<dyn Event>), false);
        assert_eq!(*hits.lock(), 0);
        bus.fire(&(Arc::new(Trigger::Shock) as Arc<dyn Event>), false);
        assert_eq!(*hits.lock(), 1);
        assert_eq!(Trigger::Shock.key().to_string(), "Trigger::Shock");
    }

    #[test]
    fn test_type_catalog() {
        let mut catalog = TypeCatalog::new();
        catalog.register::<PlayerJoin>("PlayerJoin");
        catalog.register_key("Shock", EventKey::variant::<Trigger>("Shock"));

        assert_eq!(catalog.get("PlayerJoin"), Some(EventKey::of::<PlayerJoin>()));
        assert_eq!(catalog.names(), vec!["PlayerJoin", "Shock"]);
        assert!(catalog.get("Missing").is_none());
    }
}
