//! Sample host events
//!
//! A real host fires its own event types; these stand in for them so graphs
//! using the `EventListener` node have something to select.

use tripwire_engine::{Event, EventKey, StructuredValue, Value, WorkflowEngine};

#[derive(Debug, Clone)]
pub struct PlayerJoin {
    pub name: String,
}

impl StructuredValue for PlayerJoin {
    fn get_field(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(Value::from(self.name.as_str())),
            _ => None,
        }
    }
}

impl Event for PlayerJoin {}

#[derive(Debug, Clone)]
pub struct PlayerChat {
    pub name: String,
    pub message: String,
}

impl StructuredValue for PlayerChat {
    fn get_field(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(Value::from(self.name.as_str())),
            "message" => Some(Value::from(self.message.as_str())),
            _ => None,
        }
    }
}

impl Event for PlayerChat {}

/// Server lifecycle; each variant is its own event key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerEvent {
    Started,
    Stopping,
}

impl ServerEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::Started => "Started",
            Self::Stopping => "Stopping",
        }
    }
}

impl StructuredValue for ServerEvent {
    fn get_field(&self, name: &str) -> Option<Value> {
        (name == "name").then(|| Value::from(self.name()))
    }

    fn to_text(&self) -> String {
        self.name().to_string()
    }
}

impl Event for ServerEvent {
    fn key(&self) -> EventKey {
        EventKey::variant::<Self>(self.name())
    }
}

/// Make the sample events selectable in `EventListener` nodes
pub fn register_event_types(engine: &WorkflowEngine) {
    engine.register_event_type::<PlayerJoin>("PlayerJoin");
    engine.register_event_type::<PlayerChat>("PlayerChat");

    let mut catalog = engine.catalog_mut();
    for variant in [ServerEvent::Started, ServerEvent::Stopping] {
        catalog.register_key(format!("Server{}", variant.name()), variant.key());
    }
    log::debug!("Event types: {:?}", catalog.names());
}
