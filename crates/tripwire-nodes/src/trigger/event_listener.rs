//! Event Listener Node
//!
//! Starts a walk whenever the host fires the selected event type.

use std::sync::Arc;

use parking_lot::Mutex;
use tripwire_engine::{
    Consumer, Event, EventKey, Field, Listener, NodeColor, NodeDescriptor, NodeGroup,
    NodeInstance, NodeMetadata, NodeRuntime, Producer, Result, Value, Variables, WorkflowNode,
};

/// Event Listener Node
///
/// # Fields
/// - `event` (required) - registered event type name; its producer publishes
///   the event itself (default variable `event`)
/// - `before` (optional, default `false`) - react to the "before" broadcast
///   instead of the "after" one
///
/// # Outputs
/// - `Next` - walked with the event published
#[derive(Default)]
pub struct EventListenerNode {
    /// Subscription made in `init`, removed again in `unload`
    subscription: Mutex<Option<(EventKey, Listener)>>,
}

impl EventListenerNode {
    pub const NAME: &'static str = "EventListener";
    pub const FIELD_EVENT: &'static str = "event";
    pub const FIELD_BEFORE: &'static str = "before";

    pub fn new() -> Self {
        Self::default()
    }
}

impl NodeDescriptor for EventListenerNode {
    fn descriptor() -> NodeMetadata {
        NodeMetadata::new(Self::NAME, NodeGroup::Trigger, NodeColor::Emerald)
            .inputs(0)
            .field(
                Field::new(Self::FIELD_EVENT)
                    .consume(Consumer::class())
                    .produce(Producer::named("event")),
            )
            .field(
                Field::new(Self::FIELD_BEFORE)
                    .consume(Consumer::boolean().not_required().default_value("false")),
            )
            .output("Next", "When the event fires")
    }
}

impl WorkflowNode for EventListenerNode {
    fn init(&self, node: &NodeInstance, runtime: &mut NodeRuntime<'_>) -> Result<()> {
        let key = node.consumer(Self::FIELD_EVENT)?.as_class(runtime.catalog())?;
        let phase = node.consumer(Self::FIELD_BEFORE)?.as_boolean()?;
        let producer = node.producer(Self::FIELD_EVENT)?.clone();
        let Some(next) = node.next_id()?.map(str::to_string) else {
            log::debug!("EventListener '{}' has no successor, not subscribing", node.id());
            return Ok(());
        };

        let walker = runtime.walker().clone();
        let listener: Listener = Arc::new(move |event: &Arc<dyn Event>, before: bool| {
            if before != phase {
                return Ok(());
            }
            let mut variables = Variables::new();
            producer.publish(&mut variables, Value::Structured(event.clone()));
            walker.start(&next, variables)
        });

        log::debug!("EventListener '{}' subscribed to {}", node.id(), key);
        let listener = runtime.on(key, listener);
        *self.subscription.lock() = Some((key, listener));
        Ok(())
    }

    fn unload(&self, node: &NodeInstance, runtime: &mut NodeRuntime<'_>) {
        if let Some((key, listener)) = self.subscription.lock().take() {
            if runtime.remove(&key, &listener) {
                log::debug!("EventListener '{}' unsubscribed from {}", node.id(), key);
            }
        }
    }
}
