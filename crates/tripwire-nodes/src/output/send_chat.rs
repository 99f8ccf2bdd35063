//! Send Chat Node
//!
//! Broadcasts an interpolated message through the host's [`MessageSink`].

use std::sync::Arc;

use tripwire_engine::{
    Consumer, Field, NodeColor, NodeDescriptor, NodeGroup, NodeInstance, NodeMetadata, Result,
    Walk, WorkflowNode,
};

use super::dispatch;
use crate::transport::MessageSink;

/// Send Chat Node
///
/// # Fields
/// - `message` (default `Hello`) - text with `{{path}}` placeholders
///
/// # Outputs
/// - `Next` - continued right away; delivery does not wait
pub struct SendChatNode {
    sink: Arc<dyn MessageSink>,
}

impl SendChatNode {
    pub const NAME: &'static str = "SendChat";
    pub const FIELD_MESSAGE: &'static str = "message";

    pub fn new(sink: Arc<dyn MessageSink>) -> Self {
        Self { sink }
    }
}

impl NodeDescriptor for SendChatNode {
    fn descriptor() -> NodeMetadata {
        NodeMetadata::new(Self::NAME, NodeGroup::Action, NodeColor::Lime)
            .field(Field::new(Self::FIELD_MESSAGE).consume(Consumer::string().default_value("Hello")))
            .output("Next", "After the message is queued")
    }
}

impl WorkflowNode for SendChatNode {
    fn execute(&self, node: &NodeInstance, walk: &mut Walk) -> Result<()> {
        let message = node.consumer(Self::FIELD_MESSAGE)?.as_string(walk.variables());
        log::debug!("SendChat '{}': {} chars", node.id(), message.len());

        let sink = Arc::clone(&self.sink);
        dispatch(node, walk, move || sink.send(&message));
        walk.next(node)
    }
}
