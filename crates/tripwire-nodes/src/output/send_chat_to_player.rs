//! Send Chat To Player Node
//!
//! Sends an interpolated message to one player through the host's
//! [`MessageSink`].

use std::sync::Arc;

use tripwire_engine::{
    Consumer, Field, NodeColor, NodeDescriptor, NodeGroup, NodeInstance, NodeMetadata, Result,
    Walk, WorkflowNode,
};

use super::dispatch;
use crate::transport::MessageSink;

/// Send Chat To Player Node
///
/// # Fields
/// - `player` (required) - recipient, usually `{{event.player.name}}`
/// - `message` (default `Hello`)
///
/// # Outputs
/// - `Next` - continued right away; delivery does not wait
pub struct SendChatToPlayerNode {
    sink: Arc<dyn MessageSink>,
}

impl SendChatToPlayerNode {
    pub const NAME: &'static str = "SendChatToPlayer";
    pub const FIELD_PLAYER: &'static str = "player";
    pub const FIELD_MESSAGE: &'static str = "message";

    pub fn new(sink: Arc<dyn MessageSink>) -> Self {
        Self { sink }
    }
}

impl NodeDescriptor for SendChatToPlayerNode {
    fn descriptor() -> NodeMetadata {
        NodeMetadata::new(Self::NAME, NodeGroup::Action, NodeColor::Lime)
            .field(Field::new(Self::FIELD_PLAYER).consume(Consumer::string()))
            .field(Field::new(Self::FIELD_MESSAGE).consume(Consumer::string().default_value("Hello")))
            .output("Next", "After the message is queued")
    }
}

impl WorkflowNode for SendChatToPlayerNode {
    fn execute(&self, node: &NodeInstance, walk: &mut Walk) -> Result<()> {
        let player = node.consumer(Self::FIELD_PLAYER)?.as_string(walk.variables());
        let message = node.consumer(Self::FIELD_MESSAGE)?.as_string(walk.variables());

        if player.trim().is_empty() {
            log::warn!("SendChatToPlayer '{}' resolved no player, skipping", node.id());
        } else {
            let sink = Arc::clone(&self.sink);
            dispatch(node, walk, move || sink.send_to(&player, &message));
        }
        walk.next(node)
    }
}
