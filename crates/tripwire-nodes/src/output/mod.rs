//! Action nodes
//!
//! Nodes with side effects outside the graph. Delivery runs on the worker
//! pool so a slow transport never stalls event delivery or the timer.

mod send_chat;
mod send_chat_to_player;

pub use send_chat::SendChatNode;
pub use send_chat_to_player::SendChatToPlayerNode;

use tripwire_engine::{NodeInstance, Result, Walk};

/// Hand `job` to the worker pool; a rejected job is logged and dropped
fn dispatch<F>(node: &NodeInstance, walk: &Walk, job: F)
where
    F: FnOnce() -> Result<()> + Send + 'static,
{
    if let Err(e) = walk.submit(job) {
        log::warn!("{} '{}' dropped a message: {}", node.node_type(), node.id(), e);
    }
}
