//! Tripwire Nodes
//!
//! Built-in node types for the Tripwire workflow engine.
//! Each node is an atomic building block that can be composed into graphs.
//!
//! # Groups
//!
//! - **Trigger**: Nodes that start walks (host events, timers)
//! - **Control**: Nodes that shape a walk (delays)
//! - **Value**: Nodes that publish computed values
//! - **Action**: Nodes with outside effects (chat)

use std::sync::Arc;
use std::time::Duration;

use tripwire_engine::{
    FieldValueError, NodeDescriptor, NodeInstance, NodeRegistry, Result, WorkflowNode,
};

pub mod control;
pub mod output;
pub mod processing;
pub mod transport;
pub mod trigger;

// Re-export all nodes for convenience
pub use control::*;
pub use output::*;
pub use processing::*;
pub use transport::{LogMessageSink, MessageSink};
pub use trigger::*;

/// Register every built-in node type
///
/// Chat nodes deliver through `sink`.
pub fn register_builtins(registry: &mut NodeRegistry, sink: Arc<dyn MessageSink>) -> Result<()> {
    registry.register(EventListenerNode::descriptor(), || {
        Box::new(EventListenerNode::new()) as Box<dyn WorkflowNode>
    })?;
    registry.register(IntervalNode::descriptor(), || {
        Box::new(IntervalNode) as Box<dyn WorkflowNode>
    })?;
    registry.register(WaitNode::descriptor(), || {
        Box::new(WaitNode) as Box<dyn WorkflowNode>
    })?;
    registry.register(MathRandomNode::descriptor(), || {
        Box::new(MathRandomNode) as Box<dyn WorkflowNode>
    })?;

    let chat_sink = Arc::clone(&sink);
    registry.register(SendChatNode::descriptor(), move || {
        Box::new(SendChatNode::new(Arc::clone(&chat_sink))) as Box<dyn WorkflowNode>
    })?;
    registry.register(SendChatToPlayerNode::descriptor(), move || {
        Box::new(SendChatToPlayerNode::new(Arc::clone(&sink))) as Box<dyn WorkflowNode>
    })?;

    log::debug!("Registered built-in nodes ({} types)", registry.len());
    Ok(())
}

/// A registry holding only the built-in node types
pub fn builtin_registry(sink: Arc<dyn MessageSink>) -> Result<NodeRegistry> {
    let mut registry = NodeRegistry::new();
    register_builtins(&mut registry, sink)?;
    Ok(registry)
}

/// Convert a seconds field into a duration; negative or non-finite is an error
pub(crate) fn seconds(node: &NodeInstance, field: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value).map_err(|_| {
        log::debug!("Node '{}' has an unusable duration in '{}'", node.id(), field);
        FieldValueError::Malformed {
            field: field.to_string(),
            value: value.to_string(),
            expected: "non-negative seconds".to_string(),
        }
        .into()
    })
}
