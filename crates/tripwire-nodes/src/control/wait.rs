//! Wait Node
//!
//! Pauses a walk without holding a thread: the rest of the walk is handed to
//! the shared timer and resumed from there.

use tripwire_engine::{
    Consumer, Field, NodeColor, NodeDescriptor, NodeGroup, NodeInstance, NodeMetadata, Result,
    Unit, Walk, WorkflowNode,
};

use crate::seconds;

/// Wait Node
///
/// # Fields
/// - `delay` (default `1`) - seconds to wait; expressions allowed
///
/// # Outputs
/// - `Next` - continued after the delay with a copy of the variables
#[derive(Debug, Default, Clone, Copy)]
pub struct WaitNode;

impl WaitNode {
    pub const NAME: &'static str = "Wait";
    pub const FIELD_DELAY: &'static str = "delay";
}

impl NodeDescriptor for WaitNode {
    fn descriptor() -> NodeMetadata {
        NodeMetadata::new(Self::NAME, NodeGroup::Control, NodeColor::Amber)
            .field(
                Field::new(Self::FIELD_DELAY)
                    .consume(Consumer::double().default_value("1").unit(Unit::Second)),
            )
            .output("Next", "After the delay")
    }
}

impl WorkflowNode for WaitNode {
    fn execute(&self, node: &NodeInstance, walk: &mut Walk) -> Result<()> {
        let delay = node.consumer(Self::FIELD_DELAY)?.as_double(walk.variables())?;
        let delay = seconds(node, Self::FIELD_DELAY, delay)?;
        let Some(next) = node.next_id()?.map(str::to_string) else {
            return Ok(());
        };

        let rest = walk.fork();
        let handle = walk.schedule_once(delay, move || rest.resume(Some(&next)));
        log::debug!("Wait '{}' resumes in {:?} (task {})", node.id(), delay, handle.id());
        Ok(())
    }
}
