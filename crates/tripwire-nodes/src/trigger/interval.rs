//! Interval Node
//!
//! Starts a walk on a fixed-rate timer for as long as the graph is loaded.

use tripwire_engine::{
    Consumer, Field, NodeColor, NodeDescriptor, NodeGroup, NodeInstance, NodeMetadata,
    NodeRuntime, Result, Unit, Variables, WorkflowNode,
};

use crate::seconds;

/// Interval Node
///
/// # Fields
/// - `interval` (default `1`) - seconds between walks; expressions allowed
///
/// # Outputs
/// - `Next` - walked with an empty variable context on every tick
#[derive(Debug, Default, Clone, Copy)]
pub struct IntervalNode;

impl IntervalNode {
    pub const NAME: &'static str = "Interval";
    pub const FIELD_INTERVAL: &'static str = "interval";
}

impl NodeDescriptor for IntervalNode {
    fn descriptor() -> NodeMetadata {
        NodeMetadata::new(Self::NAME, NodeGroup::Trigger, NodeColor::Emerald)
            .inputs(0)
            .field(
                Field::new(Self::FIELD_INTERVAL)
                    .consume(Consumer::double().default_value("1").unit(Unit::Second)),
            )
            .output("Next", "On every tick")
    }
}

impl WorkflowNode for IntervalNode {
    fn init(&self, node: &NodeInstance, runtime: &mut NodeRuntime<'_>) -> Result<()> {
        let interval = node
            .consumer(Self::FIELD_INTERVAL)?
            .as_double(&Variables::new())?;
        let period = seconds(node, Self::FIELD_INTERVAL, interval)?;
        let Some(next) = node.next_id()?.map(str::to_string) else {
            log::debug!("Interval '{}' has no successor, not scheduling", node.id());
            return Ok(());
        };

        let walker = runtime.walker().clone();
        let handle = runtime.schedule_at_fixed_rate(period, period, move || {
            walker.start(&next, Variables::new())
        })?;
        log::debug!(
            "Interval '{}' scheduled every {:?} (task {})",
            node.id(),
            period,
            handle.id()
        );
        Ok(())
    }
}
