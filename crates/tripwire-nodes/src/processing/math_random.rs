//! Math Random Node
//!
//! Publishes a uniformly distributed random number.

use rand::Rng;
use tripwire_engine::{
    Consumer, Field, NodeColor, NodeDescriptor, NodeGroup, NodeInstance, NodeMetadata, Producer,
    Result, ValueKind, Walk, WorkflowNode,
};

/// Math Random Node
///
/// # Fields
/// - `min` (default `0`), `max` (default `100`) - bounds; expressions
///   allowed, swapped when given in the wrong order
/// - `result` - producer; the variable name comes from the saved state
///
/// # Outputs
/// - `Next` - continued with the number published
#[derive(Debug, Default, Clone, Copy)]
pub struct MathRandomNode;

impl MathRandomNode {
    pub const NAME: &'static str = "MathRandom";
    pub const FIELD_MIN: &'static str = "min";
    pub const FIELD_MAX: &'static str = "max";
    pub const FIELD_RESULT: &'static str = "result";

    /// Draw from `[min, max)`; an empty or non-finite range yields the lower
    /// bound
    pub fn draw(min: f64, max: f64) -> f64 {
        let (low, high) = if min <= max { (min, max) } else { (max, min) };
        if !(low < high && (high - low).is_finite()) {
            return low;
        }
        rand::rng().random_range(low..high)
    }
}

impl NodeDescriptor for MathRandomNode {
    fn descriptor() -> NodeMetadata {
        NodeMetadata::new(Self::NAME, NodeGroup::Value, NodeColor::Sky)
            .field(Field::new(Self::FIELD_MIN).consume(Consumer::double().default_value("0")))
            .field(Field::new(Self::FIELD_MAX).consume(Consumer::double().default_value("100")))
            .field(
                Field::new(Self::FIELD_RESULT)
                    .produce(Producer::new().produce_type(ValueKind::Number)),
            )
            .output("Next", "Continue with the result set")
    }
}

impl WorkflowNode for MathRandomNode {
    fn execute(&self, node: &NodeInstance, walk: &mut Walk) -> Result<()> {
        let min = node.consumer(Self::FIELD_MIN)?.as_double(walk.variables())?;
        let max = node.consumer(Self::FIELD_MAX)?.as_double(walk.variables())?;
        let value = Self::draw(min, max);

        if !node
            .producer(Self::FIELD_RESULT)?
            .publish(walk.variables_mut(), value)
        {
            log::debug!("MathRandom '{}' has no result variable, value dropped", node.id());
        }
        walk.next(node)
    }
}
