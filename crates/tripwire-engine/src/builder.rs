//! Fluent builder for workflow contexts
//!
//! Provides a fluent API for constructing graphs programmatically, mostly
//! for hosts that ship a default graph and for tests.

use crate::types::{FieldState, NodeEntry, WorkflowContext};

/// Fluent builder for constructing a [`WorkflowContext`]
///
/// # Example
///
/// ```ignore
/// let context = ContextBuilder::new()
///     .node("tick", "Interval")
///     .consumer("interval", "5")
///     .output("Next", "roll")
///     .node("roll", "MathRandom")
///     .producer("result", "r")
///     .build();
/// ```
#[derive(Debug, Default)]
pub struct ContextBuilder {
    nodes: Vec<NodeEntry>,
}

impl ContextBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node of type `name`; following calls configure it
    pub fn node(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.nodes.push(NodeEntry::new(id, name));
        self
    }

    /// Point an output of the most recently added node at `next_id`
    ///
    /// Must be called after `node`.
    pub fn output(mut self, output: impl Into<String>, next_id: impl Into<String>) -> Self {
        if let Some(node) = self.nodes.last_mut() {
            node.state.outputs.insert(output.into(), Some(next_id.into()));
        }
        self
    }

    /// Declare an output of the most recently added node as unconnected
    pub fn unlinked(mut self, output: impl Into<String>) -> Self {
        if let Some(node) = self.nodes.last_mut() {
            node.state.outputs.insert(output.into(), None);
        }
        self
    }

    /// Set a consumer value on the most recently added node
    pub fn consumer(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        if let Some(node) = self.nodes.last_mut() {
            node.state
                .fields
                .entry(field.into())
                .or_default()
                .consumer = Some(value.into());
        }
        self
    }

    /// Name the variable a producer of the most recently added node writes
    pub fn producer(mut self, field: impl Into<String>, variable_name: impl Into<String>) -> Self {
        if let Some(node) = self.nodes.last_mut() {
            node.state
                .fields
                .entry(field.into())
                .or_default()
                .producer = Some(variable_name.into());
        }
        self
    }

    /// Replace a field's state wholesale
    pub fn field(mut self, field: impl Into<String>, state: FieldState) -> Self {
        if let Some(node) = self.nodes.last_mut() {
            node.state.fields.insert(field.into(), state);
        }
        self
    }

    pub fn build(self) -> WorkflowContext {
        WorkflowContext { nodes: self.nodes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_chain() {
        let context = ContextBuilder::new()
            .node("tick", "Interval")
            .consumer("interval", "5")
            .output("Next", "roll")
            .node("roll", "MathRandom")
            .consumer("max", "6")
            .producer("max", "unused")
            .producer("result", "r")
            .unlinked("Next")
            .build();

        assert_eq!(context.len(), 2);
        let roll = context.find_node("roll").unwrap();
        assert_eq!(roll.state.fields["max"].consumer.as_deref(), Some("6"));
        assert_eq!(roll.state.fields["max"].producer.as_deref(), Some("unused"));
        assert_eq!(roll.state.outputs["Next"], None);
        let links: Vec<_> = context.links().collect();
        assert_eq!(links, vec![("tick", "Next", "roll")]);
    }

    #[test]
    fn test_calls_before_node_are_ignored() {
        let context = ContextBuilder::new().consumer("x", "1").output("Next", "a").build();
        assert!(context.is_empty());
    }
}
