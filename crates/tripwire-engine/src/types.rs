//! Persisted workflow graph format
//!
//! A [`WorkflowContext`] is the one unit of persistence: an ordered list of
//! node descriptors, each naming its node type and carrying the state the
//! loader wires into a fresh instance.
//!
//! ```json
//! {
//!   "nodes": [
//!     { "id": "t1", "name": "Interval",
//!       "state": {
//!         "outputs": { "Next": "r1" },
//!         "fields":  { "interval": { "consumer": "5", "producer": null } }
//!       } }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Unique identifier for a node within one graph
pub type NodeId = String;

/// Persisted binding of one field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldState {
    /// Raw consumer value: a literal or text with `{{path}}` placeholders
    #[serde(default)]
    pub consumer: Option<String>,
    /// Variable name the producer publishes under
    #[serde(default, alias = "variableName")]
    pub producer: Option<String>,
}

impl FieldState {
    pub fn consumer(value: impl Into<String>) -> Self {
        Self {
            consumer: Some(value.into()),
            producer: None,
        }
    }

    pub fn producer(variable_name: impl Into<String>) -> Self {
        Self {
            consumer: None,
            producer: Some(variable_name.into()),
        }
    }
}

/// Persisted wiring of one node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeState {
    /// Output name → next node id; `null` or absent is terminal
    #[serde(default)]
    pub outputs: BTreeMap<String, Option<NodeId>>,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldState>,
}

/// One node descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEntry {
    pub id: NodeId,
    /// Registered node type name
    pub name: String,
    #[serde(default)]
    pub state: NodeState,
}

impl NodeEntry {
    pub fn new(id: impl Into<NodeId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            state: NodeState::default(),
        }
    }
}

/// The persisted graph
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowContext {
    #[serde(default)]
    pub nodes: Vec<NodeEntry>,
}

impl WorkflowContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a persisted graph; empty input is an empty graph
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(text)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn find_node(&self, id: &str) -> Option<&NodeEntry> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every `(from, output, to)` link with a target
    pub fn links(&self) -> impl Iterator<Item = (&str, &str, &str)> + '_ {
        self.nodes.iter().flat_map(|node| {
            node.state.outputs.iter().filter_map(move |(output, next)| {
                next.as_deref()
                    .filter(|next| !next.is_empty())
                    .map(|next| (node.id.as_str(), output.as_str(), next))
            })
        })
    }
}
