//! Node type metadata
//!
//! Every node type describes itself with a [`NodeMetadata`]: its palette
//! name, group and colour, how many inbound links it accepts, the fields it
//! consumes or produces and the outputs it can route to. The metadata is the
//! template every live instance clones its fields and outputs from, and it is
//! what the host exports to editors.

use serde::Serialize;

use crate::field::Field;

/// Trait for node types that can describe their metadata
///
/// ```ignore
/// impl NodeDescriptor for SendChatNode {
///     fn descriptor() -> NodeMetadata {
///         NodeMetadata::new("SendChat", NodeGroup::Action, NodeColor::Lime)
///             .field(Field::new("message").consume(Consumer::string().default_value("Hello")))
///             .output("Next", "Continue")
///     }
/// }
/// ```
pub trait NodeDescriptor {
    /// Get the static metadata for this node type
    fn descriptor() -> NodeMetadata
    where
        Self: Sized;
}

/// Palette group of a node type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeGroup {
    /// Starts walks: event listeners, timers
    Trigger,
    /// Side effects on the host
    Action,
    /// Chooses between outputs
    Condition,
    /// Computes a value into the variable context
    Value,
    /// Alters the flow of a walk (delays, forks)
    Control,
}

/// Palette colour of a node type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeColor {
    Lime,
    Emerald,
    Amber,
    Sky,
    Rose,
    Violet,
}

impl NodeColor {
    /// CSS colour for editors
    pub fn hex(&self) -> &'static str {
        match self {
            Self::Lime => "#84cc16",
            Self::Emerald => "#10b981",
            Self::Amber => "#f59e0b",
            Self::Sky => "#0ea5e9",
            Self::Rose => "#f43f5e",
            Self::Violet => "#8b5cf6",
        }
    }
}

/// A declared output of a node type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputSpec {
    pub name: String,
    pub description: String,
}

impl OutputSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Complete metadata for a node type
#[derive(Debug, Clone, Serialize)]
pub struct NodeMetadata {
    /// Unique type name, the key persisted graphs refer to
    pub name: String,
    pub group: NodeGroup,
    pub color: NodeColor,
    /// Number of inbound links the editor allows
    pub inputs: u32,
    pub fields: Vec<Field>,
    pub outputs: Vec<OutputSpec>,
}

impl NodeMetadata {
    /// Metadata with one input and no fields or outputs
    pub fn new(name: impl Into<String>, group: NodeGroup, color: NodeColor) -> Self {
        Self {
            name: name.into(),
            group,
            color,
            inputs: 1,
            fields: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn inputs(mut self, inputs: u32) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn output(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.outputs.push(OutputSpec::new(name, description));
        self
    }

    /// Look up a declared field
    pub fn find_field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// Look up a declared output
    pub fn find_output(&self, name: &str) -> Option<&OutputSpec> {
        self.outputs.iter().find(|o| o.name == name)
    }
}
