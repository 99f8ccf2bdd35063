//! Node type registry
//!
//! Maps node type names to their metadata and a factory producing fresh
//! behaviour for every instance. The host fills it once at startup; the
//! loader resolves every persisted descriptor against it.
//!
//! # Usage
//!
//! ```ignore
//! use tripwire_engine::{NodeRegistry, NodeDescriptor, WorkflowNode};
//!
//! let mut registry = NodeRegistry::new();
//! registry.register(SendChatNode::descriptor(), || {
//!     Box::new(SendChatNode::new(sink.clone())) as Box<dyn WorkflowNode>
//! })?;
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::descriptor::{NodeGroup, NodeMetadata};
use crate::error::LoadError;
use crate::node::{NodeFactory, WorkflowNode};

/// A registration entry combining metadata with an optional factory
struct RegistryEntry {
    metadata: Arc<NodeMetadata>,
    factory: Option<Arc<dyn NodeFactory>>,
}

/// Registry of node types
#[derive(Default)]
pub struct NodeRegistry {
    entries: HashMap<String, RegistryEntry>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(
        &mut self,
        metadata: NodeMetadata,
        factory: Option<Arc<dyn NodeFactory>>,
    ) -> Result<(), LoadError> {
        if self.entries.contains_key(&metadata.name) {
            return Err(LoadError::DuplicateNodeType {
                node_type: metadata.name,
            });
        }
        check_unique(&metadata)?;
        log::debug!("Registered node type '{}'", metadata.name);
        self.entries.insert(
            metadata.name.clone(),
            RegistryEntry {
                metadata: Arc::new(metadata),
                factory,
            },
        );
        Ok(())
    }

    /// Register a node type with metadata and a factory
    ///
    /// Registering a name twice is an error.
    pub fn register(
        &mut self,
        metadata: NodeMetadata,
        factory: impl NodeFactory + 'static,
    ) -> Result<(), LoadError> {
        self.insert(metadata, Some(Arc::new(factory)))
    }

    /// Register a node type with metadata only (no constructor)
    ///
    /// Used for palette listings; loading such a node fails.
    pub fn register_metadata(&mut self, metadata: NodeMetadata) -> Result<(), LoadError> {
        self.insert(metadata, None)
    }

    /// Get metadata for a node type
    pub fn get_metadata(&self, node_type: &str) -> Option<&Arc<NodeMetadata>> {
        self.entries.get(node_type).map(|e| &e.metadata)
    }

    /// All registered metadata, sorted by name
    pub fn all_metadata(&self) -> Vec<&NodeMetadata> {
        let mut all: Vec<&NodeMetadata> = self.entries.values().map(|e| e.metadata.as_ref()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Metadata grouped by palette group
    pub fn metadata_by_group(&self) -> HashMap<NodeGroup, Vec<&NodeMetadata>> {
        let mut grouped: HashMap<NodeGroup, Vec<&NodeMetadata>> = HashMap::new();
        for metadata in self.all_metadata() {
            grouped.entry(metadata.group).or_default().push(metadata);
        }
        grouped
    }

    /// Check if a node type is registered
    pub fn has_node_type(&self, node_type: &str) -> bool {
        self.entries.contains_key(node_type)
    }

    /// List all registered node type names, sorted
    pub fn node_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.entries.keys().map(|s| s.as_str()).collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fresh metadata handle and behaviour for one node
    pub fn instantiate(
        &self,
        node_id: &str,
        node_type: &str,
    ) -> Result<(Arc<NodeMetadata>, Box<dyn WorkflowNode>), LoadError> {
        let entry = self.entries.get(node_type).ok_or_else(|| LoadError::UnknownNodeType {
            node_id: node_id.to_string(),
            node_type: node_type.to_string(),
        })?;
        let factory = entry.factory.as_ref().ok_or_else(|| LoadError::NoConstructor {
            node_id: node_id.to_string(),
            node_type: node_type.to_string(),
        })?;
        Ok((entry.metadata.clone(), factory.create()))
    }
}

/// Field names and output names must each be unique within a type
fn check_unique(metadata: &NodeMetadata) -> Result<(), LoadError> {
    let fields = metadata.fields.iter().map(|f| ("field", f.name()));
    let outputs = metadata.outputs.iter().map(|o| ("output", o.name.as_str()));

    let mut seen = HashSet::new();
    for (member, name) in fields.chain(outputs) {
        if !seen.insert((member, name)) {
            return Err(LoadError::DuplicateMember {
                node_type: metadata.name.clone(),
                member,
                name: name.to_string(),
            });
        }
    }
    Ok(())
}
