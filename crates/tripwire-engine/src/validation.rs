//! Graph validation for persisted workflows
//!
//! Reports every problem in a [`WorkflowContext`] at once instead of stopping
//! at the first. The loader re-raises the fatal subset itself; broken links
//! and cycles are tolerated at runtime and only reported here.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::registry::NodeRegistry;
use crate::types::WorkflowContext;

/// Validation finding with location context
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Two descriptors share an id
    DuplicateNodeId { node_id: String },
    /// An output points at a node id that does not exist
    BrokenLink {
        node_id: String,
        output: String,
        next_id: String,
    },
    /// A node has an unknown type (not in registry)
    UnknownNodeType { node_id: String, node_type: String },
    /// State names an output the type does not declare
    UnknownOutput { node_id: String, output: String },
    /// State names a field the type does not declare
    UnknownField { node_id: String, field: String },
    /// A required consumer has no value and no default
    MissingRequiredValue { node_id: String, field: String },
    /// The graph contains a cycle; walks through it end at the hop limit
    CycleDetected,
}

impl ValidationError {
    /// Whether the loader refuses a graph with this finding
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::BrokenLink { .. } | Self::CycleDetected)
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateNodeId { node_id } => write!(f, "Duplicate node id '{}'", node_id),
            Self::BrokenLink {
                node_id,
                output,
                next_id,
            } => write!(
                f,
                "Output '{}' of node '{}' points at unknown node '{}'",
                output, node_id, next_id
            ),
            Self::UnknownNodeType { node_id, node_type } => {
                write!(f, "Unknown node type '{}' for node '{}'", node_type, node_id)
            }
            Self::UnknownOutput { node_id, output } => {
                write!(f, "Node '{}' has no output '{}'", node_id, output)
            }
            Self::UnknownField { node_id, field } => {
                write!(f, "Node '{}' has no field '{}'", node_id, field)
            }
            Self::MissingRequiredValue { node_id, field } => {
                write!(f, "Required field '{}' on node '{}' has no value", field, node_id)
            }
            Self::CycleDetected => write!(f, "Cycle detected in graph"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate a persisted workflow
///
/// Pass a registry to also check node types, outputs and fields.
pub fn validate_context(
    context: &WorkflowContext,
    registry: Option<&NodeRegistry>,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    validate_ids(context, &mut errors);
    validate_links(context, &mut errors);
    detect_cycles(context, &mut errors);

    if let Some(reg) = registry {
        validate_against_types(context, reg, &mut errors);
    }

    errors
}

fn validate_ids(context: &WorkflowContext, errors: &mut Vec<ValidationError>) {
    let mut seen = HashSet::new();
    for node in &context.nodes {
        if !seen.insert(node.id.as_str()) {
            errors.push(ValidationError::DuplicateNodeId {
                node_id: node.id.clone(),
            });
        }
    }
}

fn validate_links(context: &WorkflowContext, errors: &mut Vec<ValidationError>) {
    let ids: HashSet<&str> = context.nodes.iter().map(|n| n.id.as_str()).collect();
    for (from, output, to) in context.links() {
        if !ids.contains(to) {
            errors.push(ValidationError::BrokenLink {
                node_id: from.to_string(),
                output: output.to_string(),
                next_id: to.to_string(),
            });
        }
    }
}

/// Detect cycles using Kahn's algorithm
fn detect_cycles(context: &WorkflowContext, errors: &mut Vec<ValidationError>) {
    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    for node in &context.nodes {
        in_degree.insert(&node.id, 0);
    }
    let links: Vec<(&str, &str)> = context
        .links()
        .filter(|(_, _, to)| in_degree.contains_key(to))
        .map(|(from, _, to)| (from, to))
        .collect();
    for (_, to) in &links {
        if let Some(deg) = in_degree.get_mut(to) {
            *deg += 1;
        }
    }

    let mut queue: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(&id, _)| id)
        .collect();

    let mut visited = 0;
    while let Some(node_id) = queue.pop_front() {
        visited += 1;
        for (from, to) in &links {
            if *from == node_id {
                if let Some(deg) = in_degree.get_mut(to) {
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push_back(*to);
                    }
                }
            }
        }
    }

    if visited < in_degree.len() {
        errors.push(ValidationError::CycleDetected);
    }
}

/// Check types, outputs, fields and required values against the registry
fn validate_against_types(
    context: &WorkflowContext,
    registry: &NodeRegistry,
    errors: &mut Vec<ValidationError>,
) {
    for node in &context.nodes {
        let Some(metadata) = registry.get_metadata(&node.name) else {
            errors.push(ValidationError::UnknownNodeType {
                node_id: node.id.clone(),
                node_type: node.name.clone(),
            });
            continue;
        };

        for output in node.state.outputs.keys() {
            if metadata.find_output(output).is_none() {
                errors.push(ValidationError::UnknownOutput {
                    node_id: node.id.clone(),
                    output: output.clone(),
                });
            }
        }

        for field in node.state.fields.keys() {
            if metadata.find_field(field).is_none() {
                errors.push(ValidationError::UnknownField {
                    node_id: node.id.clone(),
                    field: field.clone(),
                });
            }
        }

        for field in &metadata.fields {
            let Some(consumer) = field.consumer() else {
                continue;
            };
            let supplied = node
                .state
                .fields
                .get(field.name())
                .is_some_and(|state| state.consumer.is_some());
            if consumer.is_required() && !supplied && !consumer.is_bound() {
                errors.push(ValidationError::MissingRequiredValue {
                    node_id: node.id.clone(),
                    field: field.name().to_string(),
                });
            }
        }
    }
}
