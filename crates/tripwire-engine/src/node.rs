//! Node behaviour and live node instances
//!
//! A node type is a [`NodeMetadata`] template plus a [`NodeFactory`] that
//! builds its behaviour. The loader turns every persisted descriptor into a
//! [`NodeInstance`]: a private copy of the template's fields and outputs,
//! wired from the descriptor's state, owning a fresh [`WorkflowNode`].

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::descriptor::NodeMetadata;
use crate::error::{FieldValueError, LoadError, Result, SchedulingError, WorkflowError};
use crate::events::{EventBus, EventKey, Listener, TypeCatalog};
use crate::field::{Consumer, Field, Producer};
use crate::scheduler::{Scheduler, TaskHandle, TaskRegistry};
use crate::types::{NodeEntry, NodeState};
use crate::walk::{Walk, Walker};
use crate::workers::WorkerPool;

/// Behaviour of a node type
///
/// All hooks receive the instance they belong to, so one behaviour value can
/// read its own wired fields and outputs.
pub trait WorkflowNode: Send + Sync {
    /// Called once after the whole graph is wired; subscribe and schedule here
    fn init(&self, node: &NodeInstance, runtime: &mut NodeRuntime<'_>) -> Result<()> {
        let _ = (node, runtime);
        Ok(())
    }

    /// Called when the graph is replaced or cleared
    ///
    /// Listeners and tasks registered through the runtime are dropped by the
    /// engine afterwards; this hook is for anything held elsewhere.
    fn unload(&self, node: &NodeInstance, runtime: &mut NodeRuntime<'_>) {
        let _ = (node, runtime);
    }

    /// Run this node as part of a walk; the default continues to the first output
    fn execute(&self, node: &NodeInstance, walk: &mut Walk) -> Result<()> {
        walk.next(node)
    }
}

/// Creates fresh behaviour values for one node type
pub trait NodeFactory: Send + Sync {
    fn create(&self) -> Box<dyn WorkflowNode>;
}

impl<F> NodeFactory for F
where
    F: Fn() -> Box<dyn WorkflowNode> + Send + Sync,
{
    fn create(&self) -> Box<dyn WorkflowNode> {
        self()
    }
}

/// A wired output of a live node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    pub name: String,
    pub description: String,
    /// Downstream node; `None` is terminal
    pub next_id: Option<String>,
}

/// A configured node at a graph position
pub struct NodeInstance {
    id: String,
    metadata: Arc<NodeMetadata>,
    fields: Vec<Field>,
    outputs: Vec<Output>,
    behavior: Box<dyn WorkflowNode>,
}

impl std::fmt::Debug for NodeInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeInstance")
            .field("id", &self.id)
            .field("type", &self.metadata.name)
            .field("outputs", &self.outputs)
            .finish_non_exhaustive()
    }
}

impl NodeInstance {
    /// Fresh instance with the template's fields and unwired outputs
    pub fn new(id: impl Into<String>, metadata: Arc<NodeMetadata>, behavior: Box<dyn WorkflowNode>) -> Self {
        let fields = metadata.fields.clone();
        let outputs = metadata
            .outputs
            .iter()
            .map(|spec| Output {
                name: spec.name.clone(),
                description: spec.description.clone(),
                next_id: None,
            })
            .collect();

        Self {
            id: id.into(),
            metadata,
            fields,
            outputs,
            behavior,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Registered type name
    pub fn node_type(&self) -> &str {
        &self.metadata.name
    }

    pub fn metadata(&self) -> &NodeMetadata {
        &self.metadata
    }

    pub fn inputs(&self) -> u32 {
        self.metadata.inputs
    }

    pub fn behavior(&self) -> &dyn WorkflowNode {
        self.behavior.as_ref()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name() == name)
    }

    fn field_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.fields.iter_mut().find(|f| f.name() == name)
    }

    /// The consumer of a declared field
    pub fn consumer(&self, name: &str) -> std::result::Result<&Consumer, FieldValueError> {
        let field = self.field(name).ok_or_else(|| FieldValueError::UnknownField {
            field: name.to_string(),
        })?;
        field.consumer().ok_or_else(|| FieldValueError::NoConsumer {
            field: name.to_string(),
        })
    }

    /// The producer of a declared field
    pub fn producer(&self, name: &str) -> std::result::Result<&Producer, FieldValueError> {
        let field = self.field(name).ok_or_else(|| FieldValueError::UnknownField {
            field: name.to_string(),
        })?;
        field.producer().ok_or_else(|| FieldValueError::NoProducer {
            field: name.to_string(),
        })
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    pub fn output(&self, name: &str) -> Option<&Output> {
        self.outputs.iter().find(|o| o.name == name)
    }

    /// Successor through the first declared output
    ///
    /// Fails when the node type declares no outputs at all.
    pub fn next_id(&self) -> Result<Option<&str>> {
        let first = self.outputs.first().ok_or_else(|| WorkflowError::NoOutputs {
            node_id: self.id.clone(),
            node_type: self.metadata.name.clone(),
        })?;
        Ok(first.next_id.as_deref())
    }

    /// Wire outputs and fields from a persisted descriptor
    ///
    /// Fails on any output or field the type does not declare, on a required
    /// consumer left without a value, and on a literal that does not parse as
    /// the field's type.
    pub fn configure(&mut self, state: &NodeState) -> std::result::Result<(), LoadError> {
        for (name, next_id) in &state.outputs {
            let node_id = self.id.clone();
            let node_type = self.metadata.name.clone();
            let output = self
                .outputs
                .iter_mut()
                .find(|o| &o.name == name)
                .ok_or_else(|| LoadError::UnknownOutput {
                    node_id,
                    node_type,
                    output: name.clone(),
                })?;
            output.next_id = next_id.clone().filter(|id| !id.is_empty());
        }

        for (name, binding) in &state.fields {
            let node_id = self.id.clone();
            let node_type = self.metadata.name.clone();
            let field = self.field_mut(name).ok_or_else(|| LoadError::UnknownField {
                node_id: node_id.clone(),
                node_type,
                field: name.clone(),
            })?;

            if let Some(value) = &binding.consumer {
                let consumer = field.consumer_mut().ok_or_else(|| LoadError::InvalidFieldValue {
                    node_id: node_id.clone(),
                    source: FieldValueError::NoConsumer { field: name.clone() },
                })?;
                consumer.set_value(Some(value.clone()));
            }

            if let Some(variable_name) = &binding.producer {
                let producer = field.producer_mut().ok_or_else(|| LoadError::InvalidFieldValue {
                    node_id: node_id.clone(),
                    source: FieldValueError::NoProducer { field: name.clone() },
                })?;
                producer.set_variable_name(variable_name.clone());
            }
        }

        for field in &self.fields {
            let Some(consumer) = field.consumer() else {
                continue;
            };
            if consumer.is_required() && !consumer.is_bound() {
                return Err(LoadError::MissingRequiredField {
                    node_id: self.id.clone(),
                    node_type: self.metadata.name.clone(),
                    field: field.name().to_string(),
                });
            }
            consumer.validate().map_err(|source| LoadError::InvalidFieldValue {
                node_id: self.id.clone(),
                source,
            })?;
        }

        log::debug!("Node wired: {:?}", self);
        Ok(())
    }

    /// Build an unconfigured copy of `entry`'s type and wire it
    pub fn from_entry(
        entry: &NodeEntry,
        metadata: Arc<NodeMetadata>,
        behavior: Box<dyn WorkflowNode>,
    ) -> std::result::Result<Self, LoadError> {
        let mut node = Self::new(entry.id.clone(), metadata, behavior);
        node.configure(&entry.state)?;
        Ok(node)
    }
}

/// What a node may touch during `init` and `unload`
///
/// Listeners and tasks registered here belong to the graph being built and
/// are dropped together with it.
pub struct NodeRuntime<'a> {
    pub(crate) events: &'a mut EventBus,
    pub(crate) tasks: &'a Mutex<TaskRegistry>,
    pub(crate) walker: Walker,
    pub(crate) scheduler: &'a Scheduler,
    pub(crate) workers: &'a WorkerPool,
    pub(crate) catalog: &'a TypeCatalog,
}

impl NodeRuntime<'_> {
    /// Subscribe to an event key
    pub fn on(&mut self, key: EventKey, listener: Listener) -> Listener {
        self.events.on(key, listener)
    }

    pub fn remove(&mut self, key: &EventKey, listener: &Listener) -> bool {
        self.events.remove(key, listener)
    }

    /// Run `task` once after `delay`; tracked with the graph
    pub fn schedule_once<F>(&mut self, delay: Duration, task: F) -> TaskHandle
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let handle = self.scheduler.schedule_once(delay, task);
        self.tasks.lock().track(handle.clone());
        handle
    }

    /// Run `task` every `period`; tracked with the graph
    pub fn schedule_at_fixed_rate<F>(
        &mut self,
        initial_delay: Duration,
        period: Duration,
        task: F,
    ) -> std::result::Result<TaskHandle, SchedulingError>
    where
        F: FnMut() -> Result<()> + Send + 'static,
    {
        let handle = self.scheduler.schedule_at_fixed_rate(initial_delay, period, task)?;
        self.tasks.lock().track(handle.clone());
        Ok(handle)
    }

    /// Run `task` repeatedly with `delay` between runs; tracked with the graph
    pub fn schedule_with_fixed_delay<F>(
        &mut self,
        initial_delay: Duration,
        delay: Duration,
        task: F,
    ) -> std::result::Result<TaskHandle, SchedulingError>
    where
        F: FnMut() -> Result<()> + Send + 'static,
    {
        let handle = self.scheduler.schedule_with_fixed_delay(initial_delay, delay, task)?;
        self.tasks.lock().track(handle.clone());
        Ok(handle)
    }

    /// Starts walks on the graph being built
    pub fn walker(&self) -> &Walker {
        &self.walker
    }

    pub fn workers(&self) -> &WorkerPool {
        self.workers
    }

    pub fn catalog(&self) -> &TypeCatalog {
        self.catalog
    }
}
