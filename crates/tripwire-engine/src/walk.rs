//! Graph walks
//!
//! A walk starts at a node, runs its `execute`, and follows whichever output
//! the node chose until a node chooses none. The continuation is recorded by
//! [`Walk::next`], [`Walk::proceed`] or [`Walk::goto`] and followed once
//! `execute` returns, so a walk of any length runs in constant stack.
//!
//! Every walk owns its [`Variables`]; concurrent walks never share them.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{LoadError, Result, SchedulingError, WorkflowError};
use crate::node::NodeInstance;
use crate::scheduler::{Scheduler, TaskHandle, TaskRegistry};
use crate::value::Variables;
use crate::workers::WorkerPool;

/// Live nodes of one loaded graph, keyed by id, in load order
#[derive(Debug, Default)]
pub struct NodeTable {
    nodes: HashMap<String, NodeInstance>,
    order: Vec<String>,
}

impl NodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, node: NodeInstance) -> std::result::Result<(), LoadError> {
        if self.nodes.contains_key(node.id()) {
            return Err(LoadError::DuplicateNodeId {
                node_id: node.id().to_string(),
            });
        }
        self.order.push(node.id().to_string());
        self.nodes.insert(node.id().to_string(), node);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&NodeInstance> {
        self.nodes.get(id)
    }

    /// Node ids in load order
    pub fn ids(&self) -> &[String] {
        &self.order
    }

    /// Nodes in load order
    pub fn iter(&self) -> impl Iterator<Item = &NodeInstance> + '_ {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Starts walks on one loaded graph
///
/// Cheap to clone; triggers capture one in their listeners and timers. Tasks
/// scheduled from its walks are tracked with the graph it was created for,
/// and cancelled immediately once that graph has been replaced.
#[derive(Clone)]
pub struct Walker {
    nodes: Arc<NodeTable>,
    tasks: Weak<Mutex<TaskRegistry>>,
    scheduler: Scheduler,
    workers: WorkerPool,
    max_hops: Option<u32>,
}

impl std::fmt::Debug for Walker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Walker")
            .field("nodes", &self.nodes.len())
            .field("max_hops", &self.max_hops)
            .finish_non_exhaustive()
    }
}

impl Walker {
    pub(crate) fn new(
        nodes: Arc<NodeTable>,
        tasks: &Arc<Mutex<TaskRegistry>>,
        scheduler: Scheduler,
        workers: WorkerPool,
        max_hops: Option<u32>,
    ) -> Self {
        Self {
            nodes,
            tasks: Arc::downgrade(tasks),
            scheduler,
            workers,
            max_hops,
        }
    }

    /// Walk the graph from `node_id` with a fresh variable context
    pub fn start(&self, node_id: &str, variables: Variables) -> Result<()> {
        let mut walk = Walk::new(self.clone(), variables);
        walk.goto(Some(node_id));
        walk.run()
    }

    pub fn nodes(&self) -> &NodeTable {
        &self.nodes
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn workers(&self) -> &WorkerPool {
        &self.workers
    }

    fn track(&self, handle: TaskHandle) {
        match self.tasks.upgrade() {
            Some(tasks) => {
                tasks.lock().track(handle);
            }
            None => {
                log::warn!("Task {} scheduled after its graph was dropped, cancelling", handle.id());
                handle.cancel();
            }
        }
    }
}

/// One traversal through the graph
pub struct Walk {
    walker: Walker,
    variables: Variables,
    pending: Option<String>,
    hops: u32,
}

impl std::fmt::Debug for Walk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Walk")
            .field("variables", &self.variables)
            .field("pending", &self.pending)
            .field("hops", &self.hops)
            .finish_non_exhaustive()
    }
}

impl Walk {
    fn new(walker: Walker, variables: Variables) -> Self {
        Self {
            walker,
            variables,
            pending: None,
            hops: 0,
        }
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut Variables {
        &mut self.variables
    }

    /// Nodes visited so far, including forks' ancestors
    pub fn hops(&self) -> u32 {
        self.hops
    }

    pub fn walker(&self) -> &Walker {
        &self.walker
    }

    /// Continue through the node's first output
    pub fn next(&mut self, node: &NodeInstance) -> Result<()> {
        let next = node.next_id()?;
        self.goto(next);
        Ok(())
    }

    /// Continue through a named output
    pub fn proceed(&mut self, node: &NodeInstance, output: &str) -> Result<()> {
        let output = node.output(output).ok_or_else(|| WorkflowError::UnknownOutput {
            node_id: node.id().to_string(),
            output: output.to_string(),
        })?;
        self.goto(output.next_id.as_deref());
        Ok(())
    }

    /// Continue at a node id; `None` ends the walk
    ///
    /// The last continuation set during one `execute` wins.
    pub fn goto(&mut self, next: Option<&str>) {
        self.pending = next.map(str::to_string);
    }

    /// Detach a copy of this walk for later continuation
    ///
    /// The copy carries a snapshot of the variables and the hop count; this
    /// walk ends unless the node also sets a continuation.
    pub fn fork(&self) -> Walk {
        Walk {
            walker: self.walker.clone(),
            variables: self.variables.clone(),
            pending: None,
            hops: self.hops,
        }
    }

    /// Continue a forked walk at `next`
    pub fn resume(mut self, next: Option<&str>) -> Result<()> {
        self.goto(next);
        self.run()
    }

    /// Run `task` after `delay`, tracked with this walk's graph
    pub fn schedule_once<F>(&self, delay: Duration, task: F) -> TaskHandle
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let handle = self.walker.scheduler.schedule_once(delay, task);
        self.walker.track(handle.clone());
        handle
    }

    /// Hand a fire-and-forget job to the worker pool
    pub fn submit<F>(&self, job: F) -> std::result::Result<(), SchedulingError>
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        self.walker.workers.submit(job)
    }

    fn run(&mut self) -> Result<()> {
        let nodes = Arc::clone(&self.walker.nodes);

        while let Some(id) = self.pending.take() {
            let Some(node) = nodes.get(&id) else {
                log::warn!("Walk reached unknown node '{}', stopping", id);
                break;
            };

            self.hops += 1;
            if let Some(limit) = self.walker.max_hops {
                if self.hops > limit {
                    log::error!("Walk exceeded {} hops at node '{}'", limit, id);
                    return Err(WorkflowError::HopLimitExceeded { limit, node_id: id });
                }
            }

            log::debug!("Walk hop {}: '{}' ({})", self.hops, id, node.node_type());
            node.behavior().execute(node, self)?;
        }

        Ok(())
    }
}
