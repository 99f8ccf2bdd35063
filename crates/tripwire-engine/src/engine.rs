//! The workflow engine
//!
//! Owns the node type registry, the type catalog, the store and the live
//! graph. The live graph (node table, listener map, task registry) sits
//! behind one lock and is replaced wholesale by every `load` and `clear`.
//!
//! # Lock order
//!
//! `state` → `store` / `registry` / `catalog` → a graph's task registry.
//! Listeners and walks run with no engine lock held.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::EngineConfig;
use crate::descriptor::NodeMetadata;
use crate::error::{Result, SchedulingError};
use crate::events::{self, Event, EventBus, EventKey, Listener, TypeCatalog};
use crate::field::FieldKind;
use crate::node::{NodeFactory, NodeInstance, NodeRuntime};
use crate::registry::NodeRegistry;
use crate::scheduler::{Scheduler, TaskHandle, TaskRegistry};
use crate::store::{Blob, WorkflowStore};
use crate::types::WorkflowContext;
use crate::validation::{validate_context, ValidationError};
use crate::walk::{NodeTable, Walker};
use crate::workers::WorkerPool;

/// Everything that belongs to one loaded graph
#[derive(Default)]
struct GraphState {
    generation: u64,
    context: WorkflowContext,
    nodes: Arc<NodeTable>,
    events: EventBus,
    tasks: Arc<Mutex<TaskRegistry>>,
}

struct EngineInner {
    config: EngineConfig,
    registry: RwLock<NodeRegistry>,
    catalog: RwLock<TypeCatalog>,
    scheduler: Scheduler,
    workers: WorkerPool,
    store: Mutex<WorkflowStore>,
    state: Mutex<GraphState>,
}

impl EngineInner {
    fn walker(&self, nodes: &Arc<NodeTable>, tasks: &Arc<Mutex<TaskRegistry>>) -> Walker {
        Walker::new(
            Arc::clone(nodes),
            tasks,
            self.scheduler.clone(),
            self.workers.clone(),
            self.config.max_hops,
        )
    }

    /// Unload every node, drop listeners and cancel tasks of a retired graph
    fn teardown(&self, old: GraphState) {
        let GraphState {
            generation,
            nodes,
            mut events,
            tasks,
            ..
        } = old;

        if !nodes.is_empty() {
            let catalog = self.catalog.read();
            let mut runtime = NodeRuntime {
                events: &mut events,
                tasks: &tasks,
                walker: self.walker(&nodes, &tasks),
                scheduler: &self.scheduler,
                workers: &self.workers,
                catalog: &catalog,
            };
            for node in nodes.iter() {
                node.behavior().unload(node, &mut runtime);
            }
        }

        let listeners = events.len();
        events.clear();
        let cancelled = tasks.lock().close();

        if generation > 0 {
            log::info!(
                "Graph {} unloaded ({} nodes, {} listeners, {} tasks cancelled)",
                generation,
                nodes.len(),
                listeners,
                cancelled
            );
        }
    }

    /// Instantiate, wire and initialise every node of `context`
    ///
    /// All nodes are wired before the first `init` runs, so a wiring failure
    /// leaves nothing subscribed or scheduled.
    fn build(&self, context: &WorkflowContext, generation: u64) -> Result<GraphState> {
        let mut table = NodeTable::new();
        {
            let registry = self.registry.read();
            for entry in &context.nodes {
                let (metadata, behavior) = registry.instantiate(&entry.id, &entry.name)?;
                table.insert(NodeInstance::from_entry(entry, metadata, behavior)?)?;
            }
        }

        let nodes = Arc::new(table);
        let tasks = Arc::new(Mutex::new(TaskRegistry::new()));
        let mut events = EventBus::new();

        {
            let catalog = self.catalog.read();
            let mut runtime = NodeRuntime {
                events: &mut events,
                tasks: &tasks,
                walker: self.walker(&nodes, &tasks),
                scheduler: &self.scheduler,
                workers: &self.workers,
                catalog: &catalog,
            };
            for (index, node) in nodes.iter().enumerate() {
                if let Err(e) = node.behavior().init(node, &mut runtime) {
                    log::error!("Init failed for node '{}' ({}): {}", node.id(), node.node_type(), e);
                    // Nodes already initialised may hold listeners that capture the table
                    for loaded in nodes.iter().take(index) {
                        loaded.behavior().unload(loaded, &mut runtime);
                    }
                    drop(runtime);
                    events.clear();
                    tasks.lock().close();
                    return Err(e);
                }
                log::debug!("Node loaded: {:?}", node);
            }
        }

        Ok(GraphState {
            generation,
            context: context.clone(),
            nodes,
            events,
            tasks,
        })
    }
}

/// Builder for [`WorkflowEngine`]
pub struct EngineBuilder {
    config: EngineConfig,
    registry: NodeRegistry,
    catalog: TypeCatalog,
    scheduler: Option<Scheduler>,
    workers: Option<WorkerPool>,
    store: Option<WorkflowStore>,
}

impl EngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            registry: NodeRegistry::new(),
            catalog: TypeCatalog::new(),
            scheduler: None,
            workers: None,
            store: None,
        }
    }

    pub fn registry(mut self, registry: NodeRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn catalog(mut self, catalog: TypeCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Timer to use; defaults to the current runtime
    pub fn scheduler(mut self, scheduler: Scheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Worker pool to use; defaults to `worker_pool_size` workers on the
    /// scheduler's runtime
    pub fn workers(mut self, workers: WorkerPool) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Store to use; defaults to the configured data directory
    pub fn store(mut self, store: WorkflowStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> Result<WorkflowEngine> {
        let scheduler = match self.scheduler {
            Some(scheduler) => scheduler,
            None => Scheduler::current()?,
        };
        let workers = self
            .workers
            .unwrap_or_else(|| WorkerPool::new(scheduler.handle().clone(), self.config.worker_pool_size));
        let store = match self.store {
            Some(store) => store,
            None => WorkflowStore::open(&self.config.data_dir)?,
        };

        log::info!(
            "Workflow engine ready ({} node types, {} workers)",
            self.registry.len(),
            workers.size()
        );

        Ok(WorkflowEngine {
            inner: Arc::new(EngineInner {
                config: self.config,
                registry: RwLock::new(self.registry),
                catalog: RwLock::new(self.catalog),
                scheduler,
                workers,
                store: Mutex::new(store),
                state: Mutex::new(GraphState::default()),
            }),
        })
    }
}

/// Handle to a running workflow engine; clones share the same engine
#[derive(Clone)]
pub struct WorkflowEngine {
    inner: Arc<EngineInner>,
}

impl WorkflowEngine {
    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    pub fn workers(&self) -> &WorkerPool {
        &self.inner.workers
    }

    // =========================================================================
    // Registry and type catalog
    // =========================================================================

    /// Register a node type; duplicates are rejected
    pub fn register(&self, metadata: NodeMetadata, factory: impl NodeFactory + 'static) -> Result<()> {
        self.inner.registry.write().register(metadata, factory)?;
        Ok(())
    }

    pub fn registry(&self) -> RwLockReadGuard<'_, NodeRegistry> {
        self.inner.registry.read()
    }

    pub fn registry_mut(&self) -> RwLockWriteGuard<'_, NodeRegistry> {
        self.inner.registry.write()
    }

    /// Make event type `E` selectable by `name` in type-valued fields
    pub fn register_event_type<E: Event>(&self, name: impl Into<String>) {
        self.inner.catalog.write().register::<E>(name);
    }

    pub fn catalog(&self) -> RwLockReadGuard<'_, TypeCatalog> {
        self.inner.catalog.read()
    }

    pub fn catalog_mut(&self) -> RwLockWriteGuard<'_, TypeCatalog> {
        self.inner.catalog.write()
    }

    /// Metadata of every registered node type, for editors
    ///
    /// Type-valued fields without options list the catalog's event names.
    pub fn node_types(&self) -> Vec<NodeMetadata> {
        let names: Vec<String> = self
            .inner
            .catalog
            .read()
            .names()
            .into_iter()
            .map(str::to_string)
            .collect();

        self.inner
            .registry
            .read()
            .all_metadata()
            .into_iter()
            .map(|metadata| {
                let mut metadata = metadata.clone();
                for field in &mut metadata.fields {
                    if let Some(consumer) = field.consumer_mut() {
                        if consumer.kind() == FieldKind::Class && consumer.option_list().is_empty() {
                            consumer.add_options(&names);
                        }
                    }
                }
                metadata
            })
            .collect()
    }

    // =========================================================================
    // Graph lifecycle
    // =========================================================================

    /// Replace the live graph with `context`
    ///
    /// Tears the old graph down, persists `context`, then wires and
    /// initialises the new one. On failure the engine is left with no live
    /// nodes; the persisted copy is already `context`.
    pub fn load(&self, context: WorkflowContext) -> Result<()> {
        log::info!("Loading workflow ({} nodes)", context.len());
        let mut state = self.inner.state.lock();

        let old = std::mem::take(&mut *state);
        let generation = old.generation + 1;
        self.inner.teardown(old);
        state.generation = generation;
        state.context = context.clone();

        self.inner.store.lock().write_context(&context)?;

        *state = self.inner.build(&context, generation)?;
        let (nodes, listeners, tasks) = (state.nodes.len(), state.events.len(), state.tasks.lock().len());
        drop(state);

        for finding in validate_context(&context, Some(&self.inner.registry.read())) {
            log::warn!("Workflow: {}", finding);
        }
        log::info!(
            "Graph {} loaded ({} nodes, {} listeners, {} tasks)",
            generation,
            nodes,
            listeners,
            tasks
        );
        Ok(())
    }

    /// Load the persisted graph from the store
    pub fn load_from_store(&self) -> Result<()> {
        let context = self.inner.store.lock().read_context()?;
        self.load(context)
    }

    /// Unload the live graph; registered node types stay
    pub fn clear(&self) {
        let mut state = self.inner.state.lock();
        let old = std::mem::take(&mut *state);
        state.generation = old.generation + 1;
        self.inner.teardown(old);
        log::info!("Workflow unloaded");
    }

    /// The context the live graph was loaded from
    pub fn context(&self) -> WorkflowContext {
        self.inner.state.lock().context.clone()
    }

    /// Ids of the live nodes in load order
    pub fn node_ids(&self) -> Vec<String> {
        self.inner.state.lock().nodes.ids().to_vec()
    }

    /// Increments on every load and clear
    pub fn generation(&self) -> u64 {
        self.inner.state.lock().generation
    }

    /// Check the live context against the registry
    pub fn validate(&self) -> Vec<ValidationError> {
        let context = self.context();
        let registry = self.inner.registry.read();
        validate_context(&context, Some(&registry))
    }

    /// Start a walk at `node_id` of the live graph
    pub fn walker(&self) -> Walker {
        let state = self.inner.state.lock();
        self.inner.walker(&state.nodes, &state.tasks)
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Subscribe on the live graph; dropped by the next load or clear
    pub fn on(&self, key: EventKey, listener: Listener) -> Listener {
        self.inner.state.lock().events.on(key, listener)
    }

    pub fn remove(&self, key: &EventKey, listener: &Listener) -> bool {
        self.inner.state.lock().events.remove(key, listener)
    }

    /// Deliver a host event; returns the number of failed listeners
    pub fn fire<E: Event>(&self, event: E, before: bool) -> usize {
        self.fire_shared(Arc::new(event), before)
    }

    /// Deliver an already shared event
    ///
    /// Listeners run after the engine lock is released, so they may start
    /// walks, schedule tasks or even reload the graph.
    pub fn fire_shared(&self, event: Arc<dyn Event>, before: bool) -> usize {
        let listeners = self.inner.state.lock().events.listeners(&event.key());
        events::deliver(&listeners, &event, before)
    }

    // =========================================================================
    // Scheduling
    // =========================================================================

    /// Run `task` once after `delay`; cancelled with the live graph
    pub fn schedule_once<F>(&self, delay: Duration, task: F) -> TaskHandle
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let state = self.inner.state.lock();
        let handle = self.inner.scheduler.schedule_once(delay, task);
        state.tasks.lock().track(handle.clone());
        handle
    }

    /// Run `task` every `period`; cancelled with the live graph
    pub fn schedule_at_fixed_rate<F>(
        &self,
        initial_delay: Duration,
        period: Duration,
        task: F,
    ) -> std::result::Result<TaskHandle, SchedulingError>
    where
        F: FnMut() -> Result<()> + Send + 'static,
    {
        let state = self.inner.state.lock();
        let handle = self
            .inner
            .scheduler
            .schedule_at_fixed_rate(initial_delay, period, task)?;
        state.tasks.lock().track(handle.clone());
        Ok(handle)
    }

    /// Run `task` repeatedly with `delay` between runs; cancelled with the
    /// live graph
    pub fn schedule_with_fixed_delay<F>(
        &self,
        initial_delay: Duration,
        delay: Duration,
        task: F,
    ) -> std::result::Result<TaskHandle, SchedulingError>
    where
        F: FnMut() -> Result<()> + Send + 'static,
    {
        let state = self.inner.state.lock();
        let handle = self
            .inner
            .scheduler
            .schedule_with_fixed_delay(initial_delay, delay, task)?;
        state.tasks.lock().track(handle.clone());
        Ok(handle)
    }

    /// Number of tasks tracked by the live graph
    pub fn task_count(&self) -> usize {
        self.inner.state.lock().tasks.lock().len()
    }

    /// Hand a job to the worker pool
    pub fn submit<F>(&self, job: F) -> std::result::Result<(), SchedulingError>
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        self.inner.workers.submit(job)
    }

    // =========================================================================
    // Blobs
    // =========================================================================

    pub fn read_blob(&self, blob: Blob) -> Result<serde_json::Value> {
        self.inner.store.lock().read_blob(blob)
    }

    pub fn write_blob(&self, blob: Blob, value: &serde_json::Value) -> Result<()> {
        self.inner.store.lock().write_blob(blob, value)
    }

    /// Unload the graph, then wait for running worker jobs
    ///
    /// Returns whether the worker pool drained within the configured timeout.
    pub async fn shutdown(&self) -> bool {
        self.clear();
        self.inner.workers.shutdown(self.inner.config.drain_timeout()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{NodeColor, NodeGroup};
    use crate::error::{LoadError, WorkflowError};
    use crate::field::{Consumer, Field, Producer};
    use crate::node::WorkflowNode;
    use crate::types::{FieldState, NodeEntry};
    use crate::value::{StructuredValue, Value, Variables};
    use crate::walk::Walk;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Ping {
        from: String,
    }

    impl StructuredValue for Ping {
        fn get_field(&self, name: &str) -> Option<Value> {
            (name == "from").then(|| Value::from(self.from.as_str()))
        }
    }

    impl Event for Ping {}

    /// Starts a walk on every `Ping`
    struct OnPing;

    impl WorkflowNode for OnPing {
        fn init(&self, node: &NodeInstance, runtime: &mut NodeRuntime<'_>) -> Result<()> {
            let walker = runtime.walker().clone();
            let next = node.next_id()?.map(str::to_string);
            runtime.on(
                EventKey::of::<Ping>(),
                events::listener::<Ping, _>(move |ping, _before| {
                    let mut vars = Variables::new();
                    vars.insert("from", ping.from.as_str());
                    match &next {
                        Some(next) => walker.start(next, vars),
                        None => Ok(()),
                    }
                }),
            );
            Ok(())
        }
    }

    /// Records its interpolated `text`
    struct Record {
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl WorkflowNode for Record {
        fn execute(&self, node: &NodeInstance, walk: &mut Walk) -> Result<()> {
            let text = node.consumer("text")?.as_string(walk.variables());
            self.seen.lock().push(text);
            walk.next(node)
        }
    }

    /// Counts unloads and fails init on demand
    struct Lifecycle {
        unloads: Arc<AtomicUsize>,
    }

    impl WorkflowNode for Lifecycle {
        fn init(&self, node: &NodeInstance, runtime: &mut NodeRuntime<'_>) -> Result<()> {
            if node.consumer("fail")?.as_boolean()? {
                return Err(WorkflowError::failed("init refused"));
            }
            runtime.schedule_once(Duration::from_secs(60), || Ok(()));
            Ok(())
        }

        fn unload(&self, _node: &NodeInstance, _runtime: &mut NodeRuntime<'_>) {
            self.unloads.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Fixture {
        engine: WorkflowEngine,
        seen: Arc<Mutex<Vec<String>>>,
        unloads: Arc<AtomicUsize>,
    }

    fn fixture() -> Fixture {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let unloads = Arc::new(AtomicUsize::new(0));

        let mut registry = NodeRegistry::new();
        registry
            .register(
                NodeMetadata::new("OnPing", NodeGroup::Trigger, NodeColor::Emerald)
                    .inputs(0)
                    .output("Next", "On ping"),
                || Box::new(OnPing) as Box<dyn WorkflowNode>,
            )
            .unwrap();
        let record_seen = seen.clone();
        registry
            .register(
                NodeMetadata::new("Record", NodeGroup::Action, NodeColor::Lime)
                    .field(Field::new("text").consume(Consumer::string()))
                    .output("Next", "Continue"),
                move || Box::new(Record { seen: record_seen.clone() }) as Box<dyn WorkflowNode>,
            )
            .unwrap();
        let lifecycle_unloads = unloads.clone();
        registry
            .register(
                NodeMetadata::new("Lifecycle", NodeGroup::Control, NodeColor::Violet)
                    .field(Field::new("fail").consume(Consumer::boolean().default_value("false")))
                    .field(Field::new("out").produce(Producer::new())),
                move || {
                    Box::new(Lifecycle {
                        unloads: lifecycle_unloads.clone(),
                    }) as Box<dyn WorkflowNode>
                },
            )
            .unwrap();

        let engine = EngineBuilder::new(EngineConfig::default())
            .registry(registry)
            .store(WorkflowStore::in_memory())
            .build()
            .unwrap();

        Fixture {
            engine,
            seen,
            unloads,
        }
    }

    fn ping_graph(text: &str) -> WorkflowContext {
        let mut trigger = NodeEntry::new("p", "OnPing");
        trigger.state.outputs.insert("Next".to_string(), Some("r".to_string()));
        let mut record = NodeEntry::new("r", "Record");
        record.state.fields.insert("text".to_string(), FieldState::consumer(text));
        WorkflowContext {
            nodes: vec![trigger, record],
        }
    }

    fn lifecycle(id: &str, fail: bool) -> NodeEntry {
        let mut entry = NodeEntry::new(id, "Lifecycle");
        entry
            .state
            .fields
            .insert("fail".to_string(), FieldState::consumer(fail.to_string()));
        entry
    }

    #[tokio::test]
    async fn test_fire_walks_graph() {
        let f = fixture();
        f.engine.load(ping_graph("ping from {{from}}")).unwrap();

        assert_eq!(f.engine.fire(Ping { from: "core".to_string() }, false), 0);
        assert_eq!(*f.seen.lock(), vec!["ping from core"]);
        assert_eq!(f.engine.node_ids(), vec!["p", "r"]);
    }

    #[tokio::test]
    async fn test_reload_replaces_listeners() {
        let f = fixture();
        f.engine.load(ping_graph("first")).unwrap();
        f.engine.load(ping_graph("second")).unwrap();

        f.engine.fire(Ping { from: "x".to_string() }, true);
        assert_eq!(*f.seen.lock(), vec!["second"]);
        assert_eq!(f.engine.generation(), 2);
    }

    #[tokio::test]
    async fn test_clear_drops_graph_but_keeps_types() {
        let f = fixture();
        f.engine.load(WorkflowContext { nodes: vec![lifecycle("l", false)] }).unwrap();
        assert_eq!(f.engine.task_count(), 1);

        f.engine.clear();
        assert_eq!(f.unloads.load(Ordering::SeqCst), 1);
        assert_eq!(f.engine.task_count(), 0);
        assert!(f.engine.node_ids().is_empty());
        assert!(f.engine.registry().has_node_type("Lifecycle"));

        f.engine.load(ping_graph("again")).unwrap();
        f.engine.fire(Ping { from: "x".to_string() }, false);
        assert_eq!(*f.seen.lock(), vec!["again"]);
    }

    #[tokio::test]
    async fn test_load_errors_are_fatal_and_persisted_first() {
        let f = fixture();
        let mut bad = ping_graph("x");
        bad.nodes.push(NodeEntry::new("q", "Teleport"));

        let err = f.engine.load(bad.clone()).unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Load(LoadError::UnknownNodeType { ref node_type, .. }) if node_type == "Teleport"
        ));
        assert!(f.engine.node_ids().is_empty());
        assert_eq!(f.engine.context(), bad);

        // Nothing from the half-built graph is subscribed
        assert_eq!(f.engine.fire(Ping { from: "x".to_string() }, false), 0);
        assert!(f.seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_failed_init_cancels_new_tasks() {
        let f = fixture();
        let context = WorkflowContext {
            nodes: vec![lifecycle("ok", false), lifecycle("bad", true)],
        };

        let err = f.engine.load(context).unwrap_err();
        assert!(matches!(err, WorkflowError::ExecutionFailed(_)));
        assert_eq!(f.engine.task_count(), 0);
        assert!(f.engine.node_ids().is_empty());
    }

    #[tokio::test]
    async fn test_failed_init_unloads_initialised_nodes() {
        let f = fixture();
        let context = WorkflowContext {
            nodes: vec![lifecycle("a", false), lifecycle("b", false), lifecycle("bad", true)],
        };

        f.engine.load(context).unwrap_err();
        assert_eq!(f.unloads.load(Ordering::SeqCst), 2);

        // The failing node and anything after it never ran init
        let context = WorkflowContext {
            nodes: vec![lifecycle("bad", true), lifecycle("c", false)],
        };
        f.engine.load(context).unwrap_err();
        assert_eq!(f.unloads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_round_trip_is_stable() {
        let f = fixture();
        let context = ping_graph("roll: {{r}}");
        f.engine.load(context.clone()).unwrap();

        let text = f.engine.context().to_json_pretty().unwrap();
        let reparsed = WorkflowContext::from_json(&text).unwrap();
        f.engine.load(reparsed.clone()).unwrap();

        assert_eq!(reparsed, context);
        assert_eq!(f.engine.context(), context);
        assert_eq!(f.engine.node_ids(), vec!["p", "r"]);
    }

    #[tokio::test]
    async fn test_host_listener_and_remove() {
        let f = fixture();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let key = EventKey::of::<Ping>();
        let listener = f.engine.on(
            key,
            Arc::new(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );

        f.engine.fire(Ping { from: "a".to_string() }, false);
        assert!(f.engine.remove(&key, &listener));
        f.engine.fire(Ping { from: "b".to_string() }, false);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_blobs_and_metadata_export() {
        let f = fixture();
        f.engine
            .write_blob(Blob::Data, &serde_json::json!({"greeting": "hi"}))
            .unwrap();
        assert_eq!(f.engine.read_blob(Blob::Data).unwrap()["greeting"], "hi");
        assert_eq!(f.engine.read_blob(Blob::State).unwrap(), serde_json::json!({}));

        let names: Vec<String> = f.engine.node_types().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["Lifecycle", "OnPing", "Record"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shutdown_clears_and_drains() {
        let f = fixture();
        f.engine.load(WorkflowContext { nodes: vec![lifecycle("l", false)] }).unwrap();

        assert!(f.engine.shutdown().await);
        assert_eq!(f.unloads.load(Ordering::SeqCst), 1);
        assert!(f.engine.workers().is_closed());
        assert_eq!(
            f.engine.submit(|| Ok(())),
            Err(SchedulingError::PoolClosed)
        );
    }
}
