//! Tripwire Engine - Event-driven node graph workflows
//!
//! This crate runs user-authored graphs of typed nodes inside a host
//! process. Trigger nodes subscribe to host events or timers; when they fire,
//! a walk runs node after node, each one deciding which output to follow.
//! It supports:
//!
//! - Typed field bindings with `{{path}}` interpolation and arithmetic
//! - Event listeners keyed by event type (and optional variant)
//! - Delayed and periodic tasks, cancelled when the graph is replaced
//! - A bounded blocking worker pool for slow side effects
//! - Persistence of the graph and two opaque blobs
//!
//! # Architecture
//!
//! - `NodeRegistry`: node type name → metadata + factory
//! - `WorkflowEngine`: owns the live graph; `load` replaces it wholesale
//! - `Walker` / `Walk`: follow outputs from a starting node with private
//!   variables
//! - `EventBus`, `Scheduler`, `WorkerPool`: the ambient services nodes use
//!
//! # Example
//!
//! ```ignore
//! use tripwire_engine::{EngineConfig, WorkflowEngine, WorkflowContext};
//!
//! let engine = WorkflowEngine::builder(EngineConfig::from_env())
//!     .registry(registry)
//!     .build()?;
//! engine.load_from_store()?;
//! engine.fire(PlayerJoin { name: "ada".into() }, false);
//! ```

pub mod builder;
pub mod config;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod events;
pub mod expression;
pub mod field;
pub mod node;
pub mod registry;
pub mod scheduler;
pub mod store;
pub mod types;
pub mod validation;
pub mod value;
pub mod walk;
pub mod workers;

// Re-export key types
pub use builder::ContextBuilder;
pub use config::EngineConfig;
pub use descriptor::{NodeColor, NodeDescriptor, NodeGroup, NodeMetadata, OutputSpec};
pub use engine::{EngineBuilder, WorkflowEngine};
pub use error::{
    ExpressionError, FieldValueError, LoadError, Result, SchedulingError, WorkflowError,
};
pub use events::{listener, Event, EventBus, EventKey, Listener, TypeCatalog};
pub use field::{Consumer, Field, FieldKind, FieldOption, Producer, Unit};
pub use node::{NodeFactory, NodeInstance, NodeRuntime, Output, WorkflowNode};
pub use registry::NodeRegistry;
pub use scheduler::{Scheduler, TaskHandle, TaskRegistry};
pub use store::{Blob, WorkflowStore};
pub use types::{FieldState, NodeEntry, NodeId, NodeState, WorkflowContext};
pub use validation::{validate_context, ValidationError};
pub use value::{StructuredValue, Value, ValueKind, Variables};
pub use walk::{NodeTable, Walk, Walker};
pub use workers::WorkerPool;
