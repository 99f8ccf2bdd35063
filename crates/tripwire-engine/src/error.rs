//! Error types for the workflow engine
//!
//! Load failures are fatal and abort the whole load. Field and expression
//! errors fail a single evaluation; the caller decides whether the walk for
//! that trigger aborts.

use thiserror::Error;

/// Result type alias using WorkflowError
pub type Result<T> = std::result::Result<T, WorkflowError>;

/// Errors raised while turning a persisted context into live nodes
#[derive(Debug, Error)]
pub enum LoadError {
    /// The descriptor names a node type nobody registered
    #[error("Node type not found: '{node_type}' (node '{node_id}')")]
    UnknownNodeType { node_id: String, node_type: String },

    /// The node type was registered as metadata only
    #[error("No constructor for node type '{node_type}' (node '{node_id}')")]
    NoConstructor { node_id: String, node_type: String },

    /// An edge names an output the node type does not declare
    #[error("Node output not found: '{output}' on node '{node_id}' ({node_type})")]
    UnknownOutput {
        node_id: String,
        node_type: String,
        output: String,
    },

    /// A field binding names a field the node type does not declare
    #[error("Node field not found: '{field}' on node '{node_id}' ({node_type})")]
    UnknownField {
        node_id: String,
        node_type: String,
        field: String,
    },

    /// A required consumer ended up without a value or a default
    #[error("Node field value is required: '{field}' on node '{node_id}' ({node_type})")]
    MissingRequiredField {
        node_id: String,
        node_type: String,
        field: String,
    },

    /// A bound value failed the field's validation
    #[error("Invalid value on node '{node_id}': {source}")]
    InvalidFieldValue {
        node_id: String,
        #[source]
        source: FieldValueError,
    },

    /// Two descriptors share an id
    #[error("Duplicate node id: '{node_id}'")]
    DuplicateNodeId { node_id: String },

    /// A node type name was registered twice
    #[error("Node already registered: '{node_type}'")]
    DuplicateNodeType { node_type: String },

    /// A node type declares the same field or output name twice
    #[error("Node type '{node_type}' declares {member} '{name}' more than once")]
    DuplicateMember {
        node_type: String,
        member: &'static str,
        name: String,
    },
}

/// Errors converting a field's configured value into a typed value
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldValueError {
    /// The raw value does not parse as the declared type
    #[error("Invalid {expected} value for field '{field}': '{value}'")]
    Malformed {
        field: String,
        value: String,
        expected: String,
    },

    /// The value is not one of the declared options
    #[error("Value '{value}' is not an option of field '{field}'")]
    NotAnOption { field: String, value: String },

    /// A type name that is not in the type catalog
    #[error("Unknown type '{value}' for field '{field}'")]
    UnknownType { field: String, value: String },

    /// The field has no value and no default
    #[error("Field '{field}' has no value")]
    Unbound { field: String },

    /// The field has no consumer half
    #[error("Field '{field}' does not consume a value")]
    NoConsumer { field: String },

    /// The field has no producer half
    #[error("Field '{field}' does not produce a value")]
    NoProducer { field: String },

    /// The node does not declare this field
    #[error("Unknown field '{field}'")]
    UnknownField { field: String },

    /// Expression-backed value could not be evaluated
    #[error("Field '{field}': {source}")]
    Expression {
        field: String,
        #[source]
        source: ExpressionError,
    },
}

/// Errors from the arithmetic/interpolation evaluator
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    /// Malformed expression text
    #[error("Parse error at {position} in '{expression}': {message}")]
    Parse {
        expression: String,
        position: usize,
        message: String,
    },

    /// A pure interpolation named a variable that is not set
    #[error("Unresolved variable: '{0}'")]
    Unresolved(String),

    /// Arithmetic on an absent operand, or an undefined operation
    #[error("Arithmetic error: {0}")]
    Arithmetic(String),

    /// A value could not be coerced to the required type
    #[error("Type error: expected {expected}, found '{found}'")]
    Type { expected: String, found: String },
}

/// Errors from the scheduler and worker pool
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulingError {
    /// A periodic task needs a non-zero period
    #[error("Invalid period for periodic task: {0:?}")]
    InvalidPeriod(std::time::Duration),

    /// Every worker is busy
    #[error("Worker pool saturated ({size} workers busy)")]
    PoolSaturated { size: usize },

    /// The pool has been shut down
    #[error("Worker pool is shut down")]
    PoolClosed,

    /// No tokio runtime is available to drive tasks
    #[error("No async runtime available")]
    NoRuntime,
}

/// Errors that can occur in the workflow engine
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Graph load failure
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Field conversion failure
    #[error(transparent)]
    FieldValue(#[from] FieldValueError),

    /// Expression evaluation failure
    #[error(transparent)]
    Expression(#[from] ExpressionError),

    /// Scheduling or worker pool failure
    #[error(transparent)]
    Scheduling(#[from] SchedulingError),

    /// `next()` called on a node that declares no outputs
    #[error("No outputs defined for node: '{node_id}' ({node_type})")]
    NoOutputs { node_id: String, node_type: String },

    /// `proceed()` called with an output name the node does not declare
    #[error("Node '{node_id}' has no output named '{output}'")]
    UnknownOutput { node_id: String, output: String },

    /// A walk took more hops than the configured limit
    #[error("Walk exceeded {limit} hops (last node '{node_id}')")]
    HopLimitExceeded { limit: u32, node_id: String },

    /// A listener reported a failure
    #[error("Listener failed: {0}")]
    Listener(String),

    /// Node execution failed
    #[error("Node execution failed: {0}")]
    ExecutionFailed(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkflowError {
    /// Create an execution failed error with a message
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::ExecutionFailed(msg.into())
    }

    /// Whether this error came from the loader
    pub fn is_load_error(&self) -> bool {
        matches!(self, Self::Load(_))
    }
}
