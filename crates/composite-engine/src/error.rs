//! Error types for the composite engine

use thiserror::Error;

use crate::validation::ValidationReport;

/// Result type alias using EngineError
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur in the composite engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Document text is not valid JSON
    #[error("Document parse error: {0}")]
    Parse(String),

    /// Structural or semantic validation failed
    #[error("Validation failed with {} error(s)", .0.errors.len())]
    Validation(Box<ValidationReport>),

    /// An edge references a node that is not among the executing children
    #[error("Edge '{edge_id}' references unknown node '{node_id}'")]
    UnresolvedEdge { edge_id: String, node_id: String },

    /// The dependency graph contains a cycle
    #[error("Cycle detected among nodes: {}", .nodes.join(", "))]
    CycleDetected { nodes: Vec<String> },

    /// No leaf implementation is registered for a node type
    #[error("No leaf type registered for '{node_type}' (node '{node_id}')")]
    UnknownNodeType { node_id: String, node_type: String },

    /// A single node attempt exceeded its time budget
    #[error("Node '{node_id}' timed out after {timeout_ms}ms")]
    Timeout { node_id: String, timeout_ms: u64 },

    /// A node exhausted its retry budget
    #[error("Node '{node_id}' failed after {attempts} attempt(s): {source}")]
    NodeFailed {
        node_id: String,
        attempts: u32,
        #[source]
        source: Box<EngineError>,
    },

    /// A child could not be turned into an executable instance
    #[error("Node '{node_id}' could not be instantiated: {source}")]
    NodeSetup {
        node_id: String,
        #[source]
        source: Box<EngineError>,
    },

    /// Leaf node execution failed
    #[error("Task execution failed: {0}")]
    ExecutionFailed(String),

    /// Node configuration could not be interpreted
    #[error("Invalid node configuration: {0}")]
    InvalidConfig(String),

    /// Byte store lookup found nothing under the key
    #[error("Key not found in store: {0}")]
    NotFound(String),

    /// Byte store failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Create an execution failed error with a message
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::ExecutionFailed(msg.into())
    }

    /// Attribute an instantiation error to `node_id` unless it already names a node
    pub fn for_node(self, node_id: &str) -> Self {
        if self.node_id().is_some() {
            return self;
        }
        Self::NodeSetup {
            node_id: node_id.to_string(),
            source: Box::new(self),
        }
    }

    /// Wrap a validation report
    pub fn validation(report: ValidationReport) -> Self {
        Self::Validation(Box::new(report))
    }

    /// Stable machine-readable code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::Parse(_) => "PARSE_ERROR",
            Self::Validation(_) => "VALIDATION_FAILED",
            Self::UnresolvedEdge { .. } => "UNRESOLVED_EDGE",
            Self::CycleDetected { .. } => "CYCLE_DETECTED",
            Self::UnknownNodeType { .. } => "UNKNOWN_NODE_TYPE",
            Self::Timeout { .. } => "NODE_TIMEOUT",
            Self::NodeFailed { .. } => "NODE_FAILED",
            Self::NodeSetup { source, .. } => source.code(),
            Self::ExecutionFailed(_) => "EXECUTION_FAILED",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Io(_) => "IO_ERROR",
        }
    }

    /// The node this error originated from, if any
    pub fn node_id(&self) -> Option<&str> {
        match self {
            Self::UnknownNodeType { node_id, .. }
            | Self::Timeout { node_id, .. }
            | Self::NodeFailed { node_id, .. }
            | Self::NodeSetup { node_id, .. } => Some(node_id),
            _ => None,
        }
    }

    /// The validation report carried by this error, if any
    pub fn report(&self) -> Option<&ValidationReport> {
        match self {
            Self::Validation(report) => Some(report),
            Self::NodeSetup { source, .. } => source.report(),
            _ => None,
        }
    }
}
