//! Error types for the analytics engine.
//!
//! Every failure is local to one request. The gateway turns an
//! [`EngineError`] into an `ERROR` message carrying both the human readable
//! message and the stable [`EngineError::code`].

use thiserror::Error;

/// Result type alias using [`EngineError`]
pub type Result<T> = std::result::Result<T, EngineError>;

/// Tagged error enum for all engine failures.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    /// The request `type` does not name a known operation.
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// An edge references a node id that is not part of the graph.
    #[error("Edge '{edge_id}' references unknown node '{node_id}'")]
    InvalidGraphReference { edge_id: String, node_id: String },

    /// Two nodes share the same id.
    #[error("Duplicate node id: {0}")]
    DuplicateNodeId(String),

    /// The request options could not be decoded or failed validation.
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// The request payload could not be decoded.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// The request was cancelled before it completed.
    #[error("Request was cancelled")]
    Cancelled,

    /// Unexpected failure inside an algorithm.
    #[error("Computation error: {0}")]
    Computation(String),

    /// The worker thread has shut down and no longer accepts requests.
    #[error("Analytics worker is not running")]
    WorkerUnavailable,

    /// The bounded request queue is full.
    #[error("Request queue is full")]
    QueueFull,
}

impl EngineError {
    /// Machine-readable error code carried in `ERROR` payloads.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownOperation(_) => "UNKNOWN_OPERATION",
            Self::InvalidGraphReference { .. } => "INVALID_GRAPH_REFERENCE",
            Self::DuplicateNodeId(_) => "DUPLICATE_NODE_ID",
            Self::InvalidOptions(_) => "INVALID_OPTIONS",
            Self::InvalidPayload(_) => "INVALID_PAYLOAD",
            Self::Cancelled => "CANCELLED",
            Self::Computation(_) => "COMPUTATION_ERROR",
            Self::WorkerUnavailable => "WORKER_UNAVAILABLE",
            Self::QueueFull => "QUEUE_FULL",
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidOptions(e.to_string())
    }
}
