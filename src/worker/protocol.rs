//! Worker message protocol.
//!
//! Requests and replies are plain JSON objects so the engine can sit behind
//! any message boundary (in-process channel, stdio, a socket):
//!
//! ```text
//! in:  { "type": "CALCULATE_CENTRALITY", "payload": { "graphData": ..., "options": {...} }, "id": "r1" }
//! out: { "type": "PROGRESS", "payload": { "progress": 0.4 }, "id": "r1" }
//!      { "type": "SUCCESS",  "payload": {...}, "id": "r1", "processingTime": 12.5 }
//!      { "type": "ERROR",    "payload": { "error": "...", "code": "..." }, "id": "r1" }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

use crate::error::EngineError;
use crate::graph::models::GraphData;

/// Control line type understood by the stdio host.
pub const CANCEL_TYPE: &str = "CANCEL";

/// An analysis request.
///
/// `kind` stays a raw string so that an unknown operation still decodes
/// and can be answered with an `ERROR` carrying the request id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRequest {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: RequestPayload,
    pub id: String,
}

impl WorkerRequest {
    pub fn new(kind: RequestKind, id: impl Into<String>, graph_data: GraphData) -> Self {
        Self {
            kind: kind.to_string(),
            payload: RequestPayload {
                graph_data,
                options: None,
            },
            id: id.into(),
        }
    }

    /// Attach an options object.
    pub fn with_options(mut self, options: Value) -> Self {
        self.payload.options = Some(options);
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPayload {
    #[serde(default)]
    pub graph_data: GraphData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
}

/// Operations the gateway can dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    CalculateCentrality,
    AnalyzeTopology,
    OptimizeLayout,
    DetectCommunities,
    FindShortestPath,
}

impl RequestKind {
    pub const ALL: [RequestKind; 5] = [
        Self::CalculateCentrality,
        Self::AnalyzeTopology,
        Self::OptimizeLayout,
        Self::DetectCommunities,
        Self::FindShortestPath,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CalculateCentrality => "CALCULATE_CENTRALITY",
            Self::AnalyzeTopology => "ANALYZE_TOPOLOGY",
            Self::OptimizeLayout => "OPTIMIZE_LAYOUT",
            Self::DetectCommunities => "DETECT_COMMUNITIES",
            Self::FindShortestPath => "FIND_SHORTEST_PATH",
        }
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| EngineError::UnknownOperation(s.to_string()))
    }
}

/// `ERROR` payload: human message plus stable code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error: String,
    pub code: String,
}

/// `PROGRESS` payload, a fraction in [0, 1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressPayload {
    pub progress: f64,
}

/// A reply from the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
    Success {
        payload: Value,
        id: String,
        /// Wall-clock milliseconds spent handling the request
        #[serde(rename = "processingTime")]
        processing_time: f64,
    },
    Error {
        payload: ErrorPayload,
        id: String,
    },
    Progress {
        payload: ProgressPayload,
        id: String,
    },
}

impl WorkerMessage {
    pub fn success(id: &str, payload: Value, processing_time: f64) -> Self {
        Self::Success {
            payload,
            id: id.to_string(),
            processing_time,
        }
    }

    pub fn error(id: &str, err: &EngineError) -> Self {
        Self::Error {
            payload: ErrorPayload {
                error: err.to_string(),
                code: err.code().to_string(),
            },
            id: id.to_string(),
        }
    }

    pub fn progress(id: &str, progress: f64) -> Self {
        Self::Progress {
            payload: ProgressPayload { progress },
            id: id.to_string(),
        }
    }

    /// Id of the request this message answers.
    pub fn id(&self) -> &str {
        match self {
            Self::Success { id, .. } | Self::Error { id, .. } | Self::Progress { id, .. } => id,
        }
    }

    /// `SUCCESS` and `ERROR` end a request; `PROGRESS` does not.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress { .. })
    }

    /// Error code of an `ERROR` message.
    pub fn error_code(&self) -> Option<&str> {
        match self {
            Self::Error { payload, .. } => Some(&payload.code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_decodes_wire_shape() {
        let value = json!({
            "type": "OPTIMIZE_LAYOUT",
            "payload": {
                "graphData": {"nodes": [], "edges": []},
                "options": {"iterations": 5}
            },
            "id": "req-1"
        });
        let request: WorkerRequest = serde_json::from_value(value).unwrap();
        assert_eq!(request.kind, "OPTIMIZE_LAYOUT");
        assert_eq!(request.id, "req-1");
        assert_eq!(request.payload.options, Some(json!({"iterations": 5})));
        assert_eq!(
            request.kind.parse::<RequestKind>().unwrap(),
            RequestKind::OptimizeLayout
        );
    }

    #[test]
    fn test_request_without_options() {
        let value = json!({"type": "ANALYZE_TOPOLOGY", "payload": {"graphData": {}}, "id": "x"});
        let request: WorkerRequest = serde_json::from_value(value).unwrap();
        assert!(request.payload.options.is_none());
        assert!(request.payload.graph_data.nodes.is_empty());
    }

    #[test]
    fn test_unknown_kind() {
        let err = "SORT_NODES".parse::<RequestKind>().unwrap_err();
        assert_eq!(err, EngineError::UnknownOperation("SORT_NODES".into()));
        for kind in RequestKind::ALL {
            assert_eq!(kind.as_str().parse::<RequestKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_message_wire_shapes() {
        let success = WorkerMessage::success("r1", json!({"nodeCount": 3}), 1.5);
        assert_eq!(
            serde_json::to_value(&success).unwrap(),
            json!({"type": "SUCCESS", "payload": {"nodeCount": 3}, "id": "r1", "processingTime": 1.5})
        );

        let error = WorkerMessage::error("r2", &EngineError::UnknownOperation("FOO".into()));
        assert_eq!(
            serde_json::to_value(&error).unwrap(),
            json!({
                "type": "ERROR",
                "payload": {"error": "Unknown operation: FOO", "code": "UNKNOWN_OPERATION"},
                "id": "r2"
            })
        );

        let progress = WorkerMessage::progress("r3", 0.5);
        assert_eq!(
            serde_json::to_value(&progress).unwrap(),
            json!({"type": "PROGRESS", "payload": {"progress": 0.5}, "id": "r3"})
        );
    }

    #[test]
    fn test_terminal_and_accessors() {
        let progress = WorkerMessage::progress("a", 0.1);
        assert!(!progress.is_terminal());
        assert_eq!(progress.id(), "a");
        assert!(progress.error_code().is_none());

        let error = WorkerMessage::error("b", &EngineError::Cancelled);
        assert!(error.is_terminal());
        assert_eq!(error.error_code(), Some("CANCELLED"));
    }

    #[test]
    fn test_message_roundtrip_from_json() {
        let value = json!({"type": "PROGRESS", "payload": {"progress": 0.2}, "id": "r"});
        let msg: WorkerMessage = serde_json::from_value(value).unwrap();
        assert_eq!(msg, WorkerMessage::progress("r", 0.2));
    }
}
