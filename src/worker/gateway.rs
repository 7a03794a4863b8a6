//! Dispatch gateway.
//!
//! Turns one [`WorkerRequest`] into exactly one terminal [`WorkerMessage`],
//! preceded by zero or more `PROGRESS` messages for layout requests.
//! Every failure, a panic inside an algorithm included, stays local to the
//! request: the caller always gets an `ERROR` reply and the worker keeps
//! serving.

use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use super::protocol::{RequestKind, WorkerMessage, WorkerRequest};
use crate::error::{EngineError, Result};
use crate::graph::models::{
    decode_options, CentralityOptions, CommunityOptions, KnowledgeGraph, LayoutOptions,
    PathOptions, TopologyOptions,
};
use crate::graph::{
    analyze_topology, calculate_centrality, detect_communities, find_path, optimize_layout,
};

/// Handles one request on the worker thread.
///
/// `emit` receives intermediate (non-terminal) messages in order; the
/// returned message is the terminal one.
pub trait RequestHandler: Send + Sync {
    fn handle(
        &self,
        request: &WorkerRequest,
        emit: &mut dyn FnMut(WorkerMessage),
        cancel: &CancellationToken,
    ) -> WorkerMessage;
}

/// Option defaults applied before a request's own options.
#[derive(Debug, Clone, Default)]
pub struct AnalysisDefaults {
    pub centrality: CentralityOptions,
    pub layout: LayoutOptions,
    pub community: CommunityOptions,
}

/// The production [`RequestHandler`]: routes requests to the graph algorithms.
#[derive(Debug, Clone, Default)]
pub struct Gateway {
    defaults: AnalysisDefaults,
}

impl Gateway {
    pub fn new(defaults: AnalysisDefaults) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &AnalysisDefaults {
        &self.defaults
    }

    /// Decode, validate and run one request, returning the `SUCCESS` payload.
    pub fn dispatch(
        &self,
        request: &WorkerRequest,
        emit: &mut dyn FnMut(WorkerMessage),
        cancel: &CancellationToken,
    ) -> Result<Value> {
        let kind: RequestKind = request.kind.parse()?;
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let data = &request.payload.graph_data;
        let options = request.payload.options.as_ref();
        let graph = KnowledgeGraph::from_data(data)?;

        tracing::debug!(
            id = %request.id,
            op = %kind,
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "Dispatching request"
        );

        match kind {
            RequestKind::CalculateCentrality => {
                let options = decode_options(&self.defaults.centrality, options)?;
                to_payload(&calculate_centrality(&graph, &options, cancel)?)
            }
            RequestKind::AnalyzeTopology => {
                let options = decode_options(&TopologyOptions::default(), options)?;
                to_payload(&analyze_topology(&graph, &options, cancel)?)
            }
            RequestKind::OptimizeLayout => {
                let options = decode_options(&self.defaults.layout, options)?;
                let mut progress = |p: f64| emit(WorkerMessage::progress(&request.id, p));
                to_payload(&optimize_layout(
                    data,
                    &graph,
                    &options,
                    &mut progress,
                    cancel,
                )?)
            }
            RequestKind::DetectCommunities => {
                let options = decode_options(&self.defaults.community, options)?;
                to_payload(&detect_communities(data, &graph, &options, cancel)?)
            }
            RequestKind::FindShortestPath => {
                let options = decode_options(&PathOptions::default(), options)?;
                to_payload(&find_path(&graph, &options))
            }
        }
    }
}

impl RequestHandler for Gateway {
    fn handle(
        &self,
        request: &WorkerRequest,
        emit: &mut dyn FnMut(WorkerMessage),
        cancel: &CancellationToken,
    ) -> WorkerMessage {
        let started = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.dispatch(request, emit, cancel)
        }));
        terminal_message(request, started, outcome)
    }
}

/// Build the terminal reply from the guarded dispatch outcome and log it.
fn terminal_message(
    request: &WorkerRequest,
    started: Instant,
    outcome: std::thread::Result<Result<Value>>,
) -> WorkerMessage {
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    match outcome {
        Ok(Ok(payload)) => {
            tracing::info!(
                id = %request.id,
                op = %request.kind,
                elapsed_ms,
                "Request completed"
            );
            WorkerMessage::success(&request.id, payload, elapsed_ms)
        }
        Ok(Err(e)) => {
            tracing::warn!(
                id = %request.id,
                op = %request.kind,
                code = e.code(),
                "Request failed: {}",
                e
            );
            WorkerMessage::error(&request.id, &e)
        }
        Err(panic) => {
            let detail = panic_message(panic.as_ref());
            tracing::error!(
                id = %request.id,
                op = %request.kind,
                "Request panicked: {}",
                detail
            );
            WorkerMessage::error(&request.id, &EngineError::Computation(detail))
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn to_payload<T: Serialize>(result: &T) -> Result<Value> {
    serde_json::to_value(result).map_err(|e| EngineError::Computation(e.to_string()))
}
