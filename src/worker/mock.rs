//! Mock request handler for testing the worker actor.
//!
//! Records which requests it saw and on which thread, emits a configurable
//! number of progress messages and can hold a request until it is cancelled.
//! No graph computation is performed.

use serde_json::json;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use super::gateway::RequestHandler;
use super::protocol::{WorkerMessage, WorkerRequest};
use crate::error::EngineError;

/// Upper bound on how long a waiting request blocks the worker thread.
const MAX_WAIT: Duration = Duration::from_secs(10);

/// Mock implementation of `RequestHandler` for testing.
pub struct MockHandler {
    progress_steps: usize,
    wait_for_cancel: bool,
    handled: Mutex<Vec<String>>,
    thread_names: Mutex<Vec<String>>,
}

impl MockHandler {
    /// A handler that answers every request with an empty `SUCCESS`.
    pub fn new() -> Self {
        Self {
            progress_steps: 0,
            wait_for_cancel: false,
            handled: Mutex::new(Vec::new()),
            thread_names: Mutex::new(Vec::new()),
        }
    }

    /// Emit `steps` progress messages before the terminal one.
    pub fn with_progress_steps(mut self, steps: usize) -> Self {
        self.progress_steps = steps;
        self
    }

    /// Block every request until its token is cancelled.
    pub fn waiting_for_cancel(mut self) -> Self {
        self.wait_for_cancel = true;
        self
    }

    /// Ids of handled requests, in handling order.
    pub fn handled(&self) -> Vec<String> {
        self.handled.lock().map(|h| h.clone()).unwrap_or_default()
    }

    /// Name of the thread each request was handled on.
    pub fn thread_names(&self) -> Vec<String> {
        self.thread_names
            .lock()
            .map(|t| t.clone())
            .unwrap_or_default()
    }
}

impl Default for MockHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestHandler for MockHandler {
    fn handle(
        &self,
        request: &WorkerRequest,
        emit: &mut dyn FnMut(WorkerMessage),
        cancel: &CancellationToken,
    ) -> WorkerMessage {
        if let Ok(mut handled) = self.handled.lock() {
            handled.push(request.id.clone());
        }
        if let Ok(mut names) = self.thread_names.lock() {
            let current = std::thread::current();
            names.push(current.name().unwrap_or_default().to_string());
        }

        for step in 0..self.progress_steps {
            emit(WorkerMessage::progress(
                &request.id,
                step as f64 / self.progress_steps as f64,
            ));
        }

        if self.wait_for_cancel {
            let started = Instant::now();
            while !cancel.is_cancelled() && started.elapsed() < MAX_WAIT {
                std::thread::sleep(Duration::from_millis(1));
            }
        }
        if cancel.is_cancelled() {
            return WorkerMessage::error(&request.id, &EngineError::Cancelled);
        }
        WorkerMessage::success(&request.id, json!({}), 0.0)
    }
}
