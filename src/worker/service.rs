//! Analytics worker actor.
//!
//! Runs a [`RequestHandler`] on one dedicated OS thread, away from the
//! caller's async runtime.
//!
//! ## Design
//!
//! Uses a bounded mpsc channel + blocking receive loop:
//! 1. `submit(request)` enqueues a job and waits for room (backpressure);
//!    `try_submit` fails fast with `QueueFull` instead
//! 2. The worker thread takes jobs one at a time, in order, and runs each
//!    one to completion before looking at the next
//! 3. Every job carries its own reply channel, surfaced to the caller as a
//!    [`RequestStream`]: PROGRESS messages first, then exactly one terminal
//!    message
//! 4. `cancel(id)` trips the job's `CancellationToken`; a job cancelled while
//!    still queued fails as soon as it is dequeued
//!
//! Dropping the worker closes the queue, cancels everything still pending
//! and joins the thread.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::gateway::RequestHandler;
use super::protocol::{WorkerMessage, WorkerRequest};
use crate::error::{EngineError, Result};

/// Worker thread and queue settings.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Bounded request queue size
    pub queue_capacity: usize,
    /// Name of the dedicated worker thread
    pub thread_name: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            thread_name: "graph-analytics-worker".into(),
        }
    }
}

struct Job {
    request: WorkerRequest,
    seq: u64,
    cancel: CancellationToken,
    reply: mpsc::UnboundedSender<WorkerMessage>,
}

/// Pending requests by id. The sequence number guards against a later
/// request reusing the id of an earlier one.
type Inflight = DashMap<String, (u64, CancellationToken)>;

/// Handle to the dedicated analytics thread.
pub struct AnalyticsWorker {
    tx: Option<mpsc::Sender<Job>>,
    inflight: Arc<Inflight>,
    next_seq: AtomicU64,
    thread: Option<JoinHandle<()>>,
}

impl AnalyticsWorker {
    /// Spawn the worker thread.
    pub fn spawn(handler: Arc<dyn RequestHandler>, config: &WorkerConfig) -> anyhow::Result<Self> {
        let (tx, rx) = mpsc::channel::<Job>(config.queue_capacity.max(1));
        let inflight: Arc<Inflight> = Arc::new(DashMap::new());

        let thread = std::thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn({
                let inflight = inflight.clone();
                move || Self::run_loop(handler, rx, inflight)
            })?;

        tracing::info!(
            thread = %config.thread_name,
            queue_capacity = config.queue_capacity,
            "Analytics worker started"
        );

        Ok(Self {
            tx: Some(tx),
            inflight,
            next_seq: AtomicU64::new(0),
            thread: Some(thread),
        })
    }

    /// Enqueue a request, waiting while the queue is full.
    pub async fn submit(&self, request: WorkerRequest) -> Result<RequestStream> {
        let tx = self.tx.as_ref().ok_or(EngineError::WorkerUnavailable)?;
        let (job, stream) = self.prepare(request);
        let (id, seq) = (job.request.id.clone(), job.seq);
        if tx.send(job).await.is_err() {
            self.forget(&id, seq);
            return Err(EngineError::WorkerUnavailable);
        }
        Ok(stream)
    }

    /// Enqueue a request without waiting.
    pub fn try_submit(&self, request: WorkerRequest) -> Result<RequestStream> {
        let tx = self.tx.as_ref().ok_or(EngineError::WorkerUnavailable)?;
        let (job, stream) = self.prepare(request);
        let (id, seq) = (job.request.id.clone(), job.seq);
        match tx.try_send(job) {
            Ok(()) => Ok(stream),
            Err(e) => {
                self.forget(&id, seq);
                Err(match e {
                    mpsc::error::TrySendError::Full(_) => EngineError::QueueFull,
                    mpsc::error::TrySendError::Closed(_) => EngineError::WorkerUnavailable,
                })
            }
        }
    }

    /// Request cancellation of a queued or running request.
    ///
    /// Returns false when no pending request has this id.
    pub fn cancel(&self, id: &str) -> bool {
        match self.inflight.get(id) {
            Some(entry) => {
                entry.value().1.cancel();
                tracing::debug!(id, "Cancellation requested");
                true
            }
            None => false,
        }
    }

    /// Number of requests queued or running.
    pub fn pending(&self) -> usize {
        self.inflight.len()
    }

    /// Stop accepting requests, cancel pending ones and join the thread.
    pub fn shutdown(&mut self) {
        let Some(tx) = self.tx.take() else {
            return;
        };
        for entry in self.inflight.iter() {
            entry.value().1.cancel();
        }
        drop(tx);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Analytics worker thread panicked");
            }
        }
        tracing::info!("Analytics worker stopped");
    }

    fn prepare(&self, request: WorkerRequest) -> (Job, RequestStream) {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let (reply, rx) = mpsc::unbounded_channel();
        self.inflight
            .insert(request.id.clone(), (seq, cancel.clone()));
        let stream = RequestStream {
            id: request.id.clone(),
            rx,
        };
        (
            Job {
                request,
                seq,
                cancel,
                reply,
            },
            stream,
        )
    }

    fn forget(&self, id: &str, seq: u64) {
        self.inflight.remove_if(id, |_, (s, _)| *s == seq);
    }

    /// Worker thread body: one job at a time until the queue closes.
    fn run_loop(
        handler: Arc<dyn RequestHandler>,
        mut rx: mpsc::Receiver<Job>,
        inflight: Arc<Inflight>,
    ) {
        while let Some(job) = rx.blocking_recv() {
            let Job {
                request,
                seq,
                cancel,
                reply,
            } = job;

            let terminal = if cancel.is_cancelled() {
                tracing::debug!(id = %request.id, "Skipping request cancelled while queued");
                WorkerMessage::error(&request.id, &EngineError::Cancelled)
            } else {
                // A receiver dropped by the caller only means nobody listens
                handler.handle(
                    &request,
                    &mut |msg: WorkerMessage| {
                        let _ = reply.send(msg);
                    },
                    &cancel,
                )
            };

            inflight.remove_if(&request.id, |_, (s, _)| *s == seq);
            let _ = reply.send(terminal);
        }
        tracing::debug!("Analytics worker queue closed");
    }
}

impl Drop for AnalyticsWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Replies for one submitted request.
#[derive(Debug)]
pub struct RequestStream {
    id: String,
    rx: mpsc::UnboundedReceiver<WorkerMessage>,
}

impl RequestStream {
    /// Id of the request this stream answers.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Next message, `None` after the terminal one.
    pub async fn next(&mut self) -> Option<WorkerMessage> {
        self.rx.recv().await
    }

    /// Skip progress and wait for the terminal message.
    pub async fn terminal(mut self) -> Result<WorkerMessage> {
        while let Some(msg) = self.rx.recv().await {
            if msg.is_terminal() {
                return Ok(msg);
            }
        }
        Err(EngineError::WorkerUnavailable)
    }

    /// Every message up to and including the terminal one.
    pub async fn collect(mut self) -> Vec<WorkerMessage> {
        let mut messages = Vec::new();
        while let Some(msg) = self.rx.recv().await {
            let done = msg.is_terminal();
            messages.push(msg);
            if done {
                break;
            }
        }
        messages
    }
}
