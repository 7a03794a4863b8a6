//! Analytics worker.
//!
//! Message-passing front end of the graph engine:
//!
//! ```text
//! caller ──► AnalyticsWorker::submit ──► bounded queue ──► worker thread
//!                                                             │
//!                                                   Gateway::handle
//!                                                             │
//! caller ◄── RequestStream ◄── PROGRESS* then SUCCESS | ERROR ┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`]: request and reply message shapes
//! - [`gateway`]: `RequestHandler` trait and the `Gateway` dispatcher
//! - [`service`]: `AnalyticsWorker` actor on a dedicated thread
//! - [`stdio`]: JSON-lines host for running the worker as a subprocess
//! - `mock`: `MockHandler` for testing (cfg(test) only)

pub mod gateway;
pub mod protocol;
pub mod service;
pub mod stdio;

#[cfg(test)]
pub mod mock;

pub use gateway::{AnalysisDefaults, Gateway, RequestHandler};
pub use protocol::{RequestKind, RequestPayload, WorkerMessage, WorkerRequest};
pub use service::{AnalyticsWorker, RequestStream, WorkerConfig};
pub use stdio::StdioHost;
