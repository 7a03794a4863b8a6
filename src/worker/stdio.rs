//! JSON-lines host over stdio.
//!
//! Reads one JSON object per line from stdin and writes every reply as one
//! JSON line to stdout. Besides analysis requests the host understands a
//! control line `{"type": "CANCEL", "id": "..."}`. Replies of different
//! requests may interleave; replies of one request keep their order.
//! Logs go to stderr so stdout carries protocol lines only.

use anyhow::Result;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::protocol::{WorkerMessage, WorkerRequest, CANCEL_TYPE};
use super::service::{AnalyticsWorker, RequestStream};
use crate::error::EngineError;

/// A decoded input line.
#[derive(Debug)]
enum Inbound {
    Request(WorkerRequest),
    Cancel(String),
    /// Undecodable line, answered right away
    Invalid(WorkerMessage),
    Blank,
}

/// Serves an [`AnalyticsWorker`] over a line-oriented byte stream.
pub struct StdioHost {
    worker: AnalyticsWorker,
}

impl StdioHost {
    pub fn new(worker: AnalyticsWorker) -> Self {
        Self { worker }
    }

    pub fn worker(&self) -> &AnalyticsWorker {
        &self.worker
    }

    /// Run the host on the process stdin/stdout until stdin closes.
    pub async fn run(&self) -> Result<()> {
        info!("Graph engine serving JSON lines on stdio");
        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        self.serve(stdin, stdout).await?;
        info!("Input closed, graph engine shutting down");
        Ok(())
    }

    /// Serve until `reader` is exhausted and every accepted request has
    /// produced its terminal reply.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<WorkerMessage>();
        let mut input_open = true;
        // requests whose terminal reply has not been written yet
        let mut pending = 0usize;

        while input_open || pending > 0 {
            tokio::select! {
                line = lines.next_line(), if input_open => {
                    let Some(line) = line? else {
                        input_open = false;
                        continue;
                    };
                    match parse_line(&line) {
                        Inbound::Request(request) => {
                            pending += 1;
                            let id = request.id.clone();
                            match self.worker.submit(request).await {
                                Ok(stream) => {
                                    tokio::spawn(forward(stream, out_tx.clone()));
                                }
                                Err(e) => {
                                    let _ = out_tx.send(WorkerMessage::error(&id, &e));
                                }
                            }
                        }
                        Inbound::Cancel(id) => {
                            if !self.worker.cancel(&id) {
                                debug!(id = %id, "Cancel for unknown or finished request");
                            }
                        }
                        Inbound::Invalid(reply) => {
                            pending += 1;
                            let _ = out_tx.send(reply);
                        }
                        Inbound::Blank => {}
                    }
                }
                Some(msg) = out_rx.recv() => {
                    if msg.is_terminal() {
                        pending = pending.saturating_sub(1);
                    }
                    let json = serde_json::to_string(&msg)?;
                    writer.write_all(json.as_bytes()).await?;
                    writer.write_all(b"\n").await?;
                    writer.flush().await?;
                }
            }
        }
        Ok(())
    }
}

/// Copy one request's replies to the shared output channel.
///
/// A stream that ends without a terminal message gets a synthetic
/// `WORKER_UNAVAILABLE` error so the caller never waits forever.
async fn forward(mut stream: RequestStream, out: mpsc::UnboundedSender<WorkerMessage>) {
    let id = stream.id().to_string();
    while let Some(msg) = stream.next().await {
        let terminal = msg.is_terminal();
        if out.send(msg).is_err() || terminal {
            return;
        }
    }
    let _ = out.send(WorkerMessage::error(&id, &EngineError::WorkerUnavailable));
}

fn parse_line(line: &str) -> Inbound {
    let line = line.trim();
    if line.is_empty() {
        return Inbound::Blank;
    }

    let value: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            warn!("Unparsable input line: {}", e);
            return Inbound::Invalid(WorkerMessage::error(
                "",
                &EngineError::InvalidPayload(e.to_string()),
            ));
        }
    };

    let id = value
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    if value.get("type").and_then(Value::as_str) == Some(CANCEL_TYPE) {
        return Inbound::Cancel(id);
    }

    match serde_json::from_value::<WorkerRequest>(value) {
        Ok(request) => Inbound::Request(request),
        Err(e) => {
            warn!(id = %id, "Malformed request: {}", e);
            Inbound::Invalid(WorkerMessage::error(
                &id,
                &EngineError::InvalidPayload(e.to_string()),
            ))
        }
    }
}
