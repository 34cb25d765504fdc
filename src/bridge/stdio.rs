//! Stdio transport — newline-delimited JSON over stdin/stdout.
//!
//! Stands in for the hybrid-app runtime's message channel: one request per
//! line on stdin, at most one response line per request on stdout, and
//! data-available events interleaved on the same stream. Requests are
//! handled one at a time, in arrival order; only the event forwarder runs
//! beside the request loop, and the two share the writer behind a mutex.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout};
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

use super::{BridgeRequest, Dispatcher};
use crate::error::Result;
use crate::events::EventBus;
use crate::registry::DeviceRegistry;

/// Parse one request line and dispatch it. Returns the serialized response
/// line, or `None` when the line is unparseable or names an unknown action.
async fn process_line(dispatcher: &Dispatcher, line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    let request: BridgeRequest = match serde_json::from_str(trimmed) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "failed to parse request line");
            return None;
        }
    };
    let response = dispatcher.dispatch(request).await?;
    match serde_json::to_string(&response) {
        Ok(line) => Some(line),
        Err(e) => {
            warn!(error = %e, "failed to serialize response");
            None
        }
    }
}

async fn write_line(writer: &Mutex<Stdout>, line: &str) -> std::io::Result<()> {
    let mut out = writer.lock().await;
    out.write_all(line.as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await
}

/// Run the bridge until stdin closes, then tear the registry down.
pub async fn run(registry: Arc<DeviceRegistry>, events: EventBus) -> Result<()> {
    let stdout = Arc::new(Mutex::new(tokio::io::stdout()));

    // Event forwarder: drains the bus onto the wire. Lagging only drops
    // notifications, never requests.
    let mut rx = events.subscribe();
    let event_writer = stdout.clone();
    let forwarder = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let line = match serde_json::to_string(&event) {
                        Ok(line) => line,
                        Err(e) => {
                            warn!(error = %e, "failed to serialize event");
                            continue;
                        }
                    };
                    if let Err(e) = write_line(&event_writer, &line).await {
                        warn!(error = %e, "event write failed; stopping forwarder");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(dropped)) => {
                    warn!(dropped, "event subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let dispatcher = Dispatcher::new(registry.clone());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if let Some(response) = process_line(&dispatcher, &line).await {
            write_line(&stdout, &response).await?;
        }
    }

    info!("request stream closed; tearing down");
    registry.teardown().await;
    forwarder.abort();
    Ok(())
}
