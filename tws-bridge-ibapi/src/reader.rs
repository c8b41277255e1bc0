//! Async message reader.
//!
//! Spawns a tokio task that reads frames from the server, decodes them into
//! `IBEvent`s and sends them through an unbounded mpsc channel.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::decoder::decode_server_msg;
use crate::errors::IBApiError;
use crate::protocol::client_errors;
use crate::transport::TransportReader;
use crate::wrapper::IBEvent;

// ============================================================================
// MessageReader
// ============================================================================

/// Reads framed messages from a `TransportReader` until the connection ends
/// or the event receiver is dropped.
///
/// The last event on the channel is always `IBEvent::ConnectionClosed`
/// unless the consumer went away first.
pub struct MessageReader {
    transport_reader: TransportReader,
}

impl MessageReader {
    pub fn new(transport_reader: TransportReader) -> Self {
        Self { transport_reader }
    }

    /// Spawn the reader task on the current runtime.
    pub fn spawn(self) -> (mpsc::UnboundedReceiver<IBEvent>, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(self.run(tx));
        (rx, handle)
    }

    async fn run(mut self, tx: mpsc::UnboundedSender<IBEvent>) {
        let server_version = self.transport_reader.server_version();
        loop {
            match self.transport_reader.read_message().await {
                Ok(msg) => {
                    let event = decode_server_msg(&msg, server_version);
                    if tx.send(event).is_err() {
                        tracing::debug!("event receiver dropped, reader stopping");
                        return;
                    }
                }
                Err(IBApiError::Disconnected(reason)) => {
                    tracing::info!(%reason, "server disconnected");
                    let _ = tx.send(IBEvent::ConnectionClosed);
                    return;
                }
                Err(e) => {
                    tracing::error!(error = %e, "reader error");
                    let code = match e {
                        IBApiError::Protocol(_) => client_errors::BAD_LENGTH,
                        _ => client_errors::SOCKET_EXCEPTION,
                    };
                    let _ = tx.send(IBEvent::Error {
                        req_id: -1,
                        error_time: 0,
                        code,
                        message: format!("reader error: {e}"),
                        advanced_order_reject_json: String::new(),
                    });
                    let _ = tx.send(IBEvent::ConnectionClosed);
                    return;
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
