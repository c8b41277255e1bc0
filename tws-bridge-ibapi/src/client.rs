//! Async gateway client.
//!
//! `IBClient` owns the write half of the connection and the reader task.
//! Responses never come back from the request methods; they arrive as
//! `IBEvent`s on the receiver returned by [`IBClient::connect`].

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::encoder::MessageEncoder;
use crate::errors::{IBApiError, Result};
use crate::protocol::{outgoing, server_version};
use crate::reader::MessageReader;
use crate::transport::{Transport, TransportWriter};
use crate::wrapper::IBEvent;

// ============================================================================
// IBClient
// ============================================================================

/// Single connection to TWS/Gateway.
///
/// ```rust,ignore
/// let (mut client, mut rx) = IBClient::connect("127.0.0.1", 7497, 10, None).await?;
/// client.req_matching_symbols(1, "SPY").await?;
///
/// while let Some(event) = rx.recv().await {
///     match event {
///         IBEvent::SymbolSamples { descriptions, .. } => println!("{}", descriptions.len()),
///         IBEvent::Error { code, message, .. } => eprintln!("Error {code}: {message}"),
///         _ => {}
///     }
/// }
/// ```
pub struct IBClient {
    writer: TransportWriter,
    server_version: i32,
    tws_time: String,
    client_id: i32,
    connected: AtomicBool,
    reader_handle: Option<JoinHandle<()>>,
}

impl IBClient {
    /// Connect, handshake, send START_API and spawn the reader task on the
    /// current tokio runtime.
    ///
    /// The first events received are typically `NextValidId` and
    /// `ManagedAccounts`.
    pub async fn connect(
        host: &str,
        port: u16,
        client_id: i32,
        optional_capabilities: Option<&str>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<IBEvent>)> {
        let mut transport = Transport::connect(host, port, None).await?;
        let server_version = transport.server_version();
        let tws_time = transport.tws_time().to_string();

        transport.start_api(client_id, optional_capabilities).await?;
        tracing::info!(host, port, server_version, client_id, "IBClient connected");

        let (transport_reader, transport_writer) = transport.into_split();
        let (rx, reader_handle) = MessageReader::new(transport_reader).spawn();

        let client = Self {
            writer: transport_writer,
            server_version,
            tws_time,
            client_id,
            connected: AtomicBool::new(true),
            reader_handle: Some(reader_handle),
        };

        Ok((client, rx))
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Negotiated server version.
    pub fn server_version(&self) -> i32 {
        self.server_version
    }

    /// TWS connection time string from handshake.
    pub fn tws_time(&self) -> &str {
        &self.tws_time
    }

    pub fn client_id(&self) -> i32 {
        self.client_id
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    // ========================================================================
    // Connection Management
    // ========================================================================

    /// Close the connection. Later calls are no-ops.
    ///
    /// Shuts down the write half, then stops the reader task without waiting
    /// for the server to close its side.
    pub async fn disconnect(&mut self) {
        if !self.connected.swap(false, Ordering::Relaxed) {
            return;
        }

        tracing::info!(client_id = self.client_id, "IBClient disconnecting");
        self.writer.shutdown().await;

        if let Some(handle) = self.reader_handle.take() {
            handle.abort();
            let _ = handle.await;
        }
    }

    // ========================================================================
    // Private Helpers
    // ========================================================================

    fn check_server_version(&self, min_version: i32, feature: &str) -> Result<()> {
        if self.server_version < min_version {
            return Err(IBApiError::Encoding(format!(
                "{feature} requires server version >= {min_version} (current: {})",
                self.server_version
            )));
        }
        Ok(())
    }

    async fn send_encoded(&mut self, enc: MessageEncoder) -> Result<()> {
        if !self.is_connected() {
            return Err(IBApiError::Disconnected("not connected".into()));
        }
        let bytes = enc.finalize()?;
        self.writer.send_message(&bytes).await
    }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Subscribe to positions for all accounts.
    /// Responses: `IBEvent::Position` per position, then `IBEvent::PositionEnd`.
    pub async fn req_positions(&mut self) -> Result<()> {
        self.check_server_version(server_version::POSITIONS, "req_positions")?;
        let mut enc = MessageEncoder::new();
        enc.encode_msg_id(outgoing::REQ_POSITIONS);
        enc.encode_field_i32(1); // version
        self.send_encoded(enc).await
    }

    /// Cancel the positions subscription.
    pub async fn cancel_positions(&mut self) -> Result<()> {
        self.check_server_version(server_version::POSITIONS, "cancel_positions")?;
        let mut enc = MessageEncoder::new();
        enc.encode_msg_id(outgoing::CANCEL_POSITIONS);
        enc.encode_field_i32(1); // version
        self.send_encoded(enc).await
    }

    /// Search for contracts whose symbol or description matches `pattern`.
    /// Response: one `IBEvent::SymbolSamples` keyed by `req_id`.
    pub async fn req_matching_symbols(&mut self, req_id: i32, pattern: &str) -> Result<()> {
        self.check_server_version(server_version::REQ_MATCHING_SYMBOLS, "req_matching_symbols")?;
        let mut enc = MessageEncoder::new();
        enc.encode_msg_id(outgoing::REQ_MATCHING_SYMBOLS);
        enc.encode_field_i32(req_id);
        enc.encode_field_str(pattern);
        self.send_encoded(enc).await
    }
}
