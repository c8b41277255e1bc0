//! Async TCP transport for the TWS API protocol.
//!
//! Handles V100+ message framing (4-byte big-endian length prefix), the
//! connection handshake, and reading/writing complete messages.

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::decoder::MessageDecoder;
use crate::encoder::{build_connect_request, MessageEncoder};
use crate::errors::{IBApiError, Result};
use crate::protocol::{
    outgoing, server_version, HEADER_LEN, MAX_CLIENT_VER, MAX_MSG_LEN, MIN_CLIENT_VER,
};

/// START_API message version.
const START_API_VERSION: i32 = 2;

// ============================================================================
// Framing
// ============================================================================

/// Read one complete frame from `reader`, buffering partial reads in `buf`.
///
/// Returns the message body without the length header. A zero or oversized
/// length is a protocol error; EOF mid-frame is `Disconnected`.
async fn read_frame(reader: &mut OwnedReadHalf, buf: &mut BytesMut) -> Result<Vec<u8>> {
    while buf.len() < HEADER_LEN {
        if reader.read_buf(buf).await? == 0 {
            return Err(IBApiError::Disconnected(
                "connection closed while reading message header".into(),
            ));
        }
    }

    let msg_len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    if msg_len == 0 || msg_len > MAX_MSG_LEN {
        return Err(IBApiError::Protocol(format!(
            "invalid message length: {msg_len}"
        )));
    }

    let total_needed = HEADER_LEN + msg_len;
    while buf.len() < total_needed {
        if reader.read_buf(buf).await? == 0 {
            return Err(IBApiError::Disconnected(
                "connection closed while reading message body".into(),
            ));
        }
    }

    buf.advance(HEADER_LEN);
    Ok(buf.split_to(msg_len).to_vec())
}

// ============================================================================
// Transport
// ============================================================================

/// Handshaken TCP connection to TWS/Gateway.
///
/// Created by [`Transport::connect`], then split with
/// [`Transport::into_split`] once `START_API` has been sent.
pub struct Transport {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    read_buf: BytesMut,
    server_version: i32,
    tws_time: String,
}

impl Transport {
    /// Open the TCP connection and run the V100+ handshake.
    ///
    /// `start_api()` is separate; call it after connect returns.
    pub async fn connect(host: &str, port: u16, connect_options: Option<&str>) -> Result<Self> {
        let addr = format!("{host}:{port}");
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| IBApiError::Connection(format!("failed to connect to {addr}: {e}")))?;

        let (reader, writer) = stream.into_split();
        let mut transport = Self {
            reader,
            writer,
            read_buf: BytesMut::with_capacity(8192),
            server_version: 0,
            tws_time: String::new(),
        };

        let request = build_connect_request(connect_options)?;
        transport
            .writer
            .write_all(&request)
            .await
            .map_err(|e| IBApiError::Connection(format!("failed to send connect request: {e}")))?;

        transport.process_connect_ack().await?;
        Ok(transport)
    }

    /// Read the ack: `[server_version\0][tws_time\0]`, or
    /// `[negative_version\0][host:port\0]` when the gateway redirects.
    async fn process_connect_ack(&mut self) -> Result<()> {
        let msg = read_frame(&mut self.reader, &mut self.read_buf).await?;
        let mut dec = MessageDecoder::new(&msg, 0);

        let sv = dec.decode_i32()?;
        if sv < 0 {
            let hostport = dec.decode_string()?;
            return Err(IBApiError::Protocol(format!("server redirect to {hostport}")));
        }

        if !(MIN_CLIENT_VER..=MAX_CLIENT_VER).contains(&sv) {
            return Err(IBApiError::Protocol(format!(
                "unsupported server version {sv} (expected {MIN_CLIENT_VER}..{MAX_CLIENT_VER})"
            )));
        }

        self.server_version = sv;
        self.tws_time = dec.decode_string()?;

        tracing::info!(
            server_version = sv,
            tws_time = %self.tws_time,
            "TWS API handshake complete"
        );
        Ok(())
    }

    /// Send START_API: client id plus optional capabilities on servers that
    /// accept them.
    pub async fn start_api(&mut self, client_id: i32, optional_capabilities: Option<&str>) -> Result<()> {
        let mut enc = MessageEncoder::new();
        enc.encode_msg_id(outgoing::START_API)
            .encode_field_i32(START_API_VERSION)
            .encode_field_i32(client_id);
        if self.server_version >= server_version::OPTIONAL_CAPABILITIES {
            enc.encode_field_str(optional_capabilities.unwrap_or(""));
        }
        let bytes = enc.finalize()?;
        self.writer
            .write_all(&bytes)
            .await
            .map_err(|e| IBApiError::Connection(format!("failed to send START_API: {e}")))
    }

    /// Read a single framed message from the server.
    pub async fn read_message(&mut self) -> Result<Vec<u8>> {
        read_frame(&mut self.reader, &mut self.read_buf).await
    }

    /// Negotiated server version from the handshake.
    pub fn server_version(&self) -> i32 {
        self.server_version
    }

    /// TWS connection time string from the handshake.
    pub fn tws_time(&self) -> &str {
        &self.tws_time
    }

    /// Split into reader and writer halves; buffered bytes stay with the reader.
    pub fn into_split(self) -> (TransportReader, TransportWriter) {
        (
            TransportReader {
                reader: self.reader,
                read_buf: self.read_buf,
                server_version: self.server_version,
            },
            TransportWriter {
                writer: self.writer,
                server_version: self.server_version,
            },
        )
    }
}

// ============================================================================
// TransportReader
// ============================================================================

/// Read half of a split transport.
pub struct TransportReader {
    reader: OwnedReadHalf,
    read_buf: BytesMut,
    server_version: i32,
}

impl TransportReader {
    pub fn server_version(&self) -> i32 {
        self.server_version
    }

    pub async fn read_message(&mut self) -> Result<Vec<u8>> {
        read_frame(&mut self.reader, &mut self.read_buf).await
    }
}

// ============================================================================
// TransportWriter
// ============================================================================

/// Write half of a split transport.
pub struct TransportWriter {
    writer: OwnedWriteHalf,
    server_version: i32,
}

impl TransportWriter {
    pub fn server_version(&self) -> i32 {
        self.server_version
    }

    /// Send a message already framed by `MessageEncoder::finalize()`.
    pub async fn send_message(&mut self, data: &[u8]) -> Result<()> {
        self.writer
            .write_all(data)
            .await
            .map_err(|e| IBApiError::Disconnected(format!("failed to send: {e}")))
    }

    /// Send a TCP FIN. The reader sees EOF once the server closes its side.
    pub async fn shutdown(&mut self) {
        let _ = self.writer.shutdown().await;
    }
}

// ============================================================================
// Tests
// ============================================================================
