//! TWS API protocol constants.
//!
//! Only the slice of the wire protocol this client speaks: the V100+
//! handshake, START_API, symbol search and positions. Message identifiers and
//! server version gates keep the values TWS/Gateway uses on the wire.

// ============================================================================
// Client / Protocol Constants
// ============================================================================

/// Minimum supported client version in the version range.
pub const MIN_CLIENT_VER: i32 = 100;

/// Maximum supported client version.
///
/// Capped below `server_version::PROTOBUF` so the server keeps sending
/// text-encoded message ids.
pub const MAX_CLIENT_VER: i32 = 200;

/// Message header length (4-byte big-endian message length prefix).
pub const HEADER_LEN: usize = 4;

/// Maximum message length: 16 MB - 1 byte.
pub const MAX_MSG_LEN: usize = 0xFFFFFF;

/// API protocol signature sent at connection start.
pub const API_SIGN: &[u8; 4] = b"API\0";

// ============================================================================
// Incoming Message IDs (server -> client)
// ============================================================================

/// Incoming message type identifiers handled by the decoder.
pub mod incoming {
    pub const ERR_MSG: i32 = 4;
    pub const NEXT_VALID_ID: i32 = 9;
    pub const MANAGED_ACCTS: i32 = 15;
    pub const POSITION_DATA: i32 = 61;
    pub const POSITION_END: i32 = 62;
    pub const SYMBOL_SAMPLES: i32 = 79;
}

// ============================================================================
// Outgoing Message IDs (client -> server)
// ============================================================================

/// Outgoing request type identifiers.
pub mod outgoing {
    pub const REQ_POSITIONS: i32 = 61;
    pub const CANCEL_POSITIONS: i32 = 64;
    pub const START_API: i32 = 71;
    pub const REQ_MATCHING_SYMBOLS: i32 = 81;
}

// ============================================================================
// Minimum Server Version Constants
// ============================================================================

/// Server version gates that control which requests may be sent and which
/// fields the server appends to its messages.
pub mod server_version {
    pub const POSITIONS: i32 = 67;
    pub const OPTIONAL_CAPABILITIES: i32 = 72;
    pub const REQ_MATCHING_SYMBOLS: i32 = 108;
    pub const ADVANCED_ORDER_REJECT: i32 = 166;
    pub const BOND_ISSUERID: i32 = 176;
    pub const ERROR_TIME: i32 = 194;
    pub const PROTOBUF: i32 = 201;
}

// ============================================================================
// Client Error Codes
// ============================================================================

/// Well-known client-side error codes (`TwsSocketClientErrors`).
pub mod client_errors {
    pub const CONNECT_FAIL: i32 = 502;
    pub const UPDATE_TWS: i32 = 503;
    pub const NOT_CONNECTED: i32 = 504;
    pub const BAD_LENGTH: i32 = 507;
    pub const BAD_MESSAGE: i32 = 508;
    pub const SOCKET_EXCEPTION: i32 = 509;
}

/// Error codes in this range are informational or warnings (market data
/// farm status, API client version notices) rather than failures.
pub const WARNING_CODES: std::ops::RangeInclusive<i32> = 2100..=2169;
