//! tws-bridge-ibapi -- minimal Rust client for the IB TWS/Gateway socket API.
//!
//! Speaks the slice of the protocol needed for symbol search and position
//! snapshots: the V100+ handshake, `START_API`, `reqMatchingSymbols`,
//! `reqPositions`/`cancelPositions`, and the error and connection-setup
//! messages the gateway sends along the way.
//!
//! ## Modules
//!
//! - [`models`] -- Contract data carried by positions and symbol samples
//! - [`protocol`] -- Message IDs, server version gates, client error codes
//! - [`errors`] -- Error types for the library
//! - [`encoder`] -- Wire-format message encoding
//! - [`decoder`] -- Wire-format message decoding + server message dispatch
//! - [`transport`] -- Async TCP transport with V100+ framing
//! - [`wrapper`] -- `IBEvent` enum and the `Wrapper` callback trait
//! - [`reader`] -- Async message reader (spawned tokio task)
//! - [`client`] -- `IBClient` (main API entry point)

pub mod client;
pub mod decoder;
pub mod encoder;
pub mod errors;
pub mod models;
pub mod protocol;
pub mod reader;
pub mod transport;
pub mod wrapper;

// ============================================================================
// Re-exports for convenience
// ============================================================================

pub use errors::{IBApiError, Result};

pub use models::contract::{Contract, ContractDescription};
pub use models::enums::{Right, SecType};

pub use decoder::MessageDecoder;
pub use encoder::MessageEncoder;
pub use transport::Transport;

pub use client::IBClient;
pub use reader::MessageReader;
pub use wrapper::{dispatch, IBEvent, Wrapper};
