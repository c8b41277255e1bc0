//! tws-bridge -- blocking session bridge over the IB TWS/Gateway client.
//!
//! - [`bridge`] -- `Session`, response streams and the callback router
//! - [`models`] -- Error, position and symbol-search records
//! - [`config`] -- Command-line flags and session settings

pub mod bridge;
pub mod config;
pub mod models;

pub use bridge::{
    BridgeError, Request, Response, Result, Router, Session, Stream, StreamDrain, StreamItem,
    StreamKind, NO_REQUEST_ID,
};
pub use config::{GatewayArgs, SessionConfig};
pub use models::{ContractDescriptions, ErrorRecord, PositionRecord};

/// Install the stderr `tracing` subscriber used by the probes.
///
/// `RUST_LOG` overrides the default `info` filter.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();
}
