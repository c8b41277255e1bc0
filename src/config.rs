//! Connection settings for the probes.

use std::time::Duration;

use clap::Args;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 7497;
pub const DEFAULT_CLIENT_ID: i32 = 10;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Gateway endpoint flags shared by every probe.
#[derive(Args, Debug, Clone)]
pub struct GatewayArgs {
    /// IB TWS/Gateway host
    #[arg(long, env = "TWS_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// IB TWS/Gateway API port
    #[arg(long, env = "TWS_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// API client ID
    #[arg(long = "client-id", env = "TWS_CLIENT_ID", default_value_t = DEFAULT_CLIENT_ID)]
    pub client_id: i32,

    /// Maximum wait for a response, in seconds
    #[arg(long = "timeout-secs", env = "TWS_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,
}

impl GatewayArgs {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Session settings for an interactive probe: Ctrl+C ends the session.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            host: self.host.clone(),
            port: self.port,
            client_id: self.client_id,
            interrupt_on_ctrl_c: true,
        }
    }
}

/// Everything `Session::connect` needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub client_id: i32,
    /// End the session when the process receives Ctrl+C.
    pub interrupt_on_ctrl_c: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            client_id: DEFAULT_CLIENT_ID,
            interrupt_on_ctrl_c: false,
        }
    }
}
