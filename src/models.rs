//! Records carried by the session bridge queues.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use tws_bridge_ibapi::protocol::WARNING_CODES;
use tws_bridge_ibapi::{Contract, ContractDescription};

// ============================================================================
// Errors
// ============================================================================

/// One error notification from the gateway or the client library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    /// Request the error belongs to, `-1` when it is not tied to one.
    pub req_id: i32,
    pub code: i32,
    pub message: String,
    /// Epoch milliseconds; `0` when the server does not report it.
    pub error_time: i64,
}

impl ErrorRecord {
    /// Informational notices (market data farm status and similar).
    pub fn is_warning(&self) -> bool {
        WARNING_CODES.contains(&self.code)
    }

    pub fn time(&self) -> Option<DateTime<Utc>> {
        if self.error_time == 0 {
            return None;
        }
        DateTime::from_timestamp_millis(self.error_time)
    }
}

/// Prefixed with the RFC 3339 server time when the gateway reports one.
impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(time) = self.time() {
            write!(f, "{} ", time.to_rfc3339_opts(SecondsFormat::Millis, true))?;
        }
        write!(
            f,
            "IB error id {} errorcode {} string {}",
            self.req_id, self.code, self.message
        )
    }
}

// ============================================================================
// Positions
// ============================================================================

/// One position callback.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionRecord {
    pub account: String,
    pub contract: Contract,
    pub position: Decimal,
    pub avg_cost: f64,
}

impl fmt::Display for PositionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Position. {} Symbol: {} SecType: {} Currency: {} Position: {} Avg cost: {}",
            self.account,
            self.contract.symbol,
            self.contract.sec_type_str(),
            self.contract.currency,
            self.position,
            self.avg_cost
        )
    }
}

// ============================================================================
// Symbol search
// ============================================================================

/// A symbol-samples batch, delivered as one queue item.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractDescriptions {
    pub req_id: i32,
    pub descriptions: Vec<ContractDescription>,
}

/// Render one symbol-search match as a console line.
pub fn describe_contract(cd: &ContractDescription) -> String {
    let deriv_sec_types: String = cd
        .derivative_sec_types
        .iter()
        .map(|t| format!("{t} "))
        .collect();
    format!(
        "Contract: conId:{}, symbol:{}, secType:{} primExchange:{}, currency: {}, derivativeSecTypes:{}",
        cd.contract.con_id,
        cd.contract.symbol,
        cd.contract.sec_type_str(),
        cd.contract.primary_exchange,
        cd.contract.currency,
        deriv_sec_types
    )
}
