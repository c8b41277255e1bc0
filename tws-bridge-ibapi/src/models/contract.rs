//! Contract-related data structures.

use serde::{Deserialize, Serialize};

use super::enums::{Right, SecType};

// ============================================================================
// Contract
// ============================================================================

/// Defines a financial instrument (stock, option, future, forex, etc.).
///
/// Only the fields carried by position and symbol-sample messages are kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub con_id: i64,
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sec_type: Option<SecType>,
    pub last_trade_date_or_contract_month: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strike: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right: Option<Right>,
    pub multiplier: String,
    pub exchange: String,
    pub primary_exchange: String,
    pub currency: String,
    pub local_symbol: String,
    pub trading_class: String,
    pub description: String,
    pub issuer_id: String,
}

impl Contract {
    /// Security type as its wire string, empty when unset.
    pub fn sec_type_str(&self) -> String {
        self.sec_type
            .as_ref()
            .map(|s| s.to_string())
            .unwrap_or_default()
    }
}

// ============================================================================
// ContractDescription
// ============================================================================

/// Contract with its available derivative security types.
///
/// Returned by `reqMatchingSymbols`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractDescription {
    pub contract: Contract,
    pub derivative_sec_types: Vec<String>,
}
