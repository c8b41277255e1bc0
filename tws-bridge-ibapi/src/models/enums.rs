//! Strongly-typed enums for the string-coded contract fields.
//!
//! Serde `rename` attributes match the wire strings exactly; `Other(String)`
//! keeps unrecognized values instead of failing the whole message.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Security type (`secType` on the wire).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecType {
    #[serde(rename = "STK")]
    Stock,
    #[serde(rename = "OPT")]
    Option,
    #[serde(rename = "FUT")]
    Future,
    #[serde(rename = "CASH")]
    Forex,
    #[serde(rename = "IND")]
    Index,
    #[serde(rename = "FOP")]
    FutureOption,
    #[serde(rename = "BOND")]
    Bond,
    #[serde(rename = "FUND")]
    Fund,
    #[serde(rename = "WAR")]
    Warrant,
    #[serde(rename = "CMDTY")]
    Commodity,
    #[serde(rename = "BAG")]
    Combo,
    #[serde(rename = "CFD")]
    Cfd,
    #[serde(rename = "CRYPTO")]
    Crypto,
    /// Unrecognized security type from the server.
    #[serde(untagged)]
    Other(String),
}

impl fmt::Display for SecType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stock => write!(f, "STK"),
            Self::Option => write!(f, "OPT"),
            Self::Future => write!(f, "FUT"),
            Self::Forex => write!(f, "CASH"),
            Self::Index => write!(f, "IND"),
            Self::FutureOption => write!(f, "FOP"),
            Self::Bond => write!(f, "BOND"),
            Self::Fund => write!(f, "FUND"),
            Self::Warrant => write!(f, "WAR"),
            Self::Commodity => write!(f, "CMDTY"),
            Self::Combo => write!(f, "BAG"),
            Self::Cfd => write!(f, "CFD"),
            Self::Crypto => write!(f, "CRYPTO"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

impl FromStr for SecType {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "STK" => Self::Stock,
            "OPT" => Self::Option,
            "FUT" => Self::Future,
            "CASH" => Self::Forex,
            "IND" => Self::Index,
            "FOP" => Self::FutureOption,
            "BOND" => Self::Bond,
            "FUND" => Self::Fund,
            "WAR" => Self::Warrant,
            "CMDTY" => Self::Commodity,
            "BAG" => Self::Combo,
            "CFD" => Self::Cfd,
            "CRYPTO" => Self::Crypto,
            other => Self::Other(other.to_string()),
        })
    }
}

/// Option right (`right` on the wire).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Right {
    #[serde(rename = "C")]
    Call,
    #[serde(rename = "P")]
    Put,
    #[serde(rename = "")]
    Undefined,
}

impl fmt::Display for Right {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Call => write!(f, "C"),
            Self::Put => write!(f, "P"),
            Self::Undefined => write!(f, ""),
        }
    }
}

impl FromStr for Right {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "C" | "CALL" => Self::Call,
            "P" | "PUT" => Self::Put,
            _ => Self::Undefined,
        })
    }
}
