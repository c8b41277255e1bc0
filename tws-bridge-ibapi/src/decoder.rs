//! Incoming message decoder.
//!
//! Decodes server messages from the wire format: null-terminated ASCII fields
//! parsed from a byte buffer with a cursor. Only the messages this client
//! subscribes to are decoded; everything else surfaces as
//! [`IBEvent::Unknown`].

// Decoder functions sequentially assign fields from wire data,
// which is inherently incompatible with struct-literal initialization.
#![allow(clippy::field_reassign_with_default)]

use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

use crate::errors::{IBApiError, Result};
use crate::models::contract::{Contract, ContractDescription};
use crate::protocol::{incoming, server_version};
use crate::wrapper::IBEvent;

// ============================================================================
// MessageDecoder
// ============================================================================

/// Decodes wire-format message fields from a byte buffer.
///
/// Each `decode_*` method reads the next field (bytes up to the null
/// terminator), parses it into the requested type and advances the cursor.
pub struct MessageDecoder<'a> {
    data: &'a [u8],
    pos: usize,
    server_version: i32,
}

impl<'a> MessageDecoder<'a> {
    /// Create a decoder over a message body (without the 4-byte length header).
    pub fn new(data: &'a [u8], server_version: i32) -> Self {
        Self {
            data,
            pos: 0,
            server_version,
        }
    }

    pub fn server_version(&self) -> i32 {
        self.server_version
    }

    pub fn has_remaining(&self) -> bool {
        self.pos < self.data.len()
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    fn find_field_end(&self) -> Result<usize> {
        self.data[self.pos..]
            .iter()
            .position(|&b| b == 0)
            .map(|offset| self.pos + offset)
            .ok_or_else(|| IBApiError::Decoding("field not null-terminated".into()))
    }

    /// Read the next field up to its null byte and advance past it.
    fn read_field_str(&mut self) -> Result<&'a str> {
        if !self.has_remaining() {
            return Err(IBApiError::Decoding("unexpected end of message".into()));
        }
        let end = self.find_field_end()?;
        let field = std::str::from_utf8(&self.data[self.pos..end])
            .map_err(|e| IBApiError::Decoding(format!("invalid UTF-8: {e}")))?;
        self.pos = end + 1;
        Ok(field)
    }

    // ========================================================================
    // Type-specific decoders
    // ========================================================================

    pub fn decode_string(&mut self) -> Result<String> {
        self.read_field_str().map(|s| s.to_string())
    }

    /// Decode an i32 field. Empty string → 0.
    pub fn decode_i32(&mut self) -> Result<i32> {
        let s = self.read_field_str()?;
        if s.is_empty() {
            return Ok(0);
        }
        s.parse::<i32>()
            .map_err(|e| IBApiError::Decoding(format!("invalid i32 '{s}': {e}")))
    }

    /// Decode an i64 field. Empty string → 0.
    pub fn decode_i64(&mut self) -> Result<i64> {
        let s = self.read_field_str()?;
        if s.is_empty() {
            return Ok(0);
        }
        s.parse::<i64>()
            .map_err(|e| IBApiError::Decoding(format!("invalid i64 '{s}': {e}")))
    }

    /// Decode a f64 field. Handles `"Infinity"`; empty string → 0.0.
    pub fn decode_f64(&mut self) -> Result<f64> {
        let s = self.read_field_str()?;
        if s.is_empty() {
            return Ok(0.0);
        }
        if s == "Infinity" {
            return Ok(f64::INFINITY);
        }
        s.parse::<f64>()
            .map_err(|e| IBApiError::Decoding(format!("invalid f64 '{s}': {e}")))
    }

    /// Decode an `Option<f64>`: empty string (the unset sentinel) → None.
    pub fn decode_f64_max(&mut self) -> Result<Option<f64>> {
        let s = self.read_field_str()?;
        if s.is_empty() {
            return Ok(None);
        }
        if s == "Infinity" {
            return Ok(Some(f64::INFINITY));
        }
        s.parse::<f64>()
            .map(Some)
            .map_err(|e| IBApiError::Decoding(format!("invalid f64 '{s}': {e}")))
    }

    /// Decode a Decimal field. Empty string → 0.
    pub fn decode_decimal(&mut self) -> Result<Decimal> {
        let s = self.read_field_str()?;
        if s.is_empty() {
            return Ok(Decimal::ZERO);
        }
        Decimal::from_str(s)
            .map_err(|e| IBApiError::Decoding(format!("invalid Decimal '{s}': {e}")))
    }

    /// Decode a time field (epoch milliseconds as text).
    pub fn decode_time(&mut self) -> Result<i64> {
        self.decode_i64()
    }

    /// Message ids are text while the negotiated version stays below
    /// `server_version::PROTOBUF`, which the client's version range enforces.
    pub fn decode_msg_id(&mut self) -> Result<i32> {
        self.decode_i32()
    }

    /// Decode an optional enum: empty string → None.
    pub fn decode_enum_opt<T: FromStr>(&mut self) -> Result<Option<T>>
    where
        T::Err: fmt::Display,
    {
        let s = self.read_field_str()?;
        if s.is_empty() {
            return Ok(None);
        }
        s.parse::<T>()
            .map(Some)
            .map_err(|e| IBApiError::Decoding(format!("invalid enum value '{s}': {e}")))
    }
}

// ============================================================================
// Server Message Dispatch
// ============================================================================

/// Decode a complete server message into an `IBEvent`.
///
/// Never fails: a malformed message is logged and surfaces as
/// `IBEvent::Unknown { msg_id: -1, .. }` so a single bad frame cannot stop
/// the reader.
pub fn decode_server_msg(data: &[u8], server_version: i32) -> IBEvent {
    match decode_server_msg_inner(data, server_version) {
        Ok(event) => event,
        Err(e) => {
            tracing::error!(error = %e, len = data.len(), "failed to decode server message");
            IBEvent::Unknown {
                msg_id: -1,
                data: data.to_vec(),
            }
        }
    }
}

fn decode_server_msg_inner(data: &[u8], server_version: i32) -> Result<IBEvent> {
    let mut dec = MessageDecoder::new(data, server_version);
    let msg_id = dec.decode_msg_id()?;

    match msg_id {
        incoming::ERR_MSG => decode_err_msg(&mut dec),
        incoming::NEXT_VALID_ID => decode_next_valid_id(&mut dec),
        incoming::MANAGED_ACCTS => decode_managed_accts(&mut dec),
        incoming::POSITION_DATA => decode_position_data(&mut dec),
        incoming::POSITION_END => Ok(IBEvent::PositionEnd),
        incoming::SYMBOL_SAMPLES => decode_symbol_samples(&mut dec),
        _ => Ok(IBEvent::Unknown {
            msg_id,
            data: data.to_vec(),
        }),
    }
}

// ============================================================================
// Individual Message Decoders
// ============================================================================

/// Decode ERR_MSG (4).
fn decode_err_msg(dec: &mut MessageDecoder) -> Result<IBEvent> {
    let version = dec.decode_i32()?;

    if version < 2 {
        // Old format: just a message string
        let msg = dec.decode_string()?;
        return Ok(IBEvent::Error {
            req_id: -1,
            error_time: 0,
            code: 0,
            message: msg,
            advanced_order_reject_json: String::new(),
        });
    }

    let id = dec.decode_i32()?;
    let error_code = dec.decode_i32()?;
    let error_msg = dec.decode_string()?;

    let advanced_order_reject_json =
        if dec.server_version() >= server_version::ADVANCED_ORDER_REJECT {
            dec.decode_string()?
        } else {
            String::new()
        };

    let error_time = if dec.server_version() >= server_version::ERROR_TIME {
        dec.decode_time()?
    } else {
        0
    };

    Ok(IBEvent::Error {
        req_id: id,
        error_time,
        code: error_code,
        message: error_msg,
        advanced_order_reject_json,
    })
}

/// Decode NEXT_VALID_ID (9).
fn decode_next_valid_id(dec: &mut MessageDecoder) -> Result<IBEvent> {
    let _version = dec.decode_i32()?;
    let order_id = dec.decode_i64()?;
    Ok(IBEvent::NextValidId { order_id })
}

/// Decode MANAGED_ACCTS (15).
fn decode_managed_accts(dec: &mut MessageDecoder) -> Result<IBEvent> {
    let _version = dec.decode_i32()?;
    let accounts = dec.decode_string()?;
    Ok(IBEvent::ManagedAccounts { accounts })
}

/// Decode POSITION_DATA (61).
fn decode_position_data(dec: &mut MessageDecoder) -> Result<IBEvent> {
    let version = dec.decode_i32()?;
    let account = dec.decode_string()?;
    let mut contract = Contract::default();
    contract.con_id = dec.decode_i64()?;
    contract.symbol = dec.decode_string()?;
    contract.sec_type = dec.decode_enum_opt()?;
    contract.last_trade_date_or_contract_month = dec.decode_string()?;
    contract.strike = dec.decode_f64_max()?;
    contract.right = dec.decode_enum_opt()?;
    contract.multiplier = dec.decode_string()?;
    contract.exchange = dec.decode_string()?;
    contract.currency = dec.decode_string()?;
    contract.local_symbol = dec.decode_string()?;
    if version >= 2 {
        contract.trading_class = dec.decode_string()?;
    }
    let position = dec.decode_decimal()?;
    let avg_cost = if version >= 3 { dec.decode_f64()? } else { 0.0 };
    Ok(IBEvent::Position {
        account,
        contract: Box::new(contract),
        position,
        avg_cost,
    })
}

/// Decode SYMBOL_SAMPLES (79).
fn decode_symbol_samples(dec: &mut MessageDecoder) -> Result<IBEvent> {
    let req_id = dec.decode_i32()?;
    // Wire counts are untrusted: vectors grow only with what actually decodes.
    let count = dec.decode_i32()?.max(0);
    let mut descriptions = Vec::new();
    for _ in 0..count {
        let mut c = Contract::default();
        c.con_id = dec.decode_i64()?;
        c.symbol = dec.decode_string()?;
        c.sec_type = dec.decode_enum_opt()?;
        c.primary_exchange = dec.decode_string()?;
        c.currency = dec.decode_string()?;
        let n_types = dec.decode_i32()?.max(0);
        let mut types = Vec::new();
        for _ in 0..n_types {
            types.push(dec.decode_string()?);
        }
        if dec.server_version() >= server_version::BOND_ISSUERID {
            c.description = dec.decode_string()?;
            c.issuer_id = dec.decode_string()?;
        }
        descriptions.push(ContractDescription {
            contract: c,
            derivative_sec_types: types,
        });
    }
    Ok(IBEvent::SymbolSamples {
        req_id,
        descriptions,
    })
}
