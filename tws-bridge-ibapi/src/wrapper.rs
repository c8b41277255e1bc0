//! Gateway events and the callback interface.
//!
//! `IBEvent` is what the reader task sends over the event channel returned
//! from `IBClient::connect()`. Consumers that prefer the callback style
//! implement [`Wrapper`] and feed each event through [`dispatch`].

use rust_decimal::Decimal;

use crate::models::contract::{Contract, ContractDescription};

// ============================================================================
// IBEvent
// ============================================================================

/// Events decoded from the TWS/Gateway connection.
///
/// ```rust,ignore
/// let (mut client, mut rx) = IBClient::connect("127.0.0.1", 7497, 10, None).await?;
///
/// while let Some(event) = rx.recv().await {
///     match event {
///         IBEvent::NextValidId { order_id } => { /* ... */ },
///         IBEvent::Error { code, message, .. } => { /* ... */ },
///         _ => {}
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum IBEvent {
    // ========================================================================
    // Connection & Error
    // ========================================================================

    /// Next valid order ID. Sent after successful connection.
    NextValidId { order_id: i64 },

    /// List of managed accounts (comma-separated). Sent after connection.
    ManagedAccounts { accounts: String },

    /// Server or client error, warning or notice.
    ///
    /// `req_id` is `-1` when the message is not tied to a request.
    /// `error_time` is epoch milliseconds, `0` on servers before 194.
    Error {
        req_id: i32,
        error_time: i64,
        code: i32,
        message: String,
        advanced_order_reject_json: String,
    },

    /// Connection to TWS/Gateway has been closed.
    ConnectionClosed,

    // ========================================================================
    // Positions
    // ========================================================================

    /// One position of one account.
    Position {
        account: String,
        contract: Box<Contract>,
        position: Decimal,
        avg_cost: f64,
    },

    /// End of the initial positions snapshot.
    PositionEnd,

    // ========================================================================
    // Contracts
    // ========================================================================

    /// Symbol search results for `req_matching_symbols`.
    SymbolSamples {
        req_id: i32,
        descriptions: Vec<ContractDescription>,
    },

    /// Message with an id this client does not decode.
    /// Contains the raw message bytes for debugging.
    Unknown { msg_id: i32, data: Vec<u8> },
}

// ============================================================================
// Wrapper
// ============================================================================

/// Callback interface for gateway events.
///
/// Every method has a no-op default so implementors only override the
/// callbacks they care about. Callbacks run on whatever thread calls
/// [`dispatch`] and must not block.
pub trait Wrapper {
    fn next_valid_id(&self, _order_id: i64) {}

    fn managed_accounts(&self, _accounts: &str) {}

    fn error(&self, _req_id: i32, _error_time: i64, _code: i32, _message: &str, _advanced_order_reject_json: &str) {}

    fn connection_closed(&self) {}

    fn position(&self, _account: &str, _contract: &Contract, _position: Decimal, _avg_cost: f64) {}

    fn position_end(&self) {}

    fn symbol_samples(&self, _req_id: i32, _descriptions: Vec<ContractDescription>) {}

    fn unknown(&self, _msg_id: i32, _data: &[u8]) {}
}

/// Invoke the `Wrapper` callback that corresponds to `event`.
pub fn dispatch<W: Wrapper + ?Sized>(event: IBEvent, wrapper: &W) {
    match event {
        IBEvent::NextValidId { order_id } => wrapper.next_valid_id(order_id),
        IBEvent::ManagedAccounts { accounts } => wrapper.managed_accounts(&accounts),
        IBEvent::Error {
            req_id,
            error_time,
            code,
            message,
            advanced_order_reject_json,
        } => wrapper.error(req_id, error_time, code, &message, &advanced_order_reject_json),
        IBEvent::ConnectionClosed => wrapper.connection_closed(),
        IBEvent::Position {
            account,
            contract,
            position,
            avg_cost,
        } => wrapper.position(&account, &contract, position, avg_cost),
        IBEvent::PositionEnd => wrapper.position_end(),
        IBEvent::SymbolSamples {
            req_id,
            descriptions,
        } => wrapper.symbol_samples(req_id, descriptions),
        IBEvent::Unknown { msg_id, data } => wrapper.unknown(msg_id, &data),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder {
        calls: RefCell<Vec<String>>,
    }

    impl Wrapper for Recorder {
        fn error(&self, req_id: i32, _error_time: i64, code: i32, message: &str, _json: &str) {
            self.calls.borrow_mut().push(format!("error {req_id} {code} {message}"));
        }

        fn position(&self, account: &str, contract: &Contract, position: Decimal, _avg_cost: f64) {
            self.calls
                .borrow_mut()
                .push(format!("position {account} {} {position}", contract.symbol));
        }

        fn position_end(&self) {
            self.calls.borrow_mut().push("position_end".into());
        }

        fn symbol_samples(&self, req_id: i32, descriptions: Vec<ContractDescription>) {
            self.calls
                .borrow_mut()
                .push(format!("symbols {req_id} {}", descriptions.len()));
        }
    }

    #[test]
    fn dispatch_routes_to_callbacks_in_order() {
        let rec = Recorder::default();
        let contract = Contract {
            symbol: "AAPL".into(),
            ..Contract::default()
        };
        let events = vec![
            IBEvent::Error {
                req_id: 3,
                error_time: 0,
                code: 200,
                message: "No security definition".into(),
                advanced_order_reject_json: String::new(),
            },
            IBEvent::Position {
                account: "DU1".into(),
                contract: Box::new(contract),
                position: Decimal::from(10),
                avg_cost: 1.0,
            },
            IBEvent::PositionEnd,
            IBEvent::SymbolSamples {
                req_id: 4,
                descriptions: vec![ContractDescription::default(); 2],
            },
        ];
        for event in events {
            dispatch(event, &rec);
        }
        assert_eq!(
            *rec.calls.borrow(),
            vec![
                "error 3 200 No security definition",
                "position DU1 AAPL 10",
                "position_end",
                "symbols 4 2",
            ]
        );
    }

    #[test]
    fn default_callbacks_ignore_events() {
        struct Silent;
        impl Wrapper for Silent {}
        dispatch(IBEvent::NextValidId { order_id: 1 }, &Silent);
        dispatch(IBEvent::ConnectionClosed, &Silent);
        dispatch(
            IBEvent::Unknown {
                msg_id: 49,
                data: vec![],
            },
            &Silent,
        );
    }
}
