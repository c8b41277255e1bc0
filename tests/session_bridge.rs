//! End-to-end bridge tests against a scripted gateway on localhost.

mod common;

use std::net::TcpListener;
use std::time::{Duration, Instant};

use common::{as_strs, position_fields, symbol_samples_fields, MockGateway, SERVER_VERSION};
use rust_decimal::Decimal;
use tws_bridge::{BridgeError, Request, Response, Session, SessionConfig, StreamKind};

const WAIT: Duration = Duration::from_secs(5);
const SHORT: Duration = Duration::from_millis(300);

// ============================================================================
// Symbol search
// ============================================================================

#[test]
fn matching_symbols_returns_whole_batch() {
    let gateway = MockGateway::spawn(|mut conn| {
        conn.handshake(SERVER_VERSION);
        let request = conn.read_fields().unwrap();
        let samples = symbol_samples_fields(&request[1], &[("756733", "SPY"), ("1", "SPYG"), ("2", "SPYD")]);
        conn.send(&as_strs(&samples));
        let mut requests = vec![request];
        requests.extend(conn.drain_until_eof());
        requests
    });

    let session = Session::connect(&gateway.config()).unwrap();
    let descriptions = session.matching_symbols("SPY", WAIT).unwrap().received().unwrap();
    session.disconnect().unwrap();

    let symbols: Vec<_> = descriptions.iter().map(|d| d.contract.symbol.as_str()).collect();
    assert_eq!(symbols, ["SPY", "SPYG", "SPYD"]);
    assert_eq!(descriptions[0].contract.con_id, 756733);
    assert_eq!(descriptions[0].contract.primary_exchange, "ARCA");
    assert_eq!(descriptions[0].derivative_sec_types, ["OPT"]);

    let requests = gateway.join();
    assert_eq!(requests, [["81", "1", "SPY"]]);
}

#[test]
fn matching_symbols_without_reply_is_exceeded() {
    let gateway = MockGateway::spawn(|mut conn| {
        conn.handshake(SERVER_VERSION);
        conn.drain_until_eof()
    });

    let session = Session::connect(&gateway.config()).unwrap();
    let started = Instant::now();
    let response = session.matching_symbols("NOPE", SHORT).unwrap();
    assert!(response.is_exceeded());
    assert!(started.elapsed() >= SHORT);
    assert!(!session.has_errors());
    session.disconnect().unwrap();

    assert_eq!(gateway.join().len(), 1);
}

#[test]
fn errors_are_queued_in_arrival_order() {
    let gateway = MockGateway::spawn(|mut conn| {
        conn.handshake(SERVER_VERSION);
        let request = conn.read_fields().unwrap();
        let req_id = request[1].clone();
        conn.send(&["4", "2", "-1", "2104", "Market data farm connection is OK:usfarm", ""]);
        conn.send(&["4", "2", req_id.as_str(), "200", "No security definition has been found for the request", ""]);
        let samples = symbol_samples_fields(&req_id, &[]);
        conn.send(&as_strs(&samples));
        conn.drain_until_eof();
    });

    let session = Session::connect(&gateway.config()).unwrap();
    let descriptions = session.matching_symbols("ZZZZ", WAIT).unwrap().received().unwrap();
    assert!(descriptions.is_empty());

    // Errors travel the same event path ahead of the batch.
    let first = session.poll_error().unwrap();
    assert_eq!(first.code, 2104);
    assert!(first.is_warning());
    let second = session.poll_error().unwrap();
    assert_eq!(second.req_id, 1);
    assert_eq!(
        second.to_string(),
        "IB error id 1 errorcode 200 string No security definition has been found for the request"
    );
    assert!(session.poll_error().is_none());

    session.disconnect().unwrap();
    gateway.join();
}

#[test]
fn matching_symbols_skips_batch_for_other_request() {
    let gateway = MockGateway::spawn(|mut conn| {
        conn.handshake(SERVER_VERSION);
        let request = conn.read_fields().unwrap();
        let stale = symbol_samples_fields("99", &[("1", "OLD")]);
        conn.send(&as_strs(&stale));
        let current = symbol_samples_fields(&request[1], &[("756733", "SPY")]);
        conn.send(&as_strs(&current));
        conn.drain_until_eof();
    });

    let session = Session::connect(&gateway.config()).unwrap();
    let descriptions = session.matching_symbols("SPY", WAIT).unwrap().received().unwrap();
    assert_eq!(descriptions.len(), 1);
    assert_eq!(descriptions[0].contract.symbol, "SPY");
    session.disconnect().unwrap();
    gateway.join();
}

#[test]
fn error_time_prefixes_console_line() {
    let gateway = MockGateway::spawn(|mut conn| {
        conn.handshake("194");
        let request = conn.read_fields().unwrap();
        let req_id = request[1].clone();
        conn.send(&[
            "4",
            "2",
            req_id.as_str(),
            "200",
            "No security definition has been found for the request",
            "",
            "1708876800123",
        ]);
        let samples = symbol_samples_fields(&req_id, &[]);
        conn.send(&as_strs(&samples));
        conn.drain_until_eof();
    });

    let session = Session::connect(&gateway.config()).unwrap();
    assert!(session.matching_symbols("ZZZZ", WAIT).unwrap().received().is_some());

    let error = session.poll_error().unwrap();
    assert_eq!(error.error_time, 1_708_876_800_123);
    assert_eq!(
        error.to_string(),
        "2024-02-25T16:00:00.123Z IB error id 1 errorcode 200 string No security definition has been found for the request"
    );
    session.disconnect().unwrap();
    gateway.join();
}

#[test]
fn old_server_rejects_symbol_search_on_error_queue() {
    let gateway = MockGateway::spawn(|mut conn| {
        conn.handshake("100");
        conn.drain_until_eof()
    });

    let session = Session::connect(&gateway.config()).unwrap();
    let response = session.matching_symbols("SPY", SHORT).unwrap();
    assert!(response.is_exceeded());

    let errors = session.drain_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].req_id, 1);
    assert_eq!(errors[0].code, 503);
    session.disconnect().unwrap();

    // Nothing reached the wire.
    assert!(gateway.join().is_empty());
}

// ============================================================================
// Positions
// ============================================================================

#[test]
fn positions_drains_until_end_then_cancels() {
    let gateway = MockGateway::spawn(|mut conn| {
        conn.handshake(SERVER_VERSION);
        let request = conn.read_fields().unwrap();
        let aapl = position_fields("DU123", "265598", "AAPL", "100", "150.25");
        let msft = position_fields("DU123", "272093", "MSFT", "-5.5", "310");
        conn.send(&as_strs(&aapl));
        conn.send(&as_strs(&msft));
        conn.send(&["62", "1"]);
        let mut requests = vec![request];
        requests.extend(conn.drain_until_eof());
        requests
    });

    let session = Session::connect(&gateway.config()).unwrap();
    let drained = session.positions(WAIT).unwrap();
    session.disconnect().unwrap();

    assert!(drained.completed);
    assert_eq!(drained.records.len(), 2);
    assert_eq!(
        drained.records[0].to_string(),
        "Position. DU123 Symbol: AAPL SecType: STK Currency: USD Position: 100 Avg cost: 150.25"
    );
    assert_eq!(drained.records[1].contract.symbol, "MSFT");
    assert_eq!(drained.records[1].position, Decimal::new(-55, 1));

    let requests = gateway.join();
    assert_eq!(requests, [["61", "1"], ["64", "1"]]);
}

#[test]
fn positions_with_no_holdings_is_empty_and_complete() {
    let gateway = MockGateway::spawn(|mut conn| {
        conn.handshake(SERVER_VERSION);
        conn.read_fields().unwrap();
        conn.send(&["62", "1"]);
        conn.drain_until_eof();
    });

    let session = Session::connect(&gateway.config()).unwrap();
    let drained = session.positions(WAIT).unwrap();
    assert!(drained.completed);
    assert!(drained.records.is_empty());
    session.disconnect().unwrap();
    gateway.join();
}

#[test]
fn positions_without_end_reports_partial() {
    let gateway = MockGateway::spawn(|mut conn| {
        conn.handshake(SERVER_VERSION);
        conn.read_fields().unwrap();
        let aapl = position_fields("DU123", "265598", "AAPL", "100", "150.25");
        conn.send(&as_strs(&aapl));
        conn.drain_until_eof();
    });

    let session = Session::connect(&gateway.config()).unwrap();
    let drained = session.positions(SHORT).unwrap();
    assert!(!drained.completed);
    assert_eq!(drained.records.len(), 1);
    session.disconnect().unwrap();
    gateway.join();
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn connect_then_disconnect_without_requests() {
    let gateway = MockGateway::spawn(|mut conn| {
        conn.handshake(SERVER_VERSION);
        conn.send(&["15", "1", "DU123,DU456"]);
        conn.send(&["9", "1", "1"]);
        conn.drain_until_eof()
    });

    let mut session = Session::connect(&gateway.config()).unwrap();
    assert!(session.poll_error().is_none());

    // Account list may still be in flight right after the handshake.
    let deadline = Instant::now() + WAIT;
    while session.managed_accounts().is_empty() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(session.managed_accounts(), ["DU123", "DU456"]);

    session.close().unwrap();
    session.close().unwrap();
    assert!(matches!(
        session.issue(Request::Positions),
        Err(BridgeError::SessionClosed)
    ));

    // The gateway saw the socket close and no requests.
    assert!(gateway.join().is_empty());
}

#[test]
fn connect_to_closed_port_fails() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let config = SessionConfig {
        port,
        ..SessionConfig::default()
    };
    assert!(matches!(Session::connect(&config), Err(BridgeError::Api(_))));
}

#[test]
fn gateway_hangup_wakes_blocked_caller() {
    let gateway = MockGateway::spawn(|mut conn| {
        conn.handshake(SERVER_VERSION);
        conn.read_fields().unwrap();
        conn.close();
    });

    let session = Session::connect(&gateway.config()).unwrap();
    let started = Instant::now();
    let result = session.matching_symbols("SPY", Duration::from_secs(30));
    assert!(matches!(
        result,
        Err(BridgeError::StreamClosed {
            kind: StreamKind::ContractDescriptions
        })
    ));
    assert!(started.elapsed() < Duration::from_secs(30));
    session.disconnect().unwrap();
    gateway.join();
}

#[test]
fn response_exceeded_has_no_value() {
    let response: Response<i32> = Response::Exceeded;
    assert_eq!(response.received(), None);
}
