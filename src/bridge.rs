//! Session bridge: blocking, timeout-bounded access to the async gateway
//! client.
//!
//! A [`Session`] owns one background thread (`gateway-session`) that hosts a
//! current-thread tokio runtime. The gateway client's reader task and the
//! event loop both run there, so a session never adds more than that one
//! thread. The loop turns each incoming event into a [`Wrapper`] callback on
//! the [`Router`], which pushes the payload into the queue registered for
//! that response kind. The foreground thread pulls from those queues with
//! [`Stream::await_response`] and [`Stream::drain`].
//!
//! Error notifications travel on their own queue and are read with
//! [`Session::poll_error`] / [`Session::drain_errors`] once the primary
//! request has completed or timed out.

use std::fmt;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::sync::mpsc;

use tws_bridge_ibapi::{
    dispatch, Contract, ContractDescription, IBApiError, IBClient, IBEvent, Wrapper,
};

use crate::config::SessionConfig;
use crate::models::{ContractDescriptions, ErrorRecord, PositionRecord};

/// Request identifier returned for requests the gateway does not key.
pub const NO_REQUEST_ID: i32 = -1;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Api(#[from] IBApiError),

    #[error("failed to spawn session thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("failed to build session runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("session is closed")]
    SessionClosed,

    #[error("{kind} stream closed")]
    StreamClosed { kind: StreamKind },

    #[error("session thread panicked")]
    WorkerPanicked,
}

pub type Result<T> = std::result::Result<T, BridgeError>;

// ============================================================================
// Queue items
// ============================================================================

/// Response stream a queue is registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    ContractDescriptions,
    Positions,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ContractDescriptions => write!(f, "contract descriptions"),
            Self::Positions => write!(f, "positions"),
        }
    }
}

/// Item of a multi-part stream: a record, or the end-of-stream sentinel.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem<T> {
    Record(T),
    End,
}

/// Outcome of a bounded wait.
#[derive(Debug, Clone, PartialEq)]
pub enum Response<T> {
    Received(T),
    /// Nothing arrived before the timeout.
    Exceeded,
}

impl<T> Response<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Response<U> {
        match self {
            Self::Received(value) => Response::Received(f(value)),
            Self::Exceeded => Response::Exceeded,
        }
    }

    pub fn received(self) -> Option<T> {
        match self {
            Self::Received(value) => Some(value),
            Self::Exceeded => None,
        }
    }

    pub fn is_exceeded(&self) -> bool {
        matches!(self, Self::Exceeded)
    }
}

/// Records collected by [`Stream::drain`], in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamDrain<T> {
    pub records: Vec<T>,
    /// `true` when the end sentinel arrived, `false` when a pull timed out.
    pub completed: bool,
}

// ============================================================================
// Stream
// ============================================================================

/// Consumer end of a registered response queue.
pub struct Stream<T> {
    rx: Receiver<T>,
    kind: StreamKind,
}

impl<T> Stream<T> {
    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    /// Block until one item arrives or `timeout` elapses.
    ///
    /// Fails only when the stream can never yield again: it was replaced by
    /// a newer registration, or the session ended.
    pub fn await_response(&self, timeout: Duration) -> Result<Response<T>> {
        match self.rx.recv_timeout(timeout) {
            Ok(item) => Ok(Response::Received(item)),
            Err(RecvTimeoutError::Timeout) => Ok(Response::Exceeded),
            Err(RecvTimeoutError::Disconnected) => Err(BridgeError::StreamClosed { kind: self.kind }),
        }
    }
}

impl<T> Stream<StreamItem<T>> {
    /// Pull records until the end sentinel, or until one pull waits longer
    /// than `timeout`. Each pull gets the full timeout.
    pub fn drain(&self, timeout: Duration) -> Result<StreamDrain<T>> {
        let mut records = Vec::new();
        loop {
            match self.await_response(timeout)? {
                Response::Received(StreamItem::Record(record)) => records.push(record),
                Response::Received(StreamItem::End) => {
                    return Ok(StreamDrain {
                        records,
                        completed: true,
                    })
                }
                Response::Exceeded => {
                    return Ok(StreamDrain {
                        records,
                        completed: false,
                    })
                }
            }
        }
    }
}

// ============================================================================
// Router
// ============================================================================

enum SlotState<T> {
    Vacant,
    Registered(Sender<T>),
    Closed,
}

/// Producer end of one response kind. Holds at most one live sender.
struct Slot<T> {
    kind: StreamKind,
    state: Mutex<SlotState<T>>,
}

impl<T> Slot<T> {
    fn new(kind: StreamKind) -> Self {
        Self {
            kind,
            state: Mutex::new(SlotState::Vacant),
        }
    }

    /// Install a fresh queue, disconnecting any previous one.
    fn register(&self) -> Stream<T> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let stream = Stream { rx, kind: self.kind };
        let mut state = self.state.lock();
        match *state {
            // Dropping `tx` leaves the new stream disconnected.
            SlotState::Closed => return stream,
            SlotState::Registered(_) => {
                tracing::debug!(kind = %self.kind, "replacing registered stream");
            }
            SlotState::Vacant => {}
        }
        *state = SlotState::Registered(tx);
        stream
    }

    fn push(&self, item: T) {
        let state = self.state.lock();
        match &*state {
            SlotState::Registered(tx) => {
                if tx.send(item).is_err() {
                    tracing::debug!(kind = %self.kind, "stream receiver dropped, discarding item");
                }
            }
            _ => tracing::debug!(kind = %self.kind, "no stream registered, dropping callback"),
        }
    }

    fn close(&self) {
        *self.state.lock() = SlotState::Closed;
    }
}

/// Callback side of the bridge: turns gateway callbacks into queue pushes.
///
/// Runs on the session thread. Every callback returns without blocking.
pub struct Router {
    errors: Sender<ErrorRecord>,
    contract_descriptions: Slot<ContractDescriptions>,
    positions: Slot<StreamItem<PositionRecord>>,
    managed_accounts: Mutex<Vec<String>>,
}

impl Router {
    pub fn new(errors: Sender<ErrorRecord>) -> Self {
        Self {
            errors,
            contract_descriptions: Slot::new(StreamKind::ContractDescriptions),
            positions: Slot::new(StreamKind::Positions),
            managed_accounts: Mutex::new(Vec::new()),
        }
    }

    pub fn register_contract_descriptions(&self) -> Stream<ContractDescriptions> {
        self.contract_descriptions.register()
    }

    pub fn register_positions(&self) -> Stream<StreamItem<PositionRecord>> {
        self.positions.register()
    }

    pub fn push_error(&self, record: ErrorRecord) {
        // The receiver lives as long as the session that owns this router.
        let _ = self.errors.send(record);
    }

    /// Accounts from the last `managedAccounts` callback.
    pub fn accounts(&self) -> Vec<String> {
        self.managed_accounts.lock().clone()
    }

    /// Disconnect every registered stream; later registrations start closed.
    pub fn close_streams(&self) {
        self.contract_descriptions.close();
        self.positions.close();
    }
}

impl Wrapper for Router {
    fn next_valid_id(&self, order_id: i64) {
        tracing::info!(order_id, "next valid order id");
    }

    fn managed_accounts(&self, accounts: &str) {
        let list: Vec<String> = accounts
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        tracing::info!(accounts = %list.join(","), "managed accounts");
        *self.managed_accounts.lock() = list;
    }

    fn error(&self, req_id: i32, error_time: i64, code: i32, message: &str, _advanced_order_reject_json: &str) {
        let record = ErrorRecord {
            req_id,
            code,
            message: message.to_string(),
            error_time,
        };
        if record.is_warning() {
            tracing::debug!(req_id, code, message, "gateway notice");
        } else {
            tracing::warn!(req_id, code, message, "gateway error");
        }
        self.push_error(record);
    }

    fn connection_closed(&self) {
        tracing::info!("gateway connection closed");
    }

    fn position(&self, account: &str, contract: &Contract, position: Decimal, avg_cost: f64) {
        self.positions.push(StreamItem::Record(PositionRecord {
            account: account.to_string(),
            contract: contract.clone(),
            position,
            avg_cost,
        }));
    }

    fn position_end(&self) {
        tracing::info!("position end");
        self.positions.push(StreamItem::End);
    }

    fn symbol_samples(&self, req_id: i32, descriptions: Vec<ContractDescription>) {
        tracing::info!(req_id, count = descriptions.len(), "symbol samples");
        self.contract_descriptions.push(ContractDescriptions {
            req_id,
            descriptions,
        });
    }

    fn unknown(&self, msg_id: i32, data: &[u8]) {
        tracing::trace!(msg_id, len = data.len(), "ignoring message");
    }
}

// ============================================================================
// Requests
// ============================================================================

/// Requests the foreground can issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    MatchingSymbols { req_id: i32, pattern: String },
    Positions,
    CancelPositions,
}

impl Request {
    /// Identifier the gateway keys responses by.
    pub fn req_id(&self) -> i32 {
        match self {
            Self::MatchingSymbols { req_id, .. } => *req_id,
            Self::Positions | Self::CancelPositions => NO_REQUEST_ID,
        }
    }
}

/// Messages from the foreground to the session thread.
#[derive(Debug)]
enum Command {
    Request(Request),
    Shutdown,
}

// ============================================================================
// Session
// ============================================================================

/// A connected gateway session.
///
/// Dropping the session disconnects it; call [`Session::disconnect`] to see
/// teardown failures.
pub struct Session {
    commands: mpsc::UnboundedSender<Command>,
    router: Arc<Router>,
    errors: Receiver<ErrorRecord>,
    worker: Option<JoinHandle<()>>,
    next_req_id: AtomicI32,
}

impl Session {
    /// Connect to the gateway and start the session thread.
    ///
    /// Blocks until the handshake has succeeded or failed.
    pub fn connect(config: &SessionConfig) -> Result<Self> {
        let (errors_tx, errors) = crossbeam_channel::unbounded();
        let router = Arc::new(Router::new(errors_tx));
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);

        let worker = {
            let config = config.clone();
            let router = Arc::clone(&router);
            thread::Builder::new()
                .name("gateway-session".into())
                .spawn(move || run_worker(config, router, commands_rx, ready_tx))
                .map_err(BridgeError::Spawn)?
        };

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = worker.join();
                return Err(e);
            }
            Err(_) => {
                return Err(match worker.join() {
                    Err(_) => BridgeError::WorkerPanicked,
                    Ok(()) => BridgeError::SessionClosed,
                })
            }
        }

        Ok(Self {
            commands,
            router,
            errors,
            worker: Some(worker),
            next_req_id: AtomicI32::new(1),
        })
    }

    /// Fresh request identifier, starting at 1.
    pub fn next_request_id(&self) -> i32 {
        self.next_req_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Register the queue for symbol-sample batches.
    pub fn register_contract_descriptions(&self) -> Stream<ContractDescriptions> {
        self.router.register_contract_descriptions()
    }

    /// Register the queue for position records and the end sentinel.
    pub fn register_positions(&self) -> Stream<StreamItem<PositionRecord>> {
        self.router.register_positions()
    }

    /// Hand a request to the session thread without waiting for it.
    ///
    /// Returns the identifier its responses are keyed by. Send failures on
    /// the session thread are reported on the error queue.
    pub fn issue(&self, request: Request) -> Result<i32> {
        let req_id = request.req_id();
        self.commands
            .send(Command::Request(request))
            .map_err(|_| BridgeError::SessionClosed)?;
        Ok(req_id)
    }

    /// Search for contracts matching `pattern` and wait for the batch.
    pub fn matching_symbols(&self, pattern: &str, timeout: Duration) -> Result<Response<Vec<ContractDescription>>> {
        let stream = self.register_contract_descriptions();
        let req_id = self.next_request_id();
        self.issue(Request::MatchingSymbols {
            req_id,
            pattern: pattern.to_string(),
        })?;

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match stream.await_response(remaining)? {
                Response::Received(batch) if batch.req_id == req_id => {
                    return Ok(Response::Received(batch.descriptions))
                }
                Response::Received(batch) => {
                    tracing::debug!(expected = req_id, got = batch.req_id, "discarding stale symbol samples");
                }
                Response::Exceeded => return Ok(Response::Exceeded),
            }
        }
    }

    /// Snapshot all positions, then cancel the subscription.
    pub fn positions(&self, timeout: Duration) -> Result<StreamDrain<PositionRecord>> {
        let stream = self.register_positions();
        self.issue(Request::Positions)?;
        let drained = stream.drain(timeout);
        if let Err(e) = self.issue(Request::CancelPositions) {
            tracing::debug!(error = %e, "positions subscription not cancelled");
        }
        drained
    }

    /// Next queued error, without blocking.
    pub fn poll_error(&self) -> Option<ErrorRecord> {
        self.errors.try_recv().ok()
    }

    /// Every error queued so far, oldest first.
    pub fn drain_errors(&self) -> Vec<ErrorRecord> {
        self.errors.try_iter().collect()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Accounts reported by the gateway after connecting.
    pub fn managed_accounts(&self) -> Vec<String> {
        self.router.accounts()
    }

    /// Stop the session thread and close the connection. Later calls are
    /// no-ops.
    pub fn close(&mut self) -> Result<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        // Fails only when the thread has already exited on its own.
        let _ = self.commands.send(Command::Shutdown);
        worker.join().map_err(|_| BridgeError::WorkerPanicked)?;
        tracing::info!("session closed");
        Ok(())
    }

    pub fn disconnect(mut self) -> Result<()> {
        self.close()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::error!(error = %e, "session teardown failed");
        }
    }
}

// ============================================================================
// Session thread
// ============================================================================

fn run_worker(
    config: SessionConfig,
    router: Arc<Router>,
    commands: mpsc::UnboundedReceiver<Command>,
    ready: Sender<Result<()>>,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            let _ = ready.send(Err(BridgeError::Runtime(e)));
            return;
        }
    };
    runtime.block_on(run_session(config, router, commands, ready));
}

async fn run_session(
    config: SessionConfig,
    router: Arc<Router>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    ready: Sender<Result<()>>,
) {
    let (mut client, mut events) =
        match IBClient::connect(&config.host, config.port, config.client_id, None).await {
            Ok(pair) => pair,
            Err(e) => {
                tracing::error!(error = %e, "gateway connection failed");
                let _ = ready.send(Err(e.into()));
                return;
            }
        };
    tracing::info!(
        host = %config.host,
        port = config.port,
        client_id = client.client_id(),
        server_version = client.server_version(),
        tws_time = client.tws_time(),
        "session connected"
    );
    let _ = ready.send(Ok(()));

    let interrupt = interrupt_signal(config.interrupt_on_ctrl_c);
    tokio::pin!(interrupt);

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Request(request)) => execute(&mut client, request, &router).await,
                Some(Command::Shutdown) | None => break,
            },
            event = events.recv() => match event {
                Some(IBEvent::ConnectionClosed) | None => {
                    router.connection_closed();
                    break;
                }
                Some(event) => dispatch(event, router.as_ref()),
            },
            () = &mut interrupt => {
                tracing::info!("interrupted, ending session");
                break;
            }
        }
    }

    client.disconnect().await;
    router.close_streams();
}

/// Resolves on Ctrl+C when enabled, never otherwise.
async fn interrupt_signal(enabled: bool) {
    if enabled {
        match tokio::signal::ctrl_c().await {
            Ok(()) => return,
            Err(e) => tracing::warn!(error = %e, "cannot listen for Ctrl+C"),
        }
    }
    std::future::pending::<()>().await
}

async fn execute(client: &mut IBClient, request: Request, router: &Router) {
    let req_id = request.req_id();
    let result = match &request {
        Request::MatchingSymbols { req_id, pattern } => client.req_matching_symbols(*req_id, pattern).await,
        Request::Positions => client.req_positions().await,
        Request::CancelPositions => client.cancel_positions().await,
    };
    if let Err(e) = result {
        tracing::warn!(?request, error = %e, "request failed");
        router.push_error(ErrorRecord {
            req_id,
            code: e.client_code(),
            message: e.to_string(),
            error_time: 0,
        });
    }
}
