use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use futures_util::StreamExt;
use log::{error, info, trace, warn};
use parking_lot::Mutex;
use tokio::{sync::mpsc, task::JoinHandle, time};

use crate::{
    bus::{CriticalErrorBus, MessageErrorBus, MessageErrorEvent},
    channel::{Conflated, ConflatedReceiver},
    error::{ConnectError, CriticalError, DecodeError, ReconnectError},
    frame::WireFrame,
    registry::RouteTable,
    transport::{Transport, TransportSession},
};

// frames queued between the per-route forwarding tasks and the writer task;
// each route contributes at most one frame at a time
const OUTBOUND_QUEUE_DEPTH: usize = 64;

/// Lifecycle of the one transport a connection owns at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    /// A `reconnect()` attempt failed or timed out; a fresh `connect()` or
    /// `reconnect()` call is required to leave this state.
    ReconnectFailed,
}

/// Owns the transport and the frozen route table; the only component that
/// reads or writes wire bytes.
///
/// `connect()` starts exactly one inbound-dispatch task, one
/// outbound-forwarding task per send-bound route, and one writer task that
/// serializes all outbound frames onto the transport (so frames for the same
/// path keep their send order). All tasks are cancelled on `disconnect()` or
/// when a new `connect()` tears the previous session down.
pub struct Connection {
    table: Arc<RouteTable>,
    transport: Arc<dyn Transport>,
    status: Conflated<ConnectionStatus>,
    critical: CriticalErrorBus,
    message_errors: MessageErrorBus,
    session: Mutex<Option<Session>>,
    connect_lock: tokio::sync::Mutex<()>,
    ever_connected: AtomicBool,
}

struct Session {
    tasks: Vec<JoinHandle<()>>,
    // distinguishes a local disconnect() from an unexpected closure
    closing: Arc<AtomicBool>,
}

impl Connection {
    pub fn new(
        table: Arc<RouteTable>,
        transport: Arc<dyn Transport>,
        critical: CriticalErrorBus,
    ) -> Self {
        Self::with_status_slot(table, transport, critical, Conflated::new())
    }

    /// Like [`new`](Connection::new), but publishing status transitions into
    /// a caller-supplied slot. Used by device builders whose gates observe
    /// connection availability and are constructed before the connection.
    pub fn with_status_slot(
        table: Arc<RouteTable>,
        transport: Arc<dyn Transport>,
        critical: CriticalErrorBus,
        status: Conflated<ConnectionStatus>,
    ) -> Self {
        status.offer(ConnectionStatus::Disconnected);
        Self {
            table,
            transport,
            status,
            critical,
            message_errors: MessageErrorBus::new(),
            session: Mutex::new(None),
            connect_lock: tokio::sync::Mutex::new(()),
            ever_connected: AtomicBool::new(false),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
            .latest()
            .unwrap_or(ConnectionStatus::Disconnected)
    }

    pub fn status_updates(&self) -> ConflatedReceiver<ConnectionStatus> {
        self.status.subscribe()
    }

    /// The status slot itself, for components (e.g. confirmed settings) that
    /// gate their behavior on connection availability.
    pub fn status_slot(&self) -> Conflated<ConnectionStatus> {
        self.status.clone()
    }

    pub fn critical_errors(&self) -> &CriticalErrorBus {
        &self.critical
    }

    pub fn message_errors(&self) -> &MessageErrorBus {
        &self.message_errors
    }

    /// Tears down any existing session, opens the transport and spawns the
    /// session tasks. The status becomes `Connected` only after the
    /// transport handshake has completed.
    pub async fn connect(&self) -> Result<(), ConnectError> {
        let _guard = self.connect_lock.lock().await;
        self.teardown();
        self.status.offer(ConnectionStatus::Connecting);

        let session = match self.transport.open().await {
            Ok(session) => session,
            Err(err) => {
                self.status.offer(ConnectionStatus::Disconnected);
                return Err(ConnectError::Transport(err));
            }
        };
        let TransportSession {
            mut sink,
            mut stream,
        } = session;

        let closing = Arc::new(AtomicBool::new(false));
        let mut tasks = Vec::new();
        let (frame_tx, mut frame_rx) = mpsc::channel::<WireFrame>(OUTBOUND_QUEUE_DEPTH);

        // writer task: the single owner of the transport's write half
        {
            let critical = self.critical.clone();
            let status = self.status.clone();
            let closing = closing.clone();
            tasks.push(tokio::spawn(async move {
                while let Some(frame) = frame_rx.recv().await {
                    if let Err(err) = sink.send(frame).await {
                        if !closing.load(Ordering::SeqCst) {
                            error!("outbound write failed: {err}");
                            critical.publish(CriticalError::TerminalConnectionDisruption {
                                detail: err.to_string(),
                            });
                            status.offer(ConnectionStatus::Disconnected);
                        }
                        return;
                    }
                }
            }));
        }

        // inbound dispatch task
        {
            let table = self.table.clone();
            let critical = self.critical.clone();
            let status = self.status.clone();
            let message_errors = self.message_errors.clone();
            let closing = closing.clone();
            tasks.push(tokio::spawn(async move {
                loop {
                    match stream.recv().await {
                        Some(Ok(frame)) => dispatch_frame(&table, &message_errors, frame),
                        Some(Err(err)) => {
                            if !closing.load(Ordering::SeqCst) {
                                error!("inbound read failed: {err}");
                                critical.publish(CriticalError::TerminalConnectionDisruption {
                                    detail: err.to_string(),
                                });
                                status.offer(ConnectionStatus::Disconnected);
                            }
                            return;
                        }
                        None => {
                            if !closing.load(Ordering::SeqCst) {
                                warn!("transport closed by peer");
                                critical.publish(CriticalError::TerminalConnectionDisruption {
                                    detail: "transport closed without local disconnect".to_string(),
                                });
                                status.offer(ConnectionStatus::Disconnected);
                            }
                            return;
                        }
                    }
                }
            }));
        }

        // one forwarding task per send-bound route
        for (path, source) in self.table.outbound_routes() {
            let mut payloads = source.open();
            let path = path.clone();
            let frame_tx = frame_tx.clone();
            let critical = self.critical.clone();
            let closing = closing.clone();
            tasks.push(tokio::spawn(async move {
                while let Some(payload) = payloads.next().await {
                    let frame = match payload {
                        Some(bytes) => WireFrame::value(&path, bytes),
                        None => WireFrame::ping(&path),
                    };
                    if frame_tx.send(frame).await.is_err() {
                        if !closing.load(Ordering::SeqCst) {
                            warn!("outbound forwarding for {path} lost its writer");
                            critical.publish(CriticalError::PartialDisconnection {
                                detail: format!("outbound forwarding for {path} stopped"),
                            });
                        }
                        return;
                    }
                }
            }));
        }

        *self.session.lock() = Some(Session { tasks, closing });
        self.ever_connected.store(true, Ordering::SeqCst);
        self.status.offer(ConnectionStatus::Connected);
        info!(
            "connected; dispatching {} routes ({:?} side)",
            self.table.route_count(),
            self.table.side()
        );
        Ok(())
    }

    /// Tears down any existing transport and retries `connect()`, bounded by
    /// `timeout`. Fails immediately if this connection was never connected.
    pub async fn reconnect(&self, timeout: Duration) -> Result<(), ReconnectError> {
        if !self.ever_connected.load(Ordering::SeqCst) {
            return Err(ReconnectError::NeverConnected);
        }
        match time::timeout(timeout, self.connect()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => {
                self.status.offer(ConnectionStatus::ReconnectFailed);
                self.critical.publish(CriticalError::FailedToReinitialize {
                    detail: err.to_string(),
                });
                Err(ReconnectError::Failed(err))
            }
            Err(_) => {
                self.teardown();
                self.status.offer(ConnectionStatus::ReconnectFailed);
                self.critical.publish(CriticalError::FailedToReinitialize {
                    detail: format!("reconnect timed out after {timeout:?}"),
                });
                Err(ReconnectError::TimedOut {
                    timeout_millis: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Cancels all session tasks and closes the transport. Idempotent.
    pub fn disconnect(&self) {
        self.teardown();
        self.status.offer(ConnectionStatus::Disconnected);
    }

    fn teardown(&self) {
        if let Some(session) = self.session.lock().take() {
            session.closing.store(true, Ordering::SeqCst);
            for task in session.tasks {
                task.abort();
            }
            info!("session torn down");
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn dispatch_frame(table: &RouteTable, message_errors: &MessageErrorBus, frame: WireFrame) {
    let Some(path) = frame.route_path() else {
        warn!("discarding frame with empty path");
        message_errors.publish(MessageErrorEvent {
            path: None,
            error: DecodeError::Frame {
                detail: "frame with empty path".to_string(),
            },
        });
        return;
    };
    match table.inbound(&path) {
        None => {
            // peers may send routes this side does not understand
            trace!("no receiver bound for {path}; discarding frame");
        }
        Some(action) => {
            if let Err(err) = action(&path, frame.payload.as_deref()) {
                warn!("discarding undecodable frame for {path}: {err}");
                message_errors.publish(MessageErrorEvent {
                    path: Some(path),
                    error: err,
                });
            }
        }
    }
}
