use thiserror::Error;

/// Errors that can occur while constructing a [`Path`](crate::Path).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// Paths must contain at least one segment
    #[error("A Path must contain at least one segment")]
    Empty,
}

/// Errors that can occur while configuring a route registry. All of these
/// are fatal at startup; none are recoverable at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Two handlers registered for the same (Path, Side)
    #[error("Route {path} is already registered for this side. Each (Path, Side) pair may be bound at most once")]
    DuplicateRoute { path: String },

    /// Binding attempted after the registry was frozen
    #[error("Registry is already frozen and cannot be modified. RouteRegistry::freeze() has been called and no further bindings are allowed")]
    AlreadyFrozen,

    /// A route was opened but neither direction was bound
    #[error("Route {path} was registered with neither a send nor a receive binding. Bind at least one direction before freeze()")]
    UnboundRoute { path: String },
}

/// Per-frame decoding failure. The offending frame is discarded and the
/// error is published on the connection's message-error stream; dispatch of
/// other routes continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Payload could not be decoded into the route's value type
    #[error("Failed to decode payload for route {path}: {detail}")]
    Malformed { path: String, detail: String },

    /// A Value route received a frame with no payload
    #[error("Route {path} expects a value payload but received a Ping frame")]
    MissingPayload { path: String },

    /// Bytes off the wire did not parse as a frame at all
    #[error("Failed to decode wire frame: {detail}")]
    Frame { detail: String },
}

/// Why a set attempt was not viable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UnviableReason {
    /// No confirmed value is known yet for the target setting
    #[error("Setting target is not yet initialised; no confirmed value has been received from the peer")]
    UninitialisedSetting,

    /// Requested value falls outside the configured range
    #[error("Requested value is outside the setting's configured range")]
    SettingOutOfRange,

    /// No connected session over which to send the request
    #[error("Connection is not available; the setting cannot be transmitted")]
    ConnectionUnavailable,
}

/// Outcome of a set attempt on remote-settable state. Returned as a value,
/// never thrown, so callers can inspect-and-continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a set attempt may have been unviable; check the result"]
pub enum SettingResult {
    /// The request was accepted for transmission (confirmation still pending)
    Viable,
    /// The request was not sent
    Unviable(UnviableReason),
}

impl SettingResult {
    pub fn is_viable(&self) -> bool {
        matches!(self, SettingResult::Viable)
    }

    /// Converts an `Unviable` outcome into a hard error, for callers that
    /// do not want to inspect-and-continue.
    pub fn into_result(self) -> Result<(), UnviableReason> {
        match self {
            SettingResult::Viable => Ok(()),
            SettingResult::Unviable(reason) => Err(reason),
        }
    }
}

/// Connection-scope failures published on the critical-error bus. No single
/// caller owns these; supervisory components subscribe for them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CriticalError {
    /// A reconnect attempt failed or timed out
    #[error("Failed to reinitialize connection: {detail}")]
    FailedToReinitialize { detail: String },

    /// A command central to device operation could not be applied
    #[error("Failed to execute major command on gate {uid}: {detail}")]
    FailedMajorCommand { uid: String, detail: String },

    /// The transport closed without a local disconnect() call
    #[error("Connection was terminally disrupted: {detail}")]
    TerminalConnectionDisruption { detail: String },

    /// Part of the session died while the rest kept running
    #[error("Partial disconnection: {detail}")]
    PartialDisconnection { detail: String },
}

/// Errors that can occur at the transport seam.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Opening the transport failed
    #[error("Failed to open transport: {detail}")]
    OpenFailed { detail: String },

    /// The transport is closed
    #[error("Transport is closed")]
    Closed,

    /// Read or write on the open transport failed
    #[error("Transport I/O failed: {detail}")]
    Io { detail: String },
}

/// Errors returned by [`Connection::connect`](crate::Connection::connect).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    /// Transport error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Errors returned by [`Connection::reconnect`](crate::Connection::reconnect).
/// Surfaced as a result, not a panic, so calling code decides retry policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconnectError {
    /// reconnect() requires a previously successful connect()
    #[error("Cannot reconnect: this connection was never connected")]
    NeverConnected,

    /// The attempt did not complete within the caller-supplied timeout
    #[error("Reconnect attempt did not complete within {timeout_millis} ms")]
    TimedOut { timeout_millis: u64 },

    /// The attempt completed but failed
    #[error("Reconnect attempt failed: {0}")]
    Failed(#[from] ConnectError),
}
