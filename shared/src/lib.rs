//! # Daqlink Shared
//! Common functionality shared between daqlink-host & daqlink-remote crates:
//! the route model, the conflated channel primitive, per-route codecs, the
//! freezable route registry, and the connection lifecycle manager.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod bus;
mod channel;
mod codec;
mod connection;
mod error;
mod frame;
mod gate;
mod path;
mod registry;

pub mod transport;

pub use bus::{CriticalErrorBus, EventBus, MessageErrorBus, MessageErrorEvent};
pub use channel::{Conflated, ConflatedReceiver, Signal, SignalReceiver};
pub use codec::{BincodeCodec, Codec, JsonCodec};
pub use connection::{Connection, ConnectionStatus};
pub use error::{
    ConfigError, ConnectError, CriticalError, DecodeError, PathError, ReconnectError,
    SettingResult, TransportError, UnviableReason,
};
pub use frame::WireFrame;
pub use gate::{GateFailure, GatePaths, RateTracker, TransceivingState};
pub use path::{suffix, Path, GATE_PREFIX};
pub use registry::{RouteBuilder, RouteRegistry, RouteTable, Side};
