//! # Daqlink Host
//! The device-owning side of the daqlink sync protocol: wraps hardware
//! input/output channels as synchronized gates and serves their routes to a
//! remote peer over a websocket.

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

mod device;
mod driver;
mod gate;

pub mod transport;

pub use device::{HostDevice, HostDeviceBuilder};
pub use driver::{DriverError, GateDriver, RateConfigurableDriver};
pub use gate::HostGate;
