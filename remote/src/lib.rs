//! # Daqlink Remote
//! The consuming side of the daqlink sync protocol: mirrors a device's
//! gates over a websocket connection, with confirmed-write semantics for
//! remote-settable state.

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

mod device;
mod gate;
mod setting;

pub mod transport;

pub use device::{RemoteDevice, RemoteDeviceBuilder};
pub use gate::RemoteGate;
pub use setting::ConfirmedSetting;
