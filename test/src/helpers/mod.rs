mod harness;
mod scripted_driver;

pub use harness::{remote_with_raw_peer, wait_until, Harness};
pub use scripted_driver::ScriptedDriver;
