use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by the hardware layer while applying a command.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DriverError {
    /// The hardware rejected or failed a command
    #[error("Hardware command failed: {detail}")]
    Command { detail: String },

    /// A requested update rate cannot be applied by this channel
    #[error("Requested update rate of {requested_hz} Hz is out of range for this channel")]
    RateOutOfRange { requested_hz: f64 },
}

/// Interface to one physical input/output channel. This is the boundary of
/// the sync protocol: drivers own units of measure, calibration and the
/// actual sampling loop, and push produced values into their
/// [`HostGate`](crate::HostGate) with [`offer`](crate::HostGate::offer).
#[async_trait]
pub trait GateDriver: Send + Sync + 'static {
    /// Activates the channel. Called at most once per Idle -> Sampling
    /// transition; repeated `start_sampling` commands while already Sampling
    /// never reach the driver.
    async fn start_sampling(&self) -> Result<(), DriverError>;

    /// Deactivates the channel. Same idempotence contract as
    /// [`start_sampling`](GateDriver::start_sampling), mirrored.
    async fn stop_transceiving(&self) -> Result<(), DriverError>;
}

/// A driver whose sampling rate is commanded rather than observed. Returns
/// the rate actually applied (the hardware may quantize), which is what gets
/// echoed back to the remote side as confirmation.
#[async_trait]
pub trait RateConfigurableDriver: GateDriver {
    async fn apply_update_rate(&self, hz: f64) -> Result<f64, DriverError>;
}
