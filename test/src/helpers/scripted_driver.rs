use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use daqlink_host::{DriverError, GateDriver, RateConfigurableDriver};

/// Hardware stand-in that records every command it receives and can be
/// scripted to fail the next activation.
pub struct ScriptedDriver {
    pub starts: AtomicU32,
    pub stops: AtomicU32,
    pub fail_next_start: AtomicBool,
    pub applied_rates: Mutex<Vec<f64>>,
    pub max_hz: f64,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self {
            starts: AtomicU32::new(0),
            stops: AtomicU32::new(0),
            fail_next_start: AtomicBool::new(false),
            applied_rates: Mutex::new(Vec::new()),
            max_hz: 100.0,
        }
    }

    pub fn start_count(&self) -> u32 {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> u32 {
        self.stops.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GateDriver for ScriptedDriver {
    async fn start_sampling(&self) -> Result<(), DriverError> {
        if self.fail_next_start.swap(false, Ordering::SeqCst) {
            return Err(DriverError::Command {
                detail: "scripted activation failure".to_string(),
            });
        }
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn stop_transceiving(&self) -> Result<(), DriverError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl RateConfigurableDriver for ScriptedDriver {
    async fn apply_update_rate(&self, hz: f64) -> Result<f64, DriverError> {
        if !(0.0..=self.max_hz).contains(&hz) {
            return Err(DriverError::RateOutOfRange { requested_hz: hz });
        }
        self.applied_rates.lock().push(hz);
        Ok(hz)
    }
}
