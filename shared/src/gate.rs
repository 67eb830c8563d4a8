use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::path::{suffix, Path, GATE_PREFIX};

/// Sampling lifecycle of one gate. Transitions are driven by command Pings
/// on the host; the remote side only mirrors what the host echoes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransceivingState {
    Idle,
    Sampling,
}

/// The full route path set one gate owns, rooted at `["daqc_gate", uid]`.
#[derive(Debug, Clone)]
pub struct GatePaths {
    pub base: Path,
    pub value: Path,
    pub start_sampling: Path,
    pub stop_transceiving: Path,
    pub update_rate: Path,
    pub is_transceiving: Path,
    pub failure: Path,
}

impl GatePaths {
    pub fn new(uid: &str) -> Self {
        // two non-empty segments, construction cannot fail
        let base = Path::new([GATE_PREFIX, uid]).expect("gate prefix is non-empty");
        Self {
            value: base.extend(suffix::VALUE),
            start_sampling: base.extend(suffix::START_SAMPLING),
            stop_transceiving: base.extend(suffix::STOP_TRANSCEIVING),
            update_rate: base.extend(suffix::UPDATE_RATE),
            is_transceiving: base.extend(suffix::IS_TRANSCEIVING),
            failure: base.extend(suffix::FAILURE),
            base,
        }
    }
}

/// Fault raised on the host while producing a value or applying a command,
/// delivered to the remote side on the gate's `failure` route. Other routes
/// keep running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateFailure {
    pub uid: String,
    pub message: String,
}

/// Running average of inter-arrival gaps between successive value
/// observations, exposed as an updates-per-second estimate.
///
/// With no new observations (e.g. while disconnected) the estimate freezes
/// at its last computed value.
#[derive(Debug, Default)]
pub struct RateTracker {
    last_arrival: Option<Instant>,
    avg_gap: Option<Duration>,
    gap_count: u32,
}

impl RateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one value observation at `at`.
    pub fn observe(&mut self, at: Instant) {
        if let Some(last) = self.last_arrival {
            let gap = at.saturating_duration_since(last);
            self.gap_count += 1;
            self.avg_gap = Some(match self.avg_gap {
                None => gap,
                Some(avg) => {
                    // incremental mean over all gaps seen so far
                    let total = avg.as_secs_f64() * f64::from(self.gap_count - 1);
                    Duration::from_secs_f64((total + gap.as_secs_f64()) / f64::from(self.gap_count))
                }
            });
        }
        self.last_arrival = Some(at);
    }

    /// Estimated update rate in Hz, `None` until two observations have been
    /// made (one gap).
    pub fn hz(&self) -> Option<f64> {
        self.avg_gap.and_then(|gap| {
            let secs = gap.as_secs_f64();
            (secs > 0.0).then(|| 1.0 / secs)
        })
    }
}
