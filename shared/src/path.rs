use std::{fmt, sync::Arc};

use crate::error::PathError;

/// Top-level prefix shared by every gate's routes.
pub const GATE_PREFIX: &str = "daqc_gate";

/// Reserved route suffixes understood by every gate implementation.
pub mod suffix {
    pub const VALUE: &str = "value";
    pub const START_SAMPLING: &str = "start_sampling";
    pub const START_SAMPLING_BINARY_STATE: &str = "start_sampling_binary_state";
    pub const START_SAMPLING_PWM: &str = "start_sampling_pwm";
    pub const START_SAMPLING_TRANSITION_FREQUENCY: &str = "start_sampling_transition_frequency";
    pub const STOP_TRANSCEIVING: &str = "stop_transceiving";
    pub const UPDATE_RATE: &str = "update_rate";
    pub const IS_TRANSCEIVING: &str = "is_transceiving";
    pub const IS_TRANSCEIVING_BINARY_STATE: &str = "is_transceiving_binary_state";
    pub const IS_TRANSCEIVING_PWM: &str = "is_transceiving_pwm";
    pub const IS_TRANSCEIVING_FREQUENCY: &str = "is_transceiving_frequency";
    pub const PULSE_WIDTH_MODULATE: &str = "pulse_width_modulate";
    pub const SUSTAIN_TRANSITION_FREQUENCY: &str = "sustain_transition_frequency";
    pub const AVG_FREQUENCY: &str = "avg_frequency";
    pub const FAILURE: &str = "failure";
    pub const BUFFER: &str = "buffer";
    pub const MAX_ACCEPTABLE_ERROR: &str = "max_acceptable_error";
    pub const MAX_ELECTRIC_POTENTIAL: &str = "max_electric_potential";
    pub const CRITICAL_ERROR: &str = "critical_error";
    pub const MESSAGE_ERROR: &str = "message_error";
}

/// Hierarchical address of one synchronized quantity or command.
///
/// A `Path` is an ordered, non-empty sequence of opaque string segments
/// (e.g. `["daqc_gate", "AT0", "value"]`). Segment sequences are immutable
/// once constructed; equality and hashing go by the full sequence. A `Path`
/// is both the registry key for a route and the wire-level address of a
/// frame. Cloning is cheap (shared backing storage).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Path {
    segments: Arc<[String]>,
}

impl Path {
    /// Creates a `Path` from the given segments. At least one segment is
    /// required.
    pub fn new<I, S>(segments: I) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(PathError::Empty);
        }
        Ok(Self {
            segments: segments.into(),
        })
    }

    /// Returns a new `Path` with `segment` appended. The original is
    /// unchanged.
    pub fn extend<S: Into<String>>(&self, segment: S) -> Self {
        let mut segments: Vec<String> = self.segments.to_vec();
        segments.push(segment.into());
        Self {
            segments: segments.into(),
        }
    }

    /// Whether this path starts with all of `prefix`'s segments.
    pub fn prefixed_by(&self, prefix: &Path) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn last_segment(&self) -> &str {
        // non-empty by construction
        self.segments.last().map(String::as_str).unwrap_or_default()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path({self})")
    }
}
