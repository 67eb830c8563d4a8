use serde::{Deserialize, Serialize};

use crate::{error::DecodeError, path::Path};

/// The unit of wire transfer: a route address plus an optional payload.
///
/// `payload == None` denotes a Ping, a payload-less signal frame used for
/// commands. A `Some` payload carries the route codec's serialized form of
/// the underlying typed value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireFrame {
    pub path: Vec<String>,
    pub payload: Option<Vec<u8>>,
}

impl WireFrame {
    pub fn value(path: &Path, payload: Vec<u8>) -> Self {
        Self {
            path: path.segments().to_vec(),
            payload: Some(payload),
        }
    }

    pub fn ping(path: &Path) -> Self {
        Self {
            path: path.segments().to_vec(),
            payload: None,
        }
    }

    pub fn is_ping(&self) -> bool {
        self.payload.is_none()
    }

    /// Encodes the frame for the byte transport.
    pub fn to_bytes(&self) -> Vec<u8> {
        bincode::serialize(self).unwrap_or_default()
    }

    /// Decodes a frame off the byte transport.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        bincode::deserialize(bytes).map_err(|err| DecodeError::Frame {
            detail: err.to_string(),
        })
    }

    /// The frame's address as a [`Path`], or `None` for a frame with an
    /// empty segment list (which no route can match).
    pub fn route_path(&self) -> Option<Path> {
        Path::new(self.path.iter().cloned()).ok()
    }
}
