use std::marker::PhantomData;

use serde::{de::DeserializeOwned, Serialize};

use crate::error::DecodeError;

/// Per-route translation between a typed value and its wire representation.
///
/// One codec instance is associated with each typed route at registration
/// time. Decoding failures are reported per-route (the offending frame is
/// discarded) and must never take down the connection.
pub trait Codec<T>: Send + Sync {
    fn encode(&self, value: &T) -> Vec<u8>;
    fn decode(&self, path: &str, bytes: &[u8]) -> Result<T, DecodeError>;
}

// lets gates hold a shared `Arc<dyn Codec<T>>` and still hand it to the
// registry's by-value binding methods
impl<T, C> Codec<T> for std::sync::Arc<C>
where
    C: Codec<T> + ?Sized,
{
    fn encode(&self, value: &T) -> Vec<u8> {
        (**self).encode(value)
    }

    fn decode(&self, path: &str, bytes: &[u8]) -> Result<T, DecodeError> {
        (**self).decode(path, bytes)
    }
}

/// JSON codec for any serde-capable value type. The default choice for gate
/// routes; payloads stay human-readable on the wire.
pub struct JsonCodec<T> {
    marker: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        Self {
            marker: PhantomData,
        }
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Codec<T> for JsonCodec<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    fn encode(&self, value: &T) -> Vec<u8> {
        // serialization of an in-memory value cannot fail for the types
        // routes carry; a failure here is a programming error
        serde_json::to_vec(value).unwrap_or_default()
    }

    fn decode(&self, path: &str, bytes: &[u8]) -> Result<T, DecodeError> {
        serde_json::from_slice(bytes).map_err(|err| DecodeError::Malformed {
            path: path.to_string(),
            detail: err.to_string(),
        })
    }
}

/// Compact binary codec for routes where payload size matters more than
/// wire readability.
pub struct BincodeCodec<T> {
    marker: PhantomData<fn() -> T>,
}

impl<T> BincodeCodec<T> {
    pub fn new() -> Self {
        Self {
            marker: PhantomData,
        }
    }
}

impl<T> Default for BincodeCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Codec<T> for BincodeCodec<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    fn encode(&self, value: &T) -> Vec<u8> {
        bincode::serialize(value).unwrap_or_default()
    }

    fn decode(&self, path: &str, bytes: &[u8]) -> Result<T, DecodeError> {
        bincode::deserialize(bytes).map_err(|err| DecodeError::Malformed {
            path: path.to_string(),
            detail: err.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip() {
        let codec = JsonCodec::<f64>::new();
        let bytes = codec.encode(&9.81);
        assert_eq!(codec.decode("daqc_gate/AT0/value", &bytes).unwrap(), 9.81);
    }

    #[test]
    fn json_decode_failure_names_the_route() {
        let codec = JsonCodec::<f64>::new();
        let err = codec
            .decode("daqc_gate/AT0/value", b"not json")
            .unwrap_err();
        match err {
            DecodeError::Malformed { path, .. } => {
                assert_eq!(path, "daqc_gate/AT0/value");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn bincode_round_trip() {
        let codec = BincodeCodec::<(u32, bool)>::new();
        let bytes = codec.encode(&(7, true));
        assert_eq!(codec.decode("p", &bytes).unwrap(), (7, true));
    }
}
