//! Host-side transport implementations. Tests typically use the in-memory
//! channel transport from `daqlink_shared::transport::channel` instead.

pub mod ws;
