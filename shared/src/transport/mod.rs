//! Transport seam: an ordered, duplex, message-oriented byte stream.
//!
//! The sync protocol never reads or writes bytes itself; it drives these
//! boxed trait objects. Production code plugs in a websocket implementation,
//! tests plug in the in-memory [`channel`] transport.

use async_trait::async_trait;

use crate::{error::TransportError, frame::WireFrame};

pub mod channel;

/// Factory for transport sessions. `open()` is called once per connection
/// attempt; completing successfully means the transport handshake is done.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self) -> Result<TransportSession, TransportError>;
}

/// One live transport instance: a sink/stream pair over [`WireFrame`]s.
pub struct TransportSession {
    pub sink: Box<dyn FrameSink>,
    pub stream: Box<dyn FrameStream>,
}

/// Write half of a session. Frames are delivered in the order sent.
#[async_trait]
pub trait FrameSink: Send {
    async fn send(&mut self, frame: WireFrame) -> Result<(), TransportError>;
}

/// Read half of a session. `recv()` returning `None` means the peer closed
/// the transport.
#[async_trait]
pub trait FrameStream: Send {
    async fn recv(&mut self) -> Option<Result<WireFrame, TransportError>>;
}
