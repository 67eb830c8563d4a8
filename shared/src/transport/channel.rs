//! In-memory transport over tokio mpsc channels, for tests and loopback
//! wiring. Both ends of a [`link`] rendezvous in `open()`: whichever side
//! opens first deposits a fresh pair of channels and waits, the other side
//! picks up the complementary halves, completing both handshakes. Reopening
//! after a teardown yields a brand-new session, which makes reconnect
//! scenarios testable without sockets.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{
    mpsc::{self, UnboundedReceiver, UnboundedSender},
    oneshot,
};

use super::{FrameSink, FrameStream, Transport, TransportSession};
use crate::{error::TransportError, frame::WireFrame};

/// Creates a linked pair of in-memory transports.
pub fn link() -> (ChannelTransport, ChannelTransport) {
    let shared = Arc::new(LinkShared {
        pending: Mutex::new(None),
    });
    (
        ChannelTransport {
            shared: Some(shared.clone()),
        },
        ChannelTransport { shared: Some(shared) },
    )
}

struct LinkShared {
    pending: Mutex<Option<PendingSession>>,
}

// the halves reserved for whichever side opens second, plus the handshake
// acknowledgement the first opener is waiting on
struct PendingSession {
    sink: UnboundedSender<WireFrame>,
    stream: UnboundedReceiver<WireFrame>,
    ack: oneshot::Sender<()>,
}

pub struct ChannelTransport {
    shared: Option<Arc<LinkShared>>,
}

impl ChannelTransport {
    /// A transport whose `open()` never completes, standing in for an
    /// unreachable peer in reconnect-timeout tests.
    pub fn unreachable() -> Self {
        Self { shared: None }
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn open(&self) -> Result<TransportSession, TransportError> {
        let Some(shared) = &self.shared else {
            std::future::pending::<()>().await;
            unreachable!();
        };
        let (sink, stream, handshake) = {
            let mut pending = shared.pending.lock();
            // a deposit whose opener gave up (e.g. reconnect timeout) is
            // stale; discard it rather than pair with a dead session
            let deposit = pending.take().filter(|session| !session.ack.is_closed());
            match deposit {
                Some(session) => {
                    // peer opened first; taking its deposit completes both
                    // handshakes
                    let _ = session.ack.send(());
                    (session.sink, session.stream, None)
                }
                None => {
                    let (here_tx, there_rx) = mpsc::unbounded_channel();
                    let (there_tx, here_rx) = mpsc::unbounded_channel();
                    let (ack_tx, ack_rx) = oneshot::channel();
                    *pending = Some(PendingSession {
                        sink: there_tx,
                        stream: there_rx,
                        ack: ack_tx,
                    });
                    (here_tx, here_rx, Some(ack_rx))
                }
            }
        };
        if let Some(ack) = handshake {
            // handshake completes only once the peer opens its end
            ack.await.map_err(|_| TransportError::OpenFailed {
                detail: "link torn down before the peer opened".to_string(),
            })?;
        }
        Ok(TransportSession {
            sink: Box::new(ChannelFrameSink { sender: sink }),
            stream: Box::new(ChannelFrameStream { receiver: stream }),
        })
    }
}

struct ChannelFrameSink {
    sender: UnboundedSender<WireFrame>,
}

#[async_trait]
impl FrameSink for ChannelFrameSink {
    async fn send(&mut self, frame: WireFrame) -> Result<(), TransportError> {
        self.sender.send(frame).map_err(|_| TransportError::Closed)
    }
}

struct ChannelFrameStream {
    receiver: UnboundedReceiver<WireFrame>,
}

#[async_trait]
impl FrameStream for ChannelFrameStream {
    async fn recv(&mut self) -> Option<Result<WireFrame, TransportError>> {
        self.receiver.recv().await.map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::Path;

    #[tokio::test]
    async fn linked_sessions_exchange_frames() {
        let (a, b) = link();
        let (mut session_a, mut session_b) =
            tokio::try_join!(a.open(), b.open()).unwrap();

        let path = Path::new(["daqc_gate", "AT0", "value"]).unwrap();
        session_a
            .sink
            .send(WireFrame::value(&path, vec![7]))
            .await
            .unwrap();
        let frame = session_b.stream.recv().await.unwrap().unwrap();
        assert_eq!(frame.payload, Some(vec![7]));

        session_b.sink.send(WireFrame::ping(&path)).await.unwrap();
        let frame = session_a.stream.recv().await.unwrap().unwrap();
        assert!(frame.is_ping());
    }

    #[tokio::test]
    async fn dropping_one_end_closes_the_peer_stream() {
        let (a, b) = link();
        let (session_a, mut session_b) = tokio::try_join!(a.open(), b.open()).unwrap();
        drop(session_a);
        assert!(session_b.stream.recv().await.is_none());
    }

    #[tokio::test]
    async fn reopening_yields_a_fresh_session() {
        let (a, b) = link();
        let (session_a, session_b) = tokio::try_join!(a.open(), b.open()).unwrap();
        drop(session_a);
        drop(session_b);

        let (mut session_a, mut session_b) =
            tokio::try_join!(a.open(), b.open()).unwrap();
        let path = Path::new(["daqc_gate", "AT0", "value"]).unwrap();
        session_a
            .sink
            .send(WireFrame::value(&path, vec![1]))
            .await
            .unwrap();
        assert!(session_b.stream.recv().await.is_some());
    }
}
