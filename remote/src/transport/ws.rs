//! Websocket connector for the conventional `ws://<host>:<port>/ws`
//! endpoint.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use log::{info, warn};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use daqlink_shared::{
    transport::{FrameSink, FrameStream, Transport, TransportSession},
    TransportError, WireFrame,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Dials the device's websocket endpoint on every `open()`.
pub struct WsClientTransport {
    url: String,
}

impl WsClientTransport {
    /// `url` is a full websocket URL, e.g. `ws://192.168.1.40:8080/ws`.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Transport for WsClientTransport {
    async fn open(&self) -> Result<TransportSession, TransportError> {
        let (ws, _response) =
            connect_async(&self.url)
                .await
                .map_err(|err| TransportError::OpenFailed {
                    detail: format!("{}: {err}", self.url),
                })?;
        info!("websocket session established with {}", self.url);
        let (sink, stream) = ws.split();
        Ok(TransportSession {
            sink: Box::new(WsFrameSink { inner: sink }),
            stream: Box::new(WsFrameStream { inner: stream }),
        })
    }
}

struct WsFrameSink {
    inner: futures_util::stream::SplitSink<WsStream, Message>,
}

#[async_trait]
impl FrameSink for WsFrameSink {
    async fn send(&mut self, frame: WireFrame) -> Result<(), TransportError> {
        self.inner
            .send(Message::Binary(frame.to_bytes().into()))
            .await
            .map_err(|err| TransportError::Io {
                detail: err.to_string(),
            })
    }
}

struct WsFrameStream {
    inner: futures_util::stream::SplitStream<WsStream>,
}

#[async_trait]
impl FrameStream for WsFrameStream {
    async fn recv(&mut self) -> Option<Result<WireFrame, TransportError>> {
        loop {
            match self.inner.next().await {
                Some(Ok(Message::Binary(bytes))) => match WireFrame::from_bytes(&bytes) {
                    Ok(frame) => return Some(Ok(frame)),
                    Err(err) => {
                        // per-frame decode policy: discard, keep the session
                        warn!("discarding undecodable wire frame: {err}");
                        continue;
                    }
                },
                Some(Ok(Message::Close(_))) | None => return None,
                // pings/pongs are answered by the websocket stack
                Some(Ok(_)) => continue,
                Some(Err(err)) => {
                    return Some(Err(TransportError::Io {
                        detail: err.to_string(),
                    }))
                }
            }
        }
    }
}
