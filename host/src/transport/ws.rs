//! Websocket acceptor serving the sync protocol at `/ws`, with a static
//! device-metadata document at `/info`.
//!
//! Plain HTTP requests and websocket upgrades arrive on the same listener,
//! so the request head is read once to route on the path; for `/ws` the
//! buffered bytes are replayed into the websocket handshake.

use std::{
    io,
    pin::Pin,
    task::{Context, Poll},
};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use log::{info, warn};
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncReadExt, AsyncWriteExt, ReadBuf},
    net::{TcpListener, TcpStream},
};
use tokio_tungstenite::{
    accept_async,
    tungstenite::Message,
    WebSocketStream,
};

use daqlink_shared::{
    transport::{FrameSink, FrameStream, Transport, TransportSession},
    TransportError, WireFrame,
};

const MAX_REQUEST_HEAD: usize = 8 * 1024;

/// Accepts one protocol session at a time on a bound TCP listener.
///
/// `/info` is answered from the accept loop inside `open()`, so it is only
/// reachable while a session is being waited for. Once a websocket session
/// is established the listener sits idle until the connection reopens the
/// transport; `/info` requests made mid-session are not accepted.
pub struct WsServerTransport {
    listener: TcpListener,
    info_document: String,
}

impl WsServerTransport {
    /// Binds to `addr` and serves `info` (device metadata) at `/info`.
    pub async fn bind(addr: &str, info: serde_json::Value) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|err| TransportError::OpenFailed {
                detail: err.to_string(),
            })?;
        Ok(Self {
            listener,
            info_document: info.to_string(),
        })
    }

    pub fn local_addr(&self) -> Result<std::net::SocketAddr, TransportError> {
        self.listener
            .local_addr()
            .map_err(|err| TransportError::Io {
                detail: err.to_string(),
            })
    }
}

#[async_trait]
impl Transport for WsServerTransport {
    async fn open(&self) -> Result<TransportSession, TransportError> {
        loop {
            let (mut stream, peer) =
                self.listener
                    .accept()
                    .await
                    .map_err(|err| TransportError::OpenFailed {
                        detail: err.to_string(),
                    })?;

            let head = match read_request_head(&mut stream).await {
                Ok(head) => head,
                Err(err) => {
                    warn!("failed to read request head from {peer}: {err}");
                    continue;
                }
            };

            match request_path(&head).as_deref() {
                Some("/info") => {
                    let _ = write_http_response(
                        &mut stream,
                        "200 OK",
                        "application/json",
                        &self.info_document,
                    )
                    .await;
                    continue;
                }
                Some(path) if path == "/ws" || path.starts_with("/ws?") => {
                    let rewound = Rewound {
                        head,
                        pos: 0,
                        inner: stream,
                    };
                    match accept_async(rewound).await {
                        Ok(ws) => {
                            info!("websocket session established with {peer}");
                            let (sink, stream) = ws.split();
                            return Ok(TransportSession {
                                sink: Box::new(WsFrameSink { inner: sink }),
                                stream: Box::new(WsFrameStream { inner: stream }),
                            });
                        }
                        Err(err) => {
                            warn!("websocket handshake with {peer} failed: {err}");
                            continue;
                        }
                    }
                }
                other => {
                    warn!("request for unknown path {other:?} from {peer}");
                    let _ = write_http_response(
                        &mut stream,
                        "404 Not Found",
                        "text/plain",
                        "not found",
                    )
                    .await;
                    continue;
                }
            }
        }
    }
}

async fn read_request_head(stream: &mut TcpStream) -> io::Result<Vec<u8>> {
    let mut head = Vec::with_capacity(1024);
    let mut chunk = [0u8; 512];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before request head",
            ));
        }
        head.extend_from_slice(&chunk[..n]);
        if head.windows(4).any(|w| w == b"\r\n\r\n") {
            return Ok(head);
        }
        if head.len() > MAX_REQUEST_HEAD {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "request head too large",
            ));
        }
    }
}

fn request_path(head: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(head);
    let request_line = text.lines().next()?;
    request_line.split_whitespace().nth(1).map(str::to_string)
}

async fn write_http_response(
    stream: &mut TcpStream,
    status: &str,
    content_type: &str,
    body: &str,
) -> io::Result<()> {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

// replays the already-read request head bytes, then the live socket
struct Rewound<S> {
    head: Vec<u8>,
    pos: usize,
    inner: S,
}

impl<S: AsyncRead + Unpin> AsyncRead for Rewound<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.pos < this.head.len() {
            let n = buf.remaining().min(this.head.len() - this.pos);
            buf.put_slice(&this.head[this.pos..this.pos + n]);
            this.pos += n;
            return Poll::Ready(Ok(()));
        }
        Pin::new(&mut this.inner).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for Rewound<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

struct WsFrameSink {
    inner: futures_util::stream::SplitSink<WebSocketStream<Rewound<TcpStream>>, Message>,
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
    inner: futures_util::stream::SplitStream<WebSocketStream<Rewound<TcpStream>>>,
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
