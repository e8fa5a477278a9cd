//! WebSocket link.
//!
//! Text frames in both directions. A reader task drains the socket into a
//! channel so that [`Link::recv`] stays cancel safe.

use async_trait::async_trait;
use distlock_core::{Link, LinkEvent, TransportError, TransportKind};
use futures::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use tokio::{net::TcpStream, sync::mpsc, task::JoinHandle};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite::Message};
use url::Url;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Inbound events buffered between the reader task and `recv`.
const INBOUND_CAPACITY: usize = 64;

/// Established WebSocket link.
pub struct WebSocketLink {
    sink: SplitSink<Socket, Message>,
    inbound: mpsc::Receiver<LinkEvent>,
    reader: JoinHandle<()>,
    closed: bool,
}

impl WebSocketLink {
    /// Perform the WebSocket handshake against `url`.
    ///
    /// # Errors
    ///
    /// `Unavailable` if the TCP connection or the upgrade fails.
    pub async fn connect(url: &Url) -> Result<Self, TransportError> {
        tracing::debug!(%url, "websocket handshake");

        let (socket, response) =
            tokio_tungstenite::connect_async(url.as_str()).await.map_err(|e| {
                TransportError::Unavailable {
                    transport: TransportKind::WebSocket,
                    reason: e.to_string(),
                }
            })?;
        tracing::debug!(status = %response.status(), "websocket upgraded");

        let (sink, source) = socket.split();
        let (tx, inbound) = mpsc::channel(INBOUND_CAPACITY);
        let reader = tokio::spawn(read_loop(source, tx));

        Ok(Self { sink, inbound, reader, closed: false })
    }
}

async fn read_loop(mut source: SplitStream<Socket>, tx: mpsc::Sender<LinkEvent>) {
    while let Some(message) = source.next().await {
        let event = match message {
            Ok(Message::Text(text)) => LinkEvent::Frame(text),
            Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                Ok(text) => LinkEvent::Frame(text),
                Err(e) => {
                    tracing::warn!(error = %e, "dropping non-utf8 binary frame");
                    continue;
                },
            },
            Ok(Message::Close(frame)) => {
                tracing::debug!(?frame, "websocket closed by peer");
                let _ = tx.send(LinkEvent::Closed).await;
                return;
            },
            Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => continue,
            Err(e) => {
                let _ = tx.send(LinkEvent::Lost(e.to_string())).await;
                return;
            },
        };

        if tx.send(event).await.is_err() {
            return;
        }
    }

    let _ = tx.send(LinkEvent::Lost("websocket stream ended".to_string())).await;
}

#[async_trait]
impl Link for WebSocketLink {
    async fn send(&mut self, raw: String) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.sink
            .send(Message::Text(raw))
            .await
            .map_err(|e| TransportError::Send { reason: e.to_string() })
    }

    async fn recv(&mut self) -> Option<LinkEvent> {
        self.inbound.recv().await
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Err(e) = self.sink.send(Message::Close(None)).await {
            tracing::debug!(error = %e, "close frame not sent");
        }
        let _ = self.sink.close().await;
        self.reader.abort();
    }
}

impl Drop for WebSocketLink {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
