//! WebSocket transport implementation using `tokio-tungstenite`.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use crate::{Connection, ConnectionId, Endpoint, Transport, TransportError};

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// A WebSocket-based [`Transport`] that dials out to a listener URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;

    async fn open(
        &self,
        endpoint: &Endpoint,
    ) -> Result<Self::Connection, TransportError> {
        let Endpoint::Stream { url } = endpoint else {
            return Err(TransportError::InvalidEndpoint(format!(
                "websocket transport cannot open {endpoint}"
            )));
        };
        if !url.starts_with("ws://") {
            return Err(TransportError::InvalidEndpoint(format!(
                "{url}: only plain ws:// URLs are supported"
            )));
        }

        let (ws, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| {
                TransportError::Connect(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    e,
                ))
            })?;

        let id = ConnectionId::next();
        tracing::debug!(%id, %url, "WebSocket handshake complete");

        let (sink, stream) = ws.split();
        Ok(WebSocketConnection { id, sink, stream })
    }
}

/// A single outbound WebSocket connection.
///
/// The write and read halves are split so a send never waits on a
/// pending read.
pub struct WebSocketConnection {
    id: ConnectionId,
    sink: SplitSink<WsStream, Message>,
    stream: SplitStream<WsStream>,
}

impl Connection for WebSocketConnection {
    async fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let msg = match std::str::from_utf8(data) {
            Ok(text) => Message::Text(text.to_owned().into()),
            Err(_) => Message::Binary(data.to_vec().into()),
        };
        self.sink.send(msg).await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    async fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        // One frame is pulled per call; nothing is read ahead.
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(data.into()));
                }
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // ping/pong/frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
            }
        }
    }

    async fn close(&mut self, reason: &str) -> Result<(), TransportError> {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: reason.to_owned().into(),
        };
        self.sink
            .send(Message::Close(Some(frame)))
            .await
            .map_err(|e| {
                TransportError::SendFailed(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    e,
                ))
            })?;

        // Wait for the peer's close frame; the caller bounds this wait.
        while let Some(msg) = self.stream.next().await {
            match msg {
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => continue,
            }
        }
        tracing::debug!(id = %self.id, "WebSocket closed");
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
