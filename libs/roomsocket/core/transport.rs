//! tokio-tungstenite implementation of the transport seam

use crate::traits::*;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::borrow::Cow;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

/// Opens real WebSocket connections
#[derive(Debug, Clone, Default)]
pub struct TungsteniteConnector;

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> std::result::Result<Box<dyn Transport>, ConnectionError> {
        let (stream, response) = connect_async(url)
            .await
            .map_err(|e| ConnectionError::Transport(e.to_string()))?;
        debug!(status = %response.status(), "WebSocket handshake complete");
        Ok(Box::new(TungsteniteTransport { stream }))
    }
}

pub struct TungsteniteTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for TungsteniteTransport {
    async fn send(&mut self, message: WsMessage) -> std::result::Result<(), ConnectionError> {
        self.stream
            .send(ws_message_to_tungstenite(message))
            .await
            .map_err(|e| ConnectionError::Transport(e.to_string()))
    }

    async fn next_event(&mut self) -> Option<std::result::Result<TransportEvent, ConnectionError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(TransportEvent::Message(WsMessage::Text(text)))),
                Ok(Message::Binary(data)) => return Some(Ok(TransportEvent::Message(WsMessage::Binary(data)))),
                Ok(Message::Close(frame)) => {
                    let (code, reason) = match frame {
                        Some(frame) => (Some(u16::from(frame.code)), frame.reason.into_owned()),
                        None => (None, String::new()),
                    };
                    return Some(Ok(TransportEvent::Closed { code, reason }));
                }
                // Pings are answered by tungstenite itself
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => continue,
                Err(e) => return Some(Err(ConnectionError::Transport(e.to_string()))),
            }
        }
    }

    async fn close(&mut self, code: u16, reason: &str) -> std::result::Result<(), ConnectionError> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: Cow::Owned(reason.to_string()),
        };
        self.stream
            .close(Some(frame))
            .await
            .map_err(|e| ConnectionError::Transport(e.to_string()))
    }
}

/// Convert WsMessage to tungstenite Message
fn ws_message_to_tungstenite(message: WsMessage) -> Message {
    match message {
        WsMessage::Text(text) => Message::Text(text),
        WsMessage::Binary(data) => Message::Binary(data),
    }
}
