//! Transport seam for the stream reader.
//!
//! A [`Transport`] opens one duplex channel to an address and yields the raw
//! frames the server pushes. The production implementation is
//! [`WebSocketTransport`]; tests plug in channel-backed transports.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use crate::error::StreamError;

/// A raw frame received from the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    /// The peer closed the channel.
    Close,
}

/// Stream of frames for one open channel. Ends when the channel drops.
pub type FrameStream = BoxStream<'static, Result<Frame, StreamError>>;

/// Opens channels to a server-pushed event source.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Opens a new channel. Each call is an independent connection attempt.
    async fn open(&self, address: &str) -> Result<FrameStream, StreamError>;
}

/// WebSocket transport backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Default)]
pub struct WebSocketTransport;

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(&self, address: &str) -> Result<FrameStream, StreamError> {
        let (ws, response) = connect_async(address)
            .await
            .map_err(|e| StreamError::Transport(e.to_string()))?;
        debug!("WebSocket handshake completed with status {}", response.status());

        let frames = ws.filter_map(|msg| async move {
            match msg {
                Ok(Message::Text(text)) => Some(Ok(Frame::Text(text))),
                Ok(Message::Binary(bytes)) => Some(Ok(Frame::Binary(bytes))),
                Ok(Message::Close(_)) => Some(Ok(Frame::Close)),
                // Ping/Pong are answered by tungstenite itself
                Ok(_) => None,
                Err(e) => Some(Err(StreamError::Transport(e.to_string()))),
            }
        });

        Ok(frames.boxed())
    }
}
