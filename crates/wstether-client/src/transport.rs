//! Transport seam.
//!
//! The state machine talks to a duplex byte-frame stream through the
//! [`Transport`]/[`Connector`] traits and never opens sockets itself; the
//! default implementation rides tokio-tungstenite. Tests script the
//! protocol with an in-memory implementation.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::Result;

/// One inbound frame from the transport.
#[derive(Debug)]
pub enum Frame {
    /// Payload bytes of a complete message.
    Payload(Bytes),
    /// The peer closed the connection, with a close code if it sent one.
    Close(Option<u16>),
}

/// A connected duplex frame stream.
#[async_trait]
pub trait Transport: Send {
    /// Send one payload frame. Callers serialize: one writer at a time.
    async fn send(&mut self, payload: Bytes) -> Result<()>;

    /// Receive the next frame, suspending until one arrives.
    /// `None` means the stream ended without a close frame.
    async fn recv(&mut self) -> Result<Option<Frame>>;

    /// Close the transport. No frames may be sent afterwards.
    async fn close(&mut self) -> Result<()>;
}

/// Opens transports. One `connect` per physical connection attempt.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>>;
}

// ── tokio-tungstenite implementation ─────────────────────────

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport over tokio-tungstenite.
pub struct WsTransport {
    writer: SplitSink<WsStream, Message>,
    reader: SplitStream<WsStream>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, payload: Bytes) -> Result<()> {
        let text = String::from_utf8_lossy(&payload).into_owned();
        self.writer.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<Frame>> {
        loop {
            match self.reader.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(Frame::Payload(Bytes::from(text.into_bytes()))));
                }
                Some(Ok(Message::Binary(bin))) => {
                    return Ok(Some(Frame::Payload(Bytes::from(bin))));
                }
                Some(Ok(Message::Close(frame))) => {
                    let code = frame.as_ref().map(|f| u16::from(f.code));
                    return Ok(Some(Frame::Close(code)));
                }
                // Ping/pong are answered by tungstenite itself.
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(None),
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.writer.send(Message::Close(None)).await?;
        Ok(())
    }
}

/// Default connector: `wss://` via tokio-tungstenite.
#[derive(Debug, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>> {
        let (ws, _response) = connect_async(url).await?;
        let (writer, reader) = ws.split();
        Ok(Box::new(WsTransport { writer, reader }))
    }
}
