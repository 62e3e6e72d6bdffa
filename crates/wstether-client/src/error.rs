//! Error surface of the client engine.

use wstether_core::protocol::close::ClosePolicy;
use wstether_core::ProtocolError;

/// Shared result type.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors produced by the connection state machine.
///
/// Only terminal conditions escape [`crate::Connection::run`]; everything
/// transient is absorbed by the reconnect policy. Seeing one of these means
/// the client gave up.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Wire-level error from the codec.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// WebSocket transport error.
    #[error("websocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    /// The server closed the connection with a non-reconnectable code.
    #[error("fatal close {code}: {}", .policy.description)]
    FatalClose {
        /// The close code as received.
        code: u16,
        /// The policy verdict that made it terminal.
        policy: ClosePolicy,
    },

    /// The configured reconnect attempt ceiling was exceeded.
    #[error("gave up after {0} reconnect attempts")]
    RetriesExhausted(u32),

    /// The server never sent Hello after the transport handshake.
    #[error("timed out waiting for hello")]
    HelloTimeout,

    /// An outbound request was made while the session was not live.
    #[error("not connected")]
    NotConnected,

    /// Configuration rejected by validation.
    #[error("invalid config: {0}")]
    Config(String),

    /// An operation was requested on a connection that is shutting down.
    #[error("shutdown requested")]
    Shutdown,
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}
