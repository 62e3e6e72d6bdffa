//! Shared error type across wsTether crates.

use thiserror::Error;

/// Shared result type.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Wire-level errors produced by the codec and the registries.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The envelope itself could not be parsed.
    #[error("decode failed: {0}")]
    Decode(String),
    /// The envelope could not be serialized.
    #[error("encode failed: {0}")]
    Encode(String),
    /// A numeric opcode outside the closed set.
    #[error("unknown opcode: {0}")]
    UnknownOpCode(u8),
    /// A known opcode carried a payload of the wrong shape.
    #[error("malformed {0} payload: {1}")]
    MalformedPayload(&'static str, String),
    /// The envelope violates an opcode-class invariant (e.g. an event name
    /// on a non-dispatch envelope being sent out).
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),
}
