//! wsTether core: transport-agnostic protocol primitives and error types.
//!
//! This crate defines the wire envelope, the opcode set, the dispatch event
//! registry, the intents flag set, and the close-code policy table shared by
//! the client engine and by embedding applications. It intentionally carries
//! no transport or runtime dependencies so it can be reused in multiple
//! contexts (tests script the protocol against it directly).
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths must surface as `ProtocolError`/`Result` so a single
//! malformed frame from the server never takes the process down.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{ProtocolError, Result};
