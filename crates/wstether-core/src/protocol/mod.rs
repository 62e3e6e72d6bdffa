//! Protocol primitives for the persistent gateway connection.
//!
//! - [`envelope`]: the `{op, s, t, d}` JSON wire envelope with lazy payloads.
//! - [`opcode`]: the closed opcode enumeration and its send/receive classes.
//! - [`control`]: typed control payloads and outbound envelope constructors.
//! - [`event`]: the dispatch event-name registry.
//! - [`intents`]: the intents flag set sent at identify time.
//! - [`close`]: the close-code policy table.
//!
//! All parsers are panic-free: malformed input is reported as
//! `ProtocolError` instead of panicking, keeping the client resilient to
//! anything the server sends.

pub mod close;
pub mod control;
pub mod envelope;
pub mod event;
pub mod intents;
pub mod opcode;

pub use close::{lookup, ClosePolicy};
pub use envelope::Envelope;
pub use event::{DispatchEvent, EventKind};
pub use intents::Intents;
pub use opcode::OpCode;
