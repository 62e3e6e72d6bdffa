//! Top-level facade crate for wsTether.
//!
//! Re-exports the protocol primitives and the client engine so users can
//! depend on a single crate.

pub mod protocol {
    pub use wstether_core::*;
}

pub mod client {
    pub use wstether_client::*;
}

pub use wstether_client::{
    ClientConfig, Connection, ConnectionHandle, ConnectionState, Dispatcher, Subscriber,
};
pub use wstether_core::protocol::{DispatchEvent, EventKind, Intents, OpCode};
