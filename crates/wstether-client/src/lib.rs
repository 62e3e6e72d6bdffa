//! wsTether client engine.
//!
//! This crate wires the transport, session state, heartbeat driver, and
//! subscriber dispatch into the connection state machine that keeps one
//! logical session alive across any number of physical connections. It is
//! intended to be consumed through the `wstether` facade crate and by
//! integration tests.
//!
//! One [`connection::Connection`] owns one logical session. Shards are
//! independent instances sharing only the read-only event registry and the
//! close-code table from `wstether-core`.

pub mod backoff;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod heartbeat;
pub mod session;
pub mod transport;

pub use config::ClientConfig;
pub use connection::{Connection, ConnectionHandle, ConnectionState};
pub use dispatch::{Dispatcher, Subscriber};
pub use error::{ClientError, Result};
pub use transport::{Connector, Frame, Transport, WsConnector};
