//! Client config loader (strict parsing).
//!
//! YAML with unknown-field rejection, per-field defaults, and a `validate`
//! pass with hard range checks, so a typo'd tunable fails at startup rather
//! than at 3am during a reconnect storm.

use std::fs;

use serde::Deserialize;
use wstether_core::protocol::Intents;

use crate::error::{ClientError, Result};

/// Configuration for one connection instance (one shard).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Bearer token presented at identify/resume time.
    pub token: String,

    /// Gateway URL to connect to. Resume attempts prefer the URL the
    /// server announced in Ready.
    pub gateway_url: String,

    /// Intents bitmask sent at identify time.
    #[serde(default = "default_intents")]
    pub intents: Intents,

    /// Shard `[index, count]`, absent for unsharded connections.
    #[serde(default)]
    pub shard: Option<[u32; 2]>,

    /// Timeout waiting for Hello after the transport handshake.
    #[serde(default = "default_hello_timeout_ms")]
    pub hello_timeout_ms: u64,

    /// Base delay for exponential reconnect backoff.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Cap for the reconnect backoff.
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// Give up after this many consecutive failed connection attempts.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// A connection that stayed up at least this long counts as stable and
    /// resets the backoff.
    #[serde(default = "default_stable_grace_ms")]
    pub stable_grace_ms: u64,
}

impl ClientConfig {
    /// Config with defaults for everything but token and URL.
    pub fn new(token: impl Into<String>, gateway_url: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            gateway_url: gateway_url.into(),
            intents: default_intents(),
            shard: None,
            hello_timeout_ms: default_hello_timeout_ms(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            stable_grace_ms: default_stable_grace_ms(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.token.is_empty() {
            return Err(ClientError::Config("token must not be empty".into()));
        }
        if !self.gateway_url.starts_with("wss://") && !self.gateway_url.starts_with("ws://") {
            return Err(ClientError::Config(
                "gateway_url must be a ws:// or wss:// URL".into(),
            ));
        }
        if !(1000..=120_000).contains(&self.hello_timeout_ms) {
            return Err(ClientError::Config(
                "hello_timeout_ms must be between 1000 and 120000".into(),
            ));
        }
        if self.backoff_base_ms == 0 {
            return Err(ClientError::Config("backoff_base_ms must be > 0".into()));
        }
        if self.backoff_max_ms < self.backoff_base_ms {
            return Err(ClientError::Config(
                "backoff_max_ms must be >= backoff_base_ms".into(),
            ));
        }
        if self.max_reconnect_attempts == 0 {
            return Err(ClientError::Config(
                "max_reconnect_attempts must be > 0".into(),
            ));
        }
        if let Some([index, count]) = self.shard {
            if count == 0 || index >= count {
                return Err(ClientError::Config(
                    "shard index must be < shard count".into(),
                ));
            }
        }
        Ok(())
    }

    /// Shard as an `(index, count)` pair.
    pub fn shard_pair(&self) -> Option<(u32, u32)> {
        self.shard.map(|[index, count]| (index, count))
    }
}

pub fn load_from_file(path: &str) -> Result<ClientConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| ClientError::Config(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<ClientConfig> {
    let cfg: ClientConfig =
        serde_yaml::from_str(s).map_err(|e| ClientError::Config(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

fn default_intents() -> Intents {
    // Unprivileged baseline; MESSAGE_CONTENT and the presence/member flags
    // must be opted into explicitly.
    Intents::GUILDS | Intents::GUILD_MESSAGES | Intents::DIRECT_MESSAGES
}
fn default_hello_timeout_ms() -> u64 {
    30_000
}
fn default_backoff_base_ms() -> u64 {
    1000
}
fn default_backoff_max_ms() -> u64 {
    60_000
}
fn default_max_reconnect_attempts() -> u32 {
    u32::MAX
}
fn default_stable_grace_ms() -> u64 {
    30_000
}
