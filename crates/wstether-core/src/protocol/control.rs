//! Control payload shapes and outbound envelope constructors.
//!
//! Inbound control payloads (Hello, Ready, InvalidSession) get typed
//! deserialize structs; outbound control messages get one constructor per
//! sendable opcode so the connection loop never assembles JSON by hand.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::error::Result;
use crate::protocol::envelope::Envelope;
use crate::protocol::intents::Intents;
use crate::protocol::opcode::OpCode;

// ── Inbound payloads ─────────────────────────────────────────

/// Hello payload (`op=10`).
#[derive(Debug, Deserialize)]
pub struct Hello {
    /// Heartbeat interval in milliseconds.
    pub heartbeat_interval: u64,
}

/// Ready event data (`t="READY"`).
///
/// Only the fields the lifecycle needs are modelled; the rest of the event
/// stays in the raw payload handed to subscribers.
#[derive(Debug, Deserialize)]
pub struct Ready {
    /// Session ID for resuming.
    pub session_id: String,
    /// Preferred resume gateway URL, when the server announces one.
    #[serde(default)]
    pub resume_gateway_url: Option<String>,
}

// ── Outbound payloads ────────────────────────────────────────

/// Connection properties reported at identify time.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionProperties {
    pub os: &'static str,
    pub browser: &'static str,
    pub device: &'static str,
}

impl Default for ConnectionProperties {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS,
            browser: "wstether",
            device: "wstether",
        }
    }
}

#[derive(Serialize)]
struct Identify<'a> {
    token: &'a str,
    properties: ConnectionProperties,
    intents: Intents,
    #[serde(skip_serializing_if = "Option::is_none")]
    shard: Option<[u32; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence: Option<&'a RawValue>,
}

#[derive(Serialize)]
struct Resume<'a> {
    token: &'a str,
    session_id: &'a str,
    seq: u64,
}

/// Build an Identify envelope (`op=2`).
pub fn identify(
    token: &str,
    intents: Intents,
    shard: Option<(u32, u32)>,
    presence: Option<&RawValue>,
) -> Result<Envelope> {
    Envelope::control(
        OpCode::Identify,
        &Identify {
            token,
            properties: ConnectionProperties::default(),
            intents,
            shard: shard.map(|(index, count)| [index, count]),
            presence,
        },
    )
}

/// Build a Resume envelope (`op=6`).
pub fn resume(token: &str, session_id: &str, seq: u64) -> Result<Envelope> {
    Envelope::control(
        OpCode::Resume,
        &Resume {
            token,
            session_id,
            seq,
        },
    )
}

/// Build a Heartbeat envelope (`op=1`) carrying the last-seen sequence, or
/// null if none has been received yet.
pub fn heartbeat(seq: Option<u64>) -> Result<Envelope> {
    Envelope::control(OpCode::Heartbeat, &seq)
}

/// Build a PresenceUpdate envelope (`op=3`) from a caller-provided payload.
pub fn presence_update(payload: &RawValue) -> Result<Envelope> {
    Envelope::control(OpCode::PresenceUpdate, &payload)
}

/// Build a VoiceStateUpdate envelope (`op=4`) from a caller-provided payload.
pub fn voice_state_update(payload: &RawValue) -> Result<Envelope> {
    Envelope::control(OpCode::VoiceStateUpdate, &payload)
}

/// Build a RequestGuildMembers envelope (`op=8`) from a caller-provided
/// payload.
pub fn request_guild_members(payload: &RawValue) -> Result<Envelope> {
    Envelope::control(OpCode::RequestGuildMembers, &payload)
}
