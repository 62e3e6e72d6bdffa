//! The closed opcode enumeration.
//!
//! Value 5 is intentionally absent from the set: the protocol reserves it
//! and this client neither sends nor accepts it.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ProtocolError;

/// Gateway opcode.
///
/// Dispatch carries application events; everything else is connection
/// control. [`OpCode::is_receivable`] / [`OpCode::is_sendable`] give the
/// direction class of each opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    /// Application event (receive only).
    Dispatch = 0,
    /// Liveness pulse (bidirectional).
    Heartbeat = 1,
    /// Start a new session (send only).
    Identify = 2,
    /// Update client presence (send only).
    PresenceUpdate = 3,
    /// Join/leave/move voice (send only).
    VoiceStateUpdate = 4,
    /// Re-attach to an existing session (send only).
    Resume = 6,
    /// Server asks us to reconnect (receive only).
    Reconnect = 7,
    /// Request guild member chunks (send only).
    RequestGuildMembers = 8,
    /// The session is invalid; payload says whether it is resumable
    /// (receive only).
    InvalidSession = 9,
    /// First frame after connect; carries the heartbeat interval
    /// (receive only).
    Hello = 10,
    /// Acknowledges a heartbeat (receive only).
    HeartbeatAck = 11,
}

impl OpCode {
    /// Numeric wire value.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Opcodes the server may deliver to us.
    pub fn is_receivable(self) -> bool {
        matches!(
            self,
            OpCode::Dispatch
                | OpCode::Heartbeat
                | OpCode::Reconnect
                | OpCode::InvalidSession
                | OpCode::Hello
                | OpCode::HeartbeatAck
        )
    }

    /// Opcodes we may send to the server.
    pub fn is_sendable(self) -> bool {
        matches!(
            self,
            OpCode::Heartbeat
                | OpCode::Identify
                | OpCode::PresenceUpdate
                | OpCode::VoiceStateUpdate
                | OpCode::Resume
                | OpCode::RequestGuildMembers
        )
    }
}

impl TryFrom<u8> for OpCode {
    type Error = ProtocolError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        Ok(match v {
            0 => OpCode::Dispatch,
            1 => OpCode::Heartbeat,
            2 => OpCode::Identify,
            3 => OpCode::PresenceUpdate,
            4 => OpCode::VoiceStateUpdate,
            6 => OpCode::Resume,
            7 => OpCode::Reconnect,
            8 => OpCode::RequestGuildMembers,
            9 => OpCode::InvalidSession,
            10 => OpCode::Hello,
            11 => OpCode::HeartbeatAck,
            other => return Err(ProtocolError::UnknownOpCode(other)),
        })
    }
}

impl Serialize for OpCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for OpCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = u8::deserialize(deserializer)?;
        OpCode::try_from(v).map_err(D::Error::custom)
    }
}
