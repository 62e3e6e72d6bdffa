//! The wire envelope (JSON).
//!
//! Every message exchanged over the persistent connection is one envelope:
//! an integer `op`, an optional sequence `s`, an optional event name `t`,
//! and an opcode-dependent payload `d`. The payload is stored as `RawValue`
//! to enable lazy parsing: the connection loop inspects `op` first and only
//! then decides which schema (if any) to apply to `d`.
//!
//! Decoding is tolerant — `t`/`s` on a control envelope, or an unknown
//! event name, are not decode errors (forward compatibility with server
//! additions). Encoding validates the dispatch-class invariant, since we
//! author every outbound envelope ourselves.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::error::{ProtocolError, Result};
use crate::protocol::opcode::OpCode;

/// One wire envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope {
    /// Opcode for the payload.
    pub op: OpCode,
    /// Sequence number (dispatch envelopes only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,
    /// Event name (dispatch envelopes only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
    /// Payload, stored as raw JSON (lazy parsing).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<Box<RawValue>>,
}

impl Envelope {
    /// Build a control envelope (no sequence, no event name).
    pub fn control<T: Serialize>(op: OpCode, payload: &T) -> Result<Self> {
        let d = serde_json::value::to_raw_value(payload)
            .map_err(|e| ProtocolError::Encode(e.to_string()))?;
        Ok(Self {
            op,
            s: None,
            t: None,
            d: Some(d),
        })
    }

    /// Decode an envelope from raw bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| ProtocolError::Decode(e.to_string()))
    }

    /// Encode the envelope to bytes, enforcing the dispatch-class
    /// invariant: `t` and `s` are only valid on `op=0`.
    pub fn encode(&self) -> Result<Bytes> {
        if self.op != OpCode::Dispatch && (self.t.is_some() || self.s.is_some()) {
            return Err(ProtocolError::InvalidEnvelope(format!(
                "t/s not allowed on op {}",
                self.op.as_u8()
            )));
        }
        let v = serde_json::to_vec(self).map_err(|e| ProtocolError::Encode(e.to_string()))?;
        Ok(Bytes::from(v))
    }

    /// Parse the payload into a concrete shape.
    ///
    /// `what` names the expected payload in the error (e.g. `"hello"`).
    pub fn payload<T: DeserializeOwned>(&self, what: &'static str) -> Result<T> {
        let raw = self
            .d
            .as_deref()
            .ok_or_else(|| ProtocolError::MalformedPayload(what, "missing data".into()))?;
        serde_json::from_str(raw.get())
            .map_err(|e| ProtocolError::MalformedPayload(what, e.to_string()))
    }

    /// Event name of a dispatch envelope, empty for anything else.
    pub fn event_name(&self) -> &str {
        self.t.as_deref().unwrap_or("")
    }
}
