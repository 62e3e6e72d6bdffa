//! Close-code policy table.
//!
//! A pure lookup from the numeric close reason to a resumability verdict.
//! The connection consults it exactly once per physical disconnect.
//!
//! Unknown codes deliberately map to the non-reconnectable default entry.
//! That is stricter than most undocumented codes require, but it is the
//! confirmed policy for this protocol; callers can tell the default apart
//! from an explicit verdict via [`ClosePolicy::is_default`].

/// Resumability verdict for a close code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosePolicy {
    /// The close code the verdict was looked up for (0 for the default
    /// entry).
    pub code: u16,
    /// Whether the client may reconnect after this close.
    pub reconnect: bool,
    /// Human-readable description.
    pub description: &'static str,
}

impl ClosePolicy {
    /// True when the code was not in the table and the default entry was
    /// returned.
    pub fn is_default(&self) -> bool {
        self.code == 0
    }
}

/// Named close codes with a fatal verdict.
pub mod code {
    /// Authentication failed — bad token.
    pub const AUTHENTICATION_FAILED: u16 = 4004;
    /// Invalid shard configuration.
    pub const INVALID_SHARD: u16 = 4010;
    /// Sharding is required for this connection.
    pub const SHARDING_REQUIRED: u16 = 4011;
    /// Invalid gateway version.
    pub const INVALID_API_VERSION: u16 = 4012;
    /// Invalid intents bitmask.
    pub const INVALID_INTENTS: u16 = 4013;
    /// Disallowed (privileged, not enabled) intents.
    pub const DISALLOWED_INTENTS: u16 = 4014;
    /// The session timed out; a resume is expected to work.
    pub const SESSION_TIMED_OUT: u16 = 4009;
}

const fn entry(code: u16, reconnect: bool, description: &'static str) -> ClosePolicy {
    ClosePolicy {
        code,
        reconnect,
        description,
    }
}

/// Look up the policy for a close code.
///
/// Total: codes outside the table return the default non-reconnectable
/// entry and never panic.
pub fn lookup(code: u16) -> ClosePolicy {
    match code {
        4000 => entry(4000, true, "unknown error"),
        4001 => entry(4001, true, "unknown opcode"),
        4002 => entry(4002, true, "decode error"),
        4003 => entry(4003, true, "not authenticated"),
        4004 => entry(4004, false, "authentication failed"),
        4005 => entry(4005, true, "already authenticated"),
        4007 => entry(4007, true, "invalid sequence"),
        4008 => entry(4008, true, "rate limited"),
        4009 => entry(4009, true, "session timed out"),
        4010 => entry(4010, false, "invalid shard"),
        4011 => entry(4011, false, "sharding required"),
        4012 => entry(4012, false, "invalid API version"),
        4013 => entry(4013, false, "invalid intents"),
        4014 => entry(4014, false, "disallowed intents"),
        _ => entry(0, false, "unknown close code"),
    }
}
