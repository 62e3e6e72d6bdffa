//! The intents flag set sent at identify time.
//!
//! Each bit gates a disjoint group of dispatch event kinds the server will
//! deliver. Bits 17–19 are reserved and never set by this client. The raw
//! integer only appears at the serde boundary; everything else goes through
//! the named flags and set operations.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A set of gateway intents backed by a bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Intents(u64);

macro_rules! intents {
    ($($(#[$doc:meta])* $name:ident = $bit:expr;)*) => {
        impl Intents {
            $(
                $(#[$doc])*
                pub const $name: Intents = Intents(1 << $bit);
            )*

            /// Every flag this client knows about.
            pub const ALL: Intents = Intents($((1 << $bit))|*);
        }
    };
}

intents! {
    GUILDS = 0;
    GUILD_MEMBERS = 1;
    GUILD_MODERATION = 2;
    GUILD_EXPRESSIONS = 3;
    GUILD_INTEGRATIONS = 4;
    GUILD_WEBHOOKS = 5;
    GUILD_INVITES = 6;
    GUILD_VOICE_STATES = 7;
    GUILD_PRESENCES = 8;
    GUILD_MESSAGES = 9;
    GUILD_MESSAGE_REACTIONS = 10;
    GUILD_MESSAGE_TYPING = 11;
    DIRECT_MESSAGES = 12;
    DIRECT_MESSAGE_REACTIONS = 13;
    DIRECT_MESSAGE_TYPING = 14;
    MESSAGE_CONTENT = 15;
    GUILD_SCHEDULED_EVENTS = 16;
    AUTO_MODERATION_CONFIGURATION = 20;
    AUTO_MODERATION_EXECUTION = 21;
}

impl Intents {
    /// The empty set.
    pub const fn none() -> Self {
        Intents(0)
    }

    /// Raw bitmask (wire representation).
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Build from a raw bitmask, keeping only known bits.
    pub const fn from_bits_truncate(bits: u64) -> Self {
        Intents(bits & Self::ALL.0)
    }

    /// True if every flag in `other` is present in `self`.
    pub const fn contains(self, other: Intents) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set union.
    pub const fn union(self, other: Intents) -> Self {
        Intents(self.0 | other.0)
    }

    /// Set intersection.
    pub const fn intersection(self, other: Intents) -> Self {
        Intents(self.0 & other.0)
    }

    /// True if no flags are set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Intents {
    type Output = Intents;
    fn bitor(self, rhs: Intents) -> Intents {
        self.union(rhs)
    }
}

impl BitOrAssign for Intents {
    fn bitor_assign(&mut self, rhs: Intents) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Intents {
    type Output = Intents;
    fn bitand(self, rhs: Intents) -> Intents {
        self.intersection(rhs)
    }
}

impl fmt::Display for Intents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl Serialize for Intents {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.0)
    }
}

impl<'de> Deserialize<'de> for Intents {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Intents(u64::deserialize(deserializer)?))
    }
}
