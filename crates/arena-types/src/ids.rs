//! Type-safe identifier wrappers.
//!
//! World-scoped entities (agents, items) use dense integer identifiers
//! assigned by the world at spawn time: agents are numbered from 0 at
//! init, item ids are strictly increasing for the lifetime of a world.
//! Session-scoped identifiers (spectators, thinking-history sessions)
//! use UUID v7 so they stay unique across reconnects without any
//! central counter.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_uuid_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_uuid_id! {
    /// Stable identifier for a connected spectator. Used as the vote
    /// `playerId`; one player has at most one pending vote per agent.
    PlayerId
}

define_uuid_id! {
    /// Identifier for one world lifetime. Thinking history is scoped to
    /// a session and cleared when the world is re-initialized.
    SessionId
}

/// Dense identifier for an agent, assigned sequentially at world init.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AgentId(pub u32);

impl core::fmt::Display for AgentId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "agent-{}", self.0)
    }
}

impl From<u32> for AgentId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Identifier for an item on the ground. Strictly increasing within a
/// world lifetime; never reused after loot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ItemId(pub u64);

impl core::fmt::Display for ItemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "item-{}", self.0)
    }
}

impl From<u64> for ItemId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn uuid_ids_are_unique() {
        let a = PlayerId::new();
        let b = PlayerId::new();
        assert_ne!(a, b);
        assert_ne!(a.into_inner(), Uuid::nil());
    }

    #[test]
    fn agent_id_roundtrip_serde() {
        let original = AgentId(7);
        let json = serde_json::to_string(&original).unwrap();
        assert_eq!(json, "7");
        let restored: AgentId = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn item_ids_order_by_value() {
        assert!(ItemId(1) < ItemId(2));
        assert_eq!(ItemId(3).to_string(), "item-3");
    }
}
