//! Core domain types for Arbiter.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the engine, and from clients that
//! need to speak the wire tag grammar.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod tag;
pub use tag::{CorrelationTag, TagError, sync_tag};

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Identity
// ============================================================================

/// Stable identity of a seat, keyed by account name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn new(account: impl Into<String>) -> Self {
        Self(account.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Identity of one running match, assigned by the lobby.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(u64);

impl GameId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Completion policy
// ============================================================================

/// Completion rule for a multi-participant prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Policy {
    /// Exactly one participant; the bare result is returned.
    Single,
    /// Wait for every participant (or the deadline).
    All,
    /// Stop at the first non-empty result.
    Any,
}

impl Policy {
    /// Marker embedded in correlation tags: `''`, `'&'` or `'|'`.
    #[must_use]
    pub const fn marker(self) -> &'static str {
        match self {
            Self::Single => "",
            Self::All => "&",
            Self::Any => "|",
        }
    }

    #[must_use]
    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            "" => Some(Self::Single),
            "&" => Some(Self::All),
            "|" => Some(Self::Any),
            _ => None,
        }
    }

    /// Whether finished units are flushed as they arrive rather than at loop exit.
    #[must_use]
    pub const fn flushes_eagerly(self) -> bool {
        !matches!(self, Self::Any)
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Single => "single",
            Self::All => "all",
            Self::Any => "any",
        })
    }
}

// ============================================================================
// Presence
// ============================================================================

/// Externally visible seat state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    /// Connected and playing. Synthetic seats are always in this state.
    InGame,
    /// Connection is gone but the seat may still reconnect.
    Disconnected,
    /// Dropped out of the match.
    Dropped,
    /// Dropped out and explicitly left.
    Fled,
}

impl Presence {
    #[must_use]
    pub const fn is_present(self) -> bool {
        matches!(self, Self::InGame)
    }
}

/// Serializable `{account, state}` view of a seat, as reported to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantSnapshot {
    pub account: ParticipantId,
    pub state: Presence,
}
