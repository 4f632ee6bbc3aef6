//! Basic type definitions for the hub
//!
//! Provides newtype wrappers for type safety:
//! - `UserId`: authenticated external user identity
//! - `ConnectionId`: UUID-based identifier of one transport session

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Authenticated user identity (newtype pattern)
///
/// Stable across reconnects of the same user. `UserId::ANONYMOUS` (0) is
/// never a valid identity; it is what random-chat frames carry in `from`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl UserId {
    /// Placeholder identity used to anonymize random-chat senders
    pub const ANONYMOUS: UserId = UserId(0);

    /// Parse a user id, rejecting non-numeric and non-positive values
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().parse::<i64>() {
            Ok(id) if id > 0 => Some(Self(id)),
            _ => None,
        }
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier of a single transport session
///
/// A user that reconnects gets a new `ConnectionId`; the hub uses it to tell
/// events of the live connection apart from leftovers of a superseded one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
