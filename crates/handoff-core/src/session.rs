//! Pairing session identity and lifecycle
//!
//! A pairing session correlates the desktop listener and the mobile approver
//! through a single relay topic. The session id is generated client-side and
//! must be unguessable; nothing else about the session is shared.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unguessable correlation key for one pairing attempt
///
/// Backed by a v4 UUID (122 bits of entropy), which makes collisions across
/// concurrent sessions negligible without any coordination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a new random session id
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap an id received from the outside (e.g. a scanned QR payload)
    pub fn from_raw(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Coordinator-side status of one pairing attempt
///
/// Transitions are one-way: `Connecting -> Ready -> Approved`, with `Failed`
/// reachable from `Connecting` or `Ready`. `Approved` and `Failed` are
/// terminal; a retry means a brand-new session, never a resumed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PairingStatus {
    /// Transport connect in flight
    Connecting,
    /// Subscribed and waiting for the out-of-band approval
    Ready,
    /// Approval received and credentials persisted (terminal)
    Approved,
    /// Transport connect failed (terminal)
    Failed,
}

impl PairingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PairingStatus::Approved | PairingStatus::Failed)
    }
}

/// One login-handoff attempt, held only in the coordinator's memory
///
/// Never persisted and never reused: each retry creates a fresh session with
/// a fresh id. `created_at` exists for elapsed-time display only; this layer
/// enforces no TTL (expiry, if any, lives with the authorization service).
#[derive(Debug, Clone)]
pub struct PairingSession {
    pub session_id: SessionId,
    pub status: PairingStatus,
    pub created_at: DateTime<Utc>,
}

impl PairingSession {
    /// Start a new session in the `Connecting` state
    pub fn new() -> Self {
        Self {
            session_id: SessionId::generate(),
            status: PairingStatus::Connecting,
            created_at: Utc::now(),
        }
    }

    /// Seconds since this session was created, for UI display
    pub fn elapsed_seconds(&self) -> i64 {
        (Utc::now() - self.created_at).num_seconds().max(0)
    }
}

impl Default for PairingSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_session_ids_are_pairwise_distinct() {
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            assert!(seen.insert(SessionId::generate()));
        }
    }

    #[test]
    fn test_new_session_starts_connecting() {
        let session = PairingSession::new();
        assert_eq!(session.status, PairingStatus::Connecting);
        assert!(!session.status.is_terminal());
    }

    #[test]
    fn test_terminal_states() {
        assert!(PairingStatus::Approved.is_terminal());
        assert!(PairingStatus::Failed.is_terminal());
        assert!(!PairingStatus::Connecting.is_terminal());
        assert!(!PairingStatus::Ready.is_terminal());
    }
}
