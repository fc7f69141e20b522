//! Credentials and the per-connection session record.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use bankroll_protocol::{PlayerId, RoomCode};
use bankroll_transport::ConnectionId;
use rand::Rng;

/// Process-wide player id counter. Ids are never reused.
static NEXT_PLAYER_ID: AtomicU64 = AtomicU64::new(1);

// ---------------------------------------------------------------------------
// SessionSecret
// ---------------------------------------------------------------------------

/// The credential that proves a client owns a [`PlayerId`].
///
/// 128 random bits as 32 lowercase hex characters. It is sent once, in the
/// create/join reply to the owning connection, and never appears in a
/// snapshot or event. `Debug` is redacted so it can't leak into logs.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionSecret(String);

impl SessionSecret {
    /// Generates a fresh random secret.
    pub fn generate() -> Self {
        let bytes: [u8; 16] = rand::rng().random();
        Self(bytes.iter().map(|b| format!("{b:02x}")).collect())
    }

    /// The secret as sent to the client.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Checks a client-supplied secret against this one.
    ///
    /// Runs in time independent of where the first mismatch is.
    pub fn verify(&self, candidate: &str) -> bool {
        let ours = self.0.as_bytes();
        let theirs = candidate.as_bytes();
        if ours.len() != theirs.len() {
            return false;
        }
        ours.iter().zip(theirs).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
    }
}

impl fmt::Debug for SessionSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionSecret(..)")
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// A freshly issued identity.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub player_id: PlayerId,
    pub secret: SessionSecret,
}

/// Issues a new `(PlayerId, SessionSecret)` pair.
///
/// Ids come from a process-wide counter, so they are unique across rooms.
pub fn issue_credentials() -> Credentials {
    let player_id = PlayerId(NEXT_PLAYER_ID.fetch_add(1, Ordering::Relaxed));
    tracing::trace!(%player_id, "issued credentials");
    Credentials {
        player_id,
        secret: SessionSecret::generate(),
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One live binding: this connection speaks for this player in this room.
#[derive(Debug, Clone)]
pub struct Session {
    pub connection: ConnectionId,
    pub room: RoomCode,
    pub player_id: PlayerId,
    /// When the binding was made. Used for logging how long a socket lived.
    pub bound_at: Instant,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_credentials_unique_ids_and_secrets() {
        let a = issue_credentials();
        let b = issue_credentials();

        assert_ne!(a.player_id, b.player_id);
        assert_ne!(a.secret, b.secret);
        assert_eq!(a.secret.as_str().len(), 32);
        assert!(a.secret.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_verify_accepts_exact_secret() {
        let secret = SessionSecret::generate();
        let copy = secret.as_str().to_owned();
        assert!(secret.verify(&copy));
    }

    #[test]
    fn test_verify_rejects_wrong_or_truncated_secret() {
        let secret = SessionSecret::generate();
        let mut wrong = secret.as_str().to_owned();
        let last = if wrong.ends_with('0') { '1' } else { '0' };
        wrong.pop();
        wrong.push(last);

        assert!(!secret.verify(&wrong));
        assert!(!secret.verify(&secret.as_str()[..31]));
        assert!(!secret.verify(""));
    }

    #[test]
    fn test_debug_does_not_print_secret() {
        let secret = SessionSecret::generate();
        let printed = format!("{secret:?}");
        assert!(!printed.contains(secret.as_str()));
    }
}
