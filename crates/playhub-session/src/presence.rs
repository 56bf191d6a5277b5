//! The presence set: which accounts currently hold a live connection.
//!
//! An account may be logged in on at most one connection. A successful
//! claim returns a [`PresenceGuard`]; dropping the guard (logout, a second
//! login, or the connection task ending for any reason) releases the claim.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{Identity, SessionError};

/// Shared handle to the presence set. Cloning shares the same set.
#[derive(Debug, Clone, Default)]
pub struct Presence {
    online: Arc<Mutex<HashSet<Identity>>>,
}

impl Presence {
    /// Creates an empty presence set.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<Identity>> {
        // A panic while holding the lock can't leave the set half-updated.
        self.online.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks `identity` as online.
    ///
    /// # Errors
    /// [`SessionError::AlreadyLoggedIn`] if another connection holds it.
    pub fn claim(&self, identity: Identity) -> Result<PresenceGuard, SessionError> {
        if !self.lock().insert(identity.clone()) {
            return Err(SessionError::AlreadyLoggedIn(identity.username));
        }
        tracing::info!(%identity, "logged in");
        Ok(PresenceGuard {
            presence: self.clone(),
            identity,
        })
    }

    /// Returns `true` if `identity` holds a live claim.
    pub fn contains(&self, identity: &Identity) -> bool {
        self.lock().contains(identity)
    }

    /// Number of accounts online.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if nobody is online.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// A live presence claim. Released on drop.
#[derive(Debug)]
pub struct PresenceGuard {
    presence: Presence,
    identity: Identity,
}

impl PresenceGuard {
    /// Who holds this claim.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }
}

impl Drop for PresenceGuard {
    fn drop(&mut self) {
        self.presence.lock().remove(&self.identity);
        tracing::info!(identity = %self.identity, "logged out");
    }
}

#[cfg(test)]
mod tests {
    use playhub_protocol::Role;

    use super::*;

    fn consumer(name: &str) -> Identity {
        Identity::new(Role::Consumer, name)
    }

    #[test]
    fn test_second_claim_rejected_while_first_held() {
        let presence = Presence::new();
        let first = presence.claim(consumer("alice")).unwrap();

        let second = presence.claim(consumer("alice"));
        assert!(matches!(second, Err(SessionError::AlreadyLoggedIn(u)) if u == "alice"));

        drop(first);
        assert!(presence.claim(consumer("alice")).is_ok());
    }

    #[test]
    fn test_roles_are_separate_accounts() {
        let presence = Presence::new();
        let _c = presence.claim(consumer("sam")).unwrap();
        let _p = presence.claim(Identity::new(Role::Publisher, "sam")).unwrap();
        assert_eq!(presence.len(), 2);
    }

    #[test]
    fn test_drop_releases() {
        let presence = Presence::new();
        {
            let guard = presence.claim(consumer("bob")).unwrap();
            assert_eq!(guard.identity().username, "bob");
            assert!(presence.contains(&consumer("bob")));
        }
        assert!(presence.is_empty());
    }

    #[test]
    fn test_clones_share_the_set() {
        let presence = Presence::new();
        let other = presence.clone();
        let _g = presence.claim(consumer("carol")).unwrap();
        assert!(other.claim(consumer("carol")).is_err());
    }
}
