//! Per-connection session state.
//!
//! Every client connection owns one [`SessionContext`]. It starts logged
//! out; a successful login stores the presence claim, and the role guards
//! read it back before any action touches the store.

use std::fmt;

use playhub_protocol::{Credentials, Role};

use crate::{Authenticator, Presence, PresenceGuard, SessionError};

/// An authenticated account: role plus username.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    pub role: Role,
    pub username: String,
}

impl Identity {
    pub fn new(role: Role, username: impl Into<String>) -> Self {
        Self {
            role,
            username: username.into(),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.role, self.username)
    }
}

/// Login state of one connection.
#[derive(Debug, Default)]
pub struct SessionContext {
    claim: Option<PresenceGuard>,
}

impl SessionContext {
    /// A logged-out context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Who is logged in, if anyone.
    pub fn identity(&self) -> Option<&Identity> {
        self.claim.as_ref().map(PresenceGuard::identity)
    }

    pub fn is_logged_in(&self) -> bool {
        self.claim.is_some()
    }

    /// Checks credentials and claims presence for this connection.
    ///
    /// Logging in again as the same account keeps the existing claim. A
    /// different account replaces it only once its own claim succeeds, so
    /// a failed login leaves the current session in place.
    ///
    /// # Errors
    /// - [`SessionError::AuthFailed`] for bad credentials
    /// - [`SessionError::AlreadyLoggedIn`] if another connection holds
    ///   the account
    pub async fn login<A: Authenticator>(
        &mut self,
        auth: &A,
        presence: &Presence,
        creds: &Credentials,
    ) -> Result<&Identity, SessionError> {
        let identity = auth.authenticate(creds).await?;
        if self.identity() != Some(&identity) {
            let guard = presence.claim(identity)?;
            self.claim = Some(guard);
        }
        self.identity().ok_or(SessionError::NotLoggedIn)
    }

    /// Releases the presence claim. Returns who was logged in.
    pub fn logout(&mut self) -> Option<Identity> {
        self.claim.take().map(|guard| guard.identity().clone())
    }

    /// Returns the identity if it is logged in as `role`.
    ///
    /// # Errors
    /// [`SessionError::NotLoggedIn`] or [`SessionError::WrongRole`].
    pub fn require(&self, role: Role) -> Result<&Identity, SessionError> {
        match self.identity() {
            None => Err(SessionError::NotLoggedIn),
            Some(identity) if identity.role != role => {
                Err(SessionError::WrongRole { required: role })
            }
            Some(identity) => Ok(identity),
        }
    }

    /// Username of the logged-in publisher.
    pub fn require_publisher(&self) -> Result<&str, SessionError> {
        self.require(Role::Publisher).map(|i| i.username.as_str())
    }

    /// Username of the logged-in consumer.
    pub fn require_consumer(&self) -> Result<&str, SessionError> {
        self.require(Role::Consumer).map(|i| i.username.as_str())
    }
}
