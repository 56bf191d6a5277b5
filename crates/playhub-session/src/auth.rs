//! Account registration and credential checks.
//!
//! The session layer doesn't know where accounts live. The orchestrator
//! implements [`Authenticator`] on top of the persistence engine; tests
//! use an in-memory map.

use playhub_protocol::{Account, Credentials};

use crate::{Identity, SessionError};

/// Creates accounts and verifies credentials.
///
/// Passwords are compared for plain equality.
///
/// # Example
///
/// ```rust
/// use std::collections::HashMap;
/// use std::sync::Mutex;
///
/// use playhub_protocol::{Account, Credentials};
/// use playhub_session::{Authenticator, Identity, SessionError};
///
/// #[derive(Default)]
/// struct MemoryAccounts(Mutex<HashMap<(String, String), String>>);
///
/// impl Authenticator for MemoryAccounts {
///     async fn register(&self, creds: &Credentials) -> Result<Account, SessionError> {
///         let mut map = self.0.lock().unwrap();
///         let key = (creds.role.to_string(), creds.username.clone());
///         if map.contains_key(&key) {
///             return Err(SessionError::UsernameTaken(creds.username.clone()));
///         }
///         map.insert(key, creds.password.clone());
///         Ok(Account {
///             id: map.len().to_string(),
///             username: creds.username.clone(),
///             password: creds.password.clone(),
///             role: creds.role,
///         })
///     }
///
///     async fn authenticate(&self, creds: &Credentials) -> Result<Identity, SessionError> {
///         let map = self.0.lock().unwrap();
///         match map.get(&(creds.role.to_string(), creds.username.clone())) {
///             Some(p) if *p == creds.password => Ok(Identity::new(creds.role, &creds.username)),
///             _ => Err(SessionError::AuthFailed),
///         }
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Creates an account.
    ///
    /// # Errors
    /// [`SessionError::UsernameTaken`] if the role collection already holds
    /// the username.
    fn register(
        &self,
        creds: &Credentials,
    ) -> impl std::future::Future<Output = Result<Account, SessionError>> + Send;

    /// Checks credentials and returns who they belong to.
    ///
    /// # Errors
    /// [`SessionError::AuthFailed`] for an unknown user or wrong password.
    fn authenticate(
        &self,
        creds: &Credentials,
    ) -> impl std::future::Future<Output = Result<Identity, SessionError>> + Send;
}
