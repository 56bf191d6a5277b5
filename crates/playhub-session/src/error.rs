//! Error types for the session layer.

use playhub_protocol::Role;

/// Errors that can occur while authenticating or authorizing a connection.
///
/// All of these are answered with an error response; none of them closes
/// the connection.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Unknown username or wrong password.
    #[error("Invalid credentials")]
    AuthFailed,

    /// Registration with a username already present in the role collection.
    #[error("Username already exists")]
    UsernameTaken(String),

    /// The account already holds a live connection.
    #[error("User already logged in elsewhere")]
    AlreadyLoggedIn(String),

    /// The action needs a logged-in session.
    #[error("Auth required")]
    NotLoggedIn,

    /// The session is logged in under the other role.
    #[error("Auth required: {required} only")]
    WrongRole { required: Role },

    /// The account backend could not be reached or failed.
    #[error("account backend failed: {0}")]
    Backend(String),
}

impl SessionError {
    /// Returns `true` for failures of the backing store rather than of the
    /// caller's credentials or session.
    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Backend(_))
    }
}
