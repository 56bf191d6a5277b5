//! Connection sessions for playhub.
//!
//! This crate answers "who is on this connection, and may they do this?":
//!
//! 1. **Authentication**: checking credentials ([`Authenticator`] trait)
//! 2. **Presence**: one live connection per account ([`Presence`])
//! 3. **Authorization**: role guards on the per-connection
//!    [`SessionContext`]
//!
//! ```text
//! Orchestrator (above)  ← one SessionContext per client connection
//!     ↕
//! Session Layer (this crate)
//!     ↕
//! Protocol Layer (below)  ← Role, Credentials, Account
//! ```

#![allow(async_fn_in_trait)]

mod auth;
mod error;
mod presence;
mod session;

pub use auth::Authenticator;
pub use error::SessionError;
pub use presence::{Presence, PresenceGuard};
pub use session::{Identity, SessionContext};
