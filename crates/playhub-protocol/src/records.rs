//! Durable record types and the collections they live in.
//!
//! Every record carries a store-assigned `id`. When a record is sent to
//! the store for creation the `id` is left empty and skipped, and the
//! store fills it in.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Collection names used by the persistence engine.
pub mod collections {
    /// Publisher accounts.
    pub const PUBLISHERS: &str = "publishers";
    /// Consumer accounts.
    pub const CONSUMERS: &str = "consumers";
    /// Published artifacts.
    pub const ARTIFACTS: &str = "artifacts";
    /// Consumer ↔ artifact ownership records.
    pub const OWNERSHIPS: &str = "ownerships";
    /// Consumer reviews of artifacts.
    pub const REVIEWS: &str = "reviews";

    /// Collections the store creates on startup.
    pub const REQUIRED: [&str; 5] = [PUBLISHERS, CONSUMERS, ARTIFACTS, OWNERSHIPS, REVIEWS];
}

/// The two account roles.
///
/// Older clients say `developer` / `player`; both spellings are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(alias = "developer")]
    Publisher,
    #[serde(alias = "player")]
    Consumer,
}

impl Role {
    /// The collection holding accounts of this role.
    pub fn collection(self) -> &'static str {
        match self {
            Self::Publisher => collections::PUBLISHERS,
            Self::Consumer => collections::CONSUMERS,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Publisher => write!(f, "publisher"),
            Self::Consumer => write!(f, "consumer"),
        }
    }
}

fn is_blank(id: &str) -> bool {
    id.is_empty()
}

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    #[serde(default, skip_serializing_if = "is_blank")]
    pub id: String,
    pub username: String,
    pub password: String,
    pub role: Role,
}

/// A published, versioned artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(default, skip_serializing_if = "is_blank")]
    pub id: String,
    pub owner: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub version: String,
    pub max_participants: u32,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub deleted: bool,
}

/// Which artifact version a consumer holds, and whether they have finished
/// a room session with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipRecord {
    #[serde(default, skip_serializing_if = "is_blank")]
    pub id: String,
    pub consumer: String,
    pub artifact_id: String,
    pub version: String,
    #[serde(default)]
    pub has_session_completed: bool,
}

/// A consumer's score and comment for an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    #[serde(default, skip_serializing_if = "is_blank")]
    pub id: String,
    pub artifact_id: String,
    pub consumer: String,
    pub score: u8,
    #[serde(default)]
    pub comment: String,
}

/// Result of `artifact_detail`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDetail {
    pub artifact: Artifact,
    pub reviews: Vec<Review>,
}
