//! # Playhub
//!
//! Session orchestrator for publishers, consumers, and relayed rooms.
//!
//! Clients speak length-prefixed JSON frames (`{action, data}` in,
//! `{status, ...}` out). Durable records live in the persistence engine
//! (`playhub-store`), reached through [`StoreClient`](playhub_store::StoreClient);
//! uploaded payloads live on local disk; rooms live in memory, each with
//! its own relay listeners.
//!
//! ```text
//! client ──TCP──▶ PlayhubServer ─┬─ SessionContext / Presence
//!                                ├─ StoreClient ──TCP──▶ playhub-store
//!                                ├─ ArtifactStorage (disk)
//!                                └─ RoomRegistry ──▶ per-room relays ◀──TCP── players
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use playhub::prelude::*;
//!
//! # async fn start() -> Result<(), PlayhubError> {
//! let server = PlayhubServer::builder()
//!     .bind("0.0.0.0:9800")
//!     .store_addr("127.0.0.1:9900")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod accounts;
mod config;
mod consumer;
mod error;
mod handler;
mod publisher;
mod server;
mod storage;

pub use accounts::StoreAuthenticator;
pub use config::{DEFAULT_MAX_UPLOAD, ServerConfig};
pub use error::{ActionError, PlayhubError, StorageError};
pub use server::{PlayhubServer, PlayhubServerBuilder};
pub use storage::{ArtifactStorage, PayloadReader, StoredPayload};

/// Everything needed to run an orchestrator and talk to it.
pub mod prelude {
    pub use crate::{PlayhubError, PlayhubServer, PlayhubServerBuilder, ServerConfig};
    pub use playhub_protocol::{
        Artifact, ArtifactDetail, Codec, JsonCodec, OwnershipRecord, Request, Response, Review,
        Role, RoomId, Status, UPDATE_REQUIRED,
    };
    pub use playhub_room::{RoomConfig, RoomInfo, RoomState};
    pub use playhub_transport::{Connection, TcpConnection, TransportError};
}
