//! Wire protocol for playhub.
//!
//! This crate defines what travels inside frames:
//!
//! - **Client traffic** ([`Request`], [`Response`]): `{action, data}` in,
//!   `{status, result | error, ...}` out.
//! - **Store traffic** ([`StoreRequest`]): the persistence engine's flat
//!   `{action, collection, ...}` requests, answered with [`Response`].
//! - **Records** ([`Account`], [`Artifact`], [`OwnershipRecord`],
//!   [`Review`]): the durable data model.
//! - **Room traffic** ([`RoomNotice`], [`is_ping`]): the few frames a room
//!   session originates or inspects.
//! - **Codec** ([`Codec`], [`JsonCodec`]): bytes ↔ values.
//!
//! ```text
//! Transport (frames) → Protocol (Request / StoreRequest) → Orchestrator / Store
//! ```

mod codec;
pub mod de;
mod error;
mod records;
mod request;
mod response;
mod room;
mod store;

pub use codec::{Codec, JsonCodec, recv_message, send_message};
pub use error::ProtocolError;
pub use records::{
    Account, Artifact, ArtifactDetail, OwnershipRecord, Review, Role, collections,
};
pub use request::{
    ArtifactRef, ArtifactUpdate, Credentials, NewArtifact, NewReview, Request, RoomRef,
    UploadInit,
};
pub use response::{Response, Status, UPDATE_REQUIRED};
pub use room::{RoomId, RoomNotice, frame_type, is_ping};
pub use store::{Record, STORE_ACTIONS, StoreRequest};
