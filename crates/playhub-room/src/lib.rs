//! Room lifecycle for playhub.
//!
//! Each live room owns two listening sockets: a primary relay that
//! forwards player traffic between seats, and a side channel that fans
//! out everything it receives. A room runs as its own Tokio task from the
//! moment it is created until its last socket closes.
//!
//! # Key types
//!
//! - [`RoomRegistry`]: the live room table; creates rooms and seats
//!   participants
//! - [`RoomInfo`]: what clients see in room listings
//! - [`RoomEvent`]: start/close notifications for the orchestrator
//! - [`RoomState`]: lifecycle state machine
//! - [`RoomConfig`]: ports, limits, and timings

mod config;
mod error;
mod registry;
mod session;

pub use config::{RoomConfig, RoomState};
pub use error::RoomError;
pub use registry::{NewRoom, RoomEvent, RoomEvents, RoomInfo, RoomRegistry};
pub use session::role_token;
