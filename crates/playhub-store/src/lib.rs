//! Persistence engine for playhub.
//!
//! A single-process record store reachable only through framed requests:
//!
//! - [`Store`]: collections of JSON records, snapshotted to one file on
//!   every mutation
//! - [`StoreServer`]: serves a `Store` over TCP, one lock for all requests
//! - [`StoreClient`]: what the orchestrator uses to talk to the server
//!
//! ```text
//! Orchestrator ── StoreClient ──TCP──▶ StoreServer ── Mutex<Store> ── data.json
//! ```

mod client;
mod engine;
mod error;
pub mod logging;
mod server;

pub use client::StoreClient;
pub use engine::Store;
pub use error::StoreError;
pub use server::StoreServer;
