//! Orchestrator configuration.

use std::path::PathBuf;

use playhub_room::RoomConfig;

/// Largest upload accepted by default: 64 MiB.
pub const DEFAULT_MAX_UPLOAD: u64 = 64 * 1024 * 1024;

/// Everything the orchestrator needs to start.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address client connections are accepted on.
    pub bind: String,

    /// Address of the persistence engine.
    pub store_addr: String,

    /// Root directory for uploaded artifact payloads.
    pub storage_dir: PathBuf,

    /// Uploads announcing more bytes than this are refused.
    pub max_upload: u64,

    /// Settings for every room.
    pub room: RoomConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:9800".to_string(),
            store_addr: "127.0.0.1:9900".to_string(),
            storage_dir: PathBuf::from("storage"),
            max_upload: DEFAULT_MAX_UPLOAD,
            room: RoomConfig::default(),
        }
    }
}
