//! `PlayhubServer` builder and server loop.
//!
//! This is the entry point for running the orchestrator. It ties together
//! all the layers: transport → protocol → session → store / rooms.

use std::path::PathBuf;
use std::sync::Arc;

use playhub_protocol::JsonCodec;
use playhub_room::{RoomConfig, RoomEvent, RoomEvents, RoomRegistry};
use playhub_session::Presence;
use playhub_store::StoreClient;
use playhub_transport::{TcpTransport, Transport};

use crate::accounts::StoreAuthenticator;
use crate::consumer::mark_session_completed;
use crate::handler::handle_connection;
use crate::storage::ArtifactStorage;
use crate::{PlayhubError, ServerConfig};

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks.
pub(crate) struct ServerState {
    pub(crate) store: Arc<StoreClient>,
    pub(crate) accounts: StoreAuthenticator,
    pub(crate) presence: Presence,
    pub(crate) rooms: RoomRegistry,
    pub(crate) storage: ArtifactStorage,
    pub(crate) codec: JsonCodec,
    pub(crate) max_upload: u64,
}

/// Builder for configuring and starting the orchestrator.
///
/// # Example
///
/// ```rust,no_run
/// use playhub::PlayhubServer;
///
/// # async fn start() -> Result<(), playhub::PlayhubError> {
/// let server = PlayhubServer::builder()
///     .bind("0.0.0.0:9800")
///     .store_addr("127.0.0.1:9900")
///     .storage_dir("/var/lib/playhub/storage")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct PlayhubServerBuilder {
    config: ServerConfig,
}

impl PlayhubServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to accept clients on.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind = addr.to_string();
        self
    }

    /// Sets the persistence engine's address.
    pub fn store_addr(mut self, addr: &str) -> Self {
        self.config.store_addr = addr.to_string();
        self
    }

    /// Sets where uploaded payloads are kept.
    pub fn storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.storage_dir = dir.into();
        self
    }

    /// Sets the largest accepted upload, in bytes.
    pub fn max_upload(mut self, bytes: u64) -> Self {
        self.config.max_upload = bytes;
        self
    }

    /// Sets the room configuration.
    pub fn room_config(mut self, room: RoomConfig) -> Self {
        self.config.room = room;
        self
    }

    /// Binds the client listener and wires up the shared state.
    ///
    /// The store is contacted lazily; an unreachable store at startup is
    /// only logged.
    pub async fn build(self) -> Result<PlayhubServer, PlayhubError> {
        let config = self.config;
        let transport = TcpTransport::bind(&config.bind).await?;

        let store = Arc::new(StoreClient::new(config.store_addr.clone()));
        if let Err(e) = store.ping().await {
            tracing::warn!(store = %config.store_addr, error = %e, "store not reachable yet");
        }

        let (rooms, events) = RoomRegistry::new(config.room);
        tokio::spawn(record_room_events(Arc::clone(&store), events));

        let state = Arc::new(ServerState {
            accounts: StoreAuthenticator::new(Arc::clone(&store)),
            store,
            presence: Presence::new(),
            rooms,
            storage: ArtifactStorage::new(config.storage_dir),
            codec: JsonCodec,
            max_upload: config.max_upload,
        });

        Ok(PlayhubServer { transport, state })
    }
}

impl Default for PlayhubServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running orchestrator.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct PlayhubServer {
    transport: TcpTransport,
    state: Arc<ServerState>,
}

impl PlayhubServer {
    /// Creates a new builder.
    pub fn builder() -> PlayhubServerBuilder {
        PlayhubServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the accept loop, one handler task per client. Runs until the
    /// process is terminated.
    pub async fn run(mut self) -> Result<(), PlayhubError> {
        tracing::info!(addr = ?self.local_addr().ok(), "playhub server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Applies room lifecycle events to the store: when a room starts, every
/// seated consumer's ownership record is marked as having completed a
/// session. Runs for as long as any room handle exists.
async fn record_room_events(store: Arc<StoreClient>, mut events: RoomEvents) {
    while let Some(event) = events.recv().await {
        match event {
            RoomEvent::Started {
                room_id,
                artifact_id,
                participants,
            } => {
                for consumer in &participants {
                    if let Err(e) = mark_session_completed(&store, &artifact_id, consumer).await {
                        tracing::warn!(%room_id, consumer = %consumer, error = %e, "could not record session");
                    }
                }
                tracing::info!(%room_id, %artifact_id, players = participants.len(), "session recorded");
            }
            RoomEvent::Closed { room_id } => {
                tracing::debug!(%room_id, "room gone");
            }
        }
    }
}
