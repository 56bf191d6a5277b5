//! `StoreServer`: serves a [`Store`] over framed TCP.
//!
//! One task per connection runs a read → apply → reply loop. Every request
//! goes through the same lock, so operations are linearizable. File I/O
//! runs on the blocking pool while the lock is held.

use std::net::SocketAddr;
use std::sync::Arc;

use playhub_protocol::{
    JsonCodec, ProtocolError, Response, StoreRequest, recv_message, send_message,
};
use playhub_transport::{Connection, TcpConnection, TcpTransport, Transport};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::{Store, StoreError};

/// A running persistence engine.
pub struct StoreServer {
    transport: TcpTransport,
    store: Arc<Mutex<Store>>,
}

impl StoreServer {
    /// Binds the listener. The store is opened by the caller so tests can
    /// point it at a temporary file.
    pub async fn bind(addr: &str, store: Store) -> Result<Self, StoreError> {
        let transport = TcpTransport::bind(addr).await?;
        Ok(Self {
            transport,
            store: Arc::new(Mutex::new(store)),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Accepts connections until the process ends.
    pub async fn run(mut self) -> Result<(), StoreError> {
        tracing::info!(addr = ?self.transport.local_addr().ok(), "store server running");
        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let store = Arc::clone(&self.store);
                    tokio::spawn(async move {
                        let conn_id = conn.id();
                        let peer = conn.peer_addr();
                        tracing::debug!(%conn_id, %peer, "store client connected");
                        if let Err(e) = serve_connection(&conn, store).await {
                            tracing::debug!(%conn_id, error = %e, "store connection ended with error");
                        }
                        let _ = conn.close().await;
                        tracing::debug!(%conn_id, "store client disconnected");
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

async fn serve_connection(conn: &TcpConnection, store: Arc<Mutex<Store>>) -> Result<(), StoreError> {
    let codec = JsonCodec;
    while let Some(body) = recv_message::<_, _, Value>(conn, &codec).await? {
        let response = match StoreRequest::from_value(body) {
            Ok(request) => execute(&store, request).await,
            Err(e) => rejection(&e),
        };
        send_message(conn, &codec, &response).await?;
    }
    Ok(())
}

async fn execute(store: &Arc<Mutex<Store>>, request: StoreRequest) -> Response {
    let store = Arc::clone(store);
    let action = request.action();
    let outcome = tokio::task::spawn_blocking(move || {
        let mut guard = store.blocking_lock();
        guard.apply(request)
    })
    .await;
    outcome.unwrap_or_else(|e| {
        tracing::error!(action, error = %e, "store worker panicked");
        Response::error(500, format!("exception: {e}"))
    })
}

fn rejection(err: &ProtocolError) -> Response {
    match err {
        ProtocolError::UnknownAction(action) => {
            Response::error(400, format!("unknown action {action}"))
        }
        ProtocolError::InvalidMessage(msg) => Response::error(400, msg.clone()),
        other => Response::error(400, other.to_string()),
    }
}
