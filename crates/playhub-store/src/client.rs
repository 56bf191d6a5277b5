//! `StoreClient`: typed access to a remote [`StoreServer`](crate::StoreServer).
//!
//! The client keeps one connection open and serializes requests over it.
//! A transport failure drops the connection; the next request dials again.
//! Requests are never retried.

use playhub_protocol::{
    JsonCodec, ProtocolError, Record, Response, StoreRequest, recv_message, send_message,
};
use playhub_transport::{Connection, TcpConnection};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::StoreError;

/// Handle to the persistence engine. Share it behind an `Arc`.
pub struct StoreClient {
    addr: String,
    conn: Mutex<Option<TcpConnection>>,
    codec: JsonCodec,
}

impl StoreClient {
    /// Creates a client that connects on first use.
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            conn: Mutex::new(None),
            codec: JsonCodec,
        }
    }

    /// Creates a client and checks the store answers `ping`.
    pub async fn connect(addr: impl Into<String>) -> Result<Self, StoreError> {
        let client = Self::new(addr);
        client.ping().await?;
        Ok(client)
    }

    /// The store's address.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Sends one request and waits for its reply.
    pub async fn request(&self, request: &StoreRequest) -> Result<Response, StoreError> {
        let mut slot = self.conn.lock().await;
        let conn = match slot.take() {
            Some(conn) => conn,
            None => {
                let conn = TcpConnection::connect(&self.addr).await?;
                tracing::debug!(addr = %self.addr, conn_id = %conn.id(), "connected to store");
                conn
            }
        };
        match self.round_trip(&conn, request).await {
            Ok(response) => {
                *slot = Some(conn);
                Ok(response)
            }
            Err(e) => {
                if e.breaks_connection() {
                    tracing::warn!(addr = %self.addr, error = %e, "store connection lost");
                } else {
                    *slot = Some(conn);
                }
                Err(e)
            }
        }
    }

    async fn round_trip(
        &self,
        conn: &TcpConnection,
        request: &StoreRequest,
    ) -> Result<Response, StoreError> {
        send_message(conn, &self.codec, request).await?;
        recv_message(conn, &self.codec)
            .await?
            .ok_or(StoreError::Disconnected)
    }

    async fn call(&self, request: StoreRequest) -> Result<Value, StoreError> {
        let action = request.action();
        let target = request.collection().map(str::to_owned);
        let id = match &request {
            StoreRequest::Read { id, .. } | StoreRequest::Update { id, .. } => Some(id.clone()),
            _ => None,
        };
        let response = self.request(&request).await?;
        if response.is_ok() {
            return Ok(response.result.unwrap_or(Value::Null));
        }
        match (response.code, target, id) {
            (Some(404), Some(collection), Some(id)) => Err(StoreError::NotFound { collection, id }),
            (code, _, _) => Err(StoreError::Rejected {
                action,
                code,
                message: response.error.unwrap_or_default(),
            }),
        }
    }

    /// Checks the store is reachable.
    pub async fn ping(&self) -> Result<(), StoreError> {
        self.call(StoreRequest::Ping).await.map(drop)
    }

    /// Inserts a record and returns it as stored, `id` included.
    pub async fn create<T, R>(&self, collection: &str, record: &T) -> Result<R, StoreError>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let record = to_record(record)?;
        let value = self
            .call(StoreRequest::Create {
                collection: collection.into(),
                record,
            })
            .await?;
        decode("create", value)
    }

    /// Fetches one record.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if there is no such record.
    pub async fn read<R: DeserializeOwned>(&self, collection: &str, id: &str) -> Result<R, StoreError> {
        let value = self
            .call(StoreRequest::Read {
                collection: collection.into(),
                id: id.into(),
            })
            .await?;
        decode("read", value)
    }

    /// Merges `patch` into a record and returns the result.
    pub async fn update<T, R>(&self, collection: &str, id: &str, patch: &T) -> Result<R, StoreError>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let patch = to_record(patch)?;
        let value = self
            .call(StoreRequest::Update {
                collection: collection.into(),
                id: id.into(),
                patch,
            })
            .await?;
        decode("update", value)
    }

    /// Removes a record. Returns whether it existed.
    pub async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let value = self
            .call(StoreRequest::Delete {
                collection: collection.into(),
                id: id.into(),
            })
            .await?;
        decode("delete", value)
    }

    /// Every record in a collection, ascending by id.
    pub async fn list<R: DeserializeOwned>(&self, collection: &str) -> Result<Vec<R>, StoreError> {
        let value = self
            .call(StoreRequest::List {
                collection: collection.into(),
            })
            .await?;
        decode("list", value)
    }

    /// Records matching every field of `filter`.
    pub async fn query<T, R>(&self, collection: &str, filter: &T) -> Result<Vec<R>, StoreError>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let filter = to_record(filter)?;
        let value = self
            .call(StoreRequest::Query {
                collection: collection.into(),
                filter,
            })
            .await?;
        decode("query", value)
    }
}

fn to_record<T: Serialize>(value: &T) -> Result<Record, StoreError> {
    match serde_json::to_value(value).map_err(ProtocolError::Encode)? {
        Value::Object(map) => Ok(map),
        other => Err(ProtocolError::InvalidMessage(format!("expected an object, got {other}")).into()),
    }
}

fn decode<R: DeserializeOwned>(action: &'static str, value: Value) -> Result<R, StoreError> {
    serde_json::from_value(value).map_err(|e| StoreError::UnexpectedResult {
        action,
        detail: e.to_string(),
    })
}
