//! Requests understood by the persistence engine.
//!
//! Flat shape: `{"action": "read", "collection": "artifacts", "id": "3"}`.
//! Replies use the same [`Response`](crate::Response) as client traffic.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ProtocolError;
use crate::de::{null_as_default, string_or_number};

/// A stored record, as a JSON object.
pub type Record = Map<String, Value>;

/// One store operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StoreRequest {
    Create {
        collection: String,
        #[serde(default, deserialize_with = "null_as_default")]
        record: Record,
    },
    Read {
        collection: String,
        #[serde(deserialize_with = "string_or_number")]
        id: String,
    },
    Update {
        collection: String,
        #[serde(deserialize_with = "string_or_number")]
        id: String,
        #[serde(default, deserialize_with = "null_as_default")]
        patch: Record,
    },
    Delete {
        collection: String,
        #[serde(deserialize_with = "string_or_number")]
        id: String,
    },
    List {
        collection: String,
    },
    Query {
        collection: String,
        #[serde(default, deserialize_with = "null_as_default")]
        filter: Record,
    },
    Ping,
}

/// Wire names of every store action.
pub const STORE_ACTIONS: &[&str] = &["create", "read", "update", "delete", "list", "query", "ping"];

impl StoreRequest {
    /// Interprets a decoded frame body as a store request.
    ///
    /// Failures are classified so the engine can answer precisely: an
    /// unrecognised action, a missing collection, or bad fields.
    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        let Value::Object(map) = value else {
            return Err(ProtocolError::InvalidMessage("request must be an object".into()));
        };
        let action = match map.get("action") {
            Some(Value::String(a)) => a.clone(),
            _ => return Err(ProtocolError::InvalidMessage("action required".into())),
        };
        if !STORE_ACTIONS.contains(&action.as_str()) {
            return Err(ProtocolError::UnknownAction(action));
        }
        if action != "ping" && !matches!(map.get("collection"), Some(Value::String(_))) {
            return Err(ProtocolError::InvalidMessage("collection required".into()));
        }
        serde_json::from_value(Value::Object(map))
            .map_err(|e| ProtocolError::InvalidMessage(format!("{action}: {e}")))
    }

    /// The collection this request targets; `None` for `ping`.
    pub fn collection(&self) -> Option<&str> {
        match self {
            Self::Create { collection, .. }
            | Self::Read { collection, .. }
            | Self::Update { collection, .. }
            | Self::Delete { collection, .. }
            | Self::List { collection }
            | Self::Query { collection, .. } => Some(collection),
            Self::Ping => None,
        }
    }

    /// The wire name of this request's action.
    pub fn action(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Read { .. } => "read",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
            Self::List { .. } => "list",
            Self::Query { .. } => "query",
            Self::Ping => "ping",
        }
    }

    /// Returns `true` if the request changes stored state.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::Create { .. } | Self::Update { .. } | Self::Delete { .. }
        )
    }
}
