//! Client → orchestrator requests.
//!
//! On the wire every request is `{"action": "...", "data": {...}}`. Known
//! actions decode into one [`Request`] variant each; anything else is
//! reported as [`ProtocolError::UnknownAction`] so the server can answer
//! with an error instead of dropping the connection.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::de::string_or_number;
use crate::{ProtocolError, Role, RoomId};

/// `register` / `login` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(alias = "user_type")]
    pub role: Role,
    pub username: String,
    pub password: String,
}

/// `create_artifact` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewArtifact {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub version: String,
    #[serde(default, alias = "game_type")]
    pub kind: String,
    #[serde(alias = "max_players")]
    pub max_participants: u32,
}

/// `update_artifact` payload. `description` is left alone when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactUpdate {
    #[serde(alias = "game_id", deserialize_with = "string_or_number")]
    pub artifact_id: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Payload naming a single artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    #[serde(alias = "game_id", deserialize_with = "string_or_number")]
    pub artifact_id: String,
}

/// `upload_init` payload. The raw bytes follow the `ready_to_recv` reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadInit {
    #[serde(alias = "game_id", deserialize_with = "string_or_number")]
    pub artifact_id: String,
    pub filename: String,
    pub file_size: u64,
}

/// `rate_artifact` payload. The score range is checked by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReview {
    #[serde(alias = "game_id", deserialize_with = "string_or_number")]
    pub artifact_id: String,
    pub score: i64,
    #[serde(default)]
    pub comment: String,
}

/// `join_room` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomRef {
    pub room_id: RoomId,
}

/// Every action a client can request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "data", rename_all = "snake_case")]
pub enum Request {
    Register(Credentials),
    Login(Credentials),
    Logout {},

    // -- publisher --
    CreateArtifact(NewArtifact),
    UpdateArtifact(ArtifactUpdate),
    DeleteArtifact(ArtifactRef),
    UploadInit(UploadInit),

    // -- both roles; the result depends on who asks --
    ListArtifacts {},

    // -- consumer --
    ArtifactDetail(ArtifactRef),
    DownloadReq(ArtifactRef),
    DownloadUpdateRecord(ArtifactRef),
    RateArtifact(NewReview),
    CreateRoom(ArtifactRef),
    JoinRoom(RoomRef),
    ListRooms {},
}

#[derive(Deserialize)]
struct RawRequest {
    action: String,
    #[serde(default)]
    data: Value,
}

impl Request {
    /// Wire names of every known action.
    pub const ACTIONS: &'static [&'static str] = &[
        "register",
        "login",
        "logout",
        "create_artifact",
        "update_artifact",
        "delete_artifact",
        "upload_init",
        "list_artifacts",
        "artifact_detail",
        "download_req",
        "download_update_record",
        "rate_artifact",
        "create_room",
        "join_room",
        "list_rooms",
    ];

    /// Interprets a decoded frame body as a request.
    ///
    /// A missing or `null` `data` is treated as `{}`.
    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        let raw: RawRequest = serde_json::from_value(value)
            .map_err(|e| ProtocolError::InvalidMessage(format!("not a request: {e}")))?;
        if !Self::ACTIONS.contains(&raw.action.as_str()) {
            return Err(ProtocolError::UnknownAction(raw.action));
        }
        let data = match raw.data {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };
        let mut envelope = Map::new();
        envelope.insert("action".into(), Value::String(raw.action.clone()));
        envelope.insert("data".into(), data);
        serde_json::from_value(Value::Object(envelope))
            .map_err(|e| ProtocolError::InvalidMessage(format!("{}: {e}", raw.action)))
    }

    /// The wire name of this request's action.
    pub fn action(&self) -> &'static str {
        match self {
            Self::Register(_) => "register",
            Self::Login(_) => "login",
            Self::Logout {} => "logout",
            Self::CreateArtifact(_) => "create_artifact",
            Self::UpdateArtifact(_) => "update_artifact",
            Self::DeleteArtifact(_) => "delete_artifact",
            Self::UploadInit(_) => "upload_init",
            Self::ListArtifacts {} => "list_artifacts",
            Self::ArtifactDetail(_) => "artifact_detail",
            Self::DownloadReq(_) => "download_req",
            Self::DownloadUpdateRecord(_) => "download_update_record",
            Self::RateArtifact(_) => "rate_artifact",
            Self::CreateRoom(_) => "create_room",
            Self::JoinRoom(_) => "join_room",
            Self::ListRooms {} => "list_rooms",
        }
    }
}
