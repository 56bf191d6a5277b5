//! Responses shared by the orchestrator and the store.
//!
//! Shape: `{"status": "ok" | "error" | "ready_to_recv", ...}`. Besides the
//! usual `result` / `error`, a few actions add their own top-level fields
//! (`artifact_id` on a version mismatch, `file_size` and `filename` on a
//! download). Absent fields are omitted from the JSON.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ProtocolError;

/// Error string that tells a consumer to re-download before retrying.
pub const UPDATE_REQUIRED: &str = "UPDATE_REQUIRED";

/// Outcome tag of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Ok,
    Error,
    /// The server is waiting for the raw bytes of an upload.
    ReadyToRecv,
}

/// A response frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// HTTP-style classification of an error (400, 401, 403, 404, 409, 500).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl Response {
    fn with_status(status: Status) -> Self {
        Self {
            status,
            result: None,
            error: None,
            code: None,
            artifact_id: None,
            file_size: None,
            filename: None,
        }
    }

    /// Success carrying a result.
    pub fn ok(result: Value) -> Self {
        Self {
            result: Some(result),
            ..Self::with_status(Status::Ok)
        }
    }

    /// Success with nothing to report.
    pub fn ok_empty() -> Self {
        Self::with_status(Status::Ok)
    }

    /// Success, serializing `result`.
    pub fn ok_with<T: Serialize>(result: &T) -> Result<Self, ProtocolError> {
        serde_json::to_value(result)
            .map(Self::ok)
            .map_err(ProtocolError::Encode)
    }

    /// Failure with a code and a human-readable message.
    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            code: Some(code),
            ..Self::with_status(Status::Error)
        }
    }

    /// The consumer's copy of `artifact_id` is stale.
    pub fn update_required(artifact_id: impl Into<String>) -> Self {
        Self {
            artifact_id: Some(artifact_id.into()),
            ..Self::error(409, UPDATE_REQUIRED)
        }
    }

    /// Upload accepted; send the raw bytes now.
    pub fn ready_to_recv() -> Self {
        Self::with_status(Status::ReadyToRecv)
    }

    /// Download header; `file_size` raw bytes follow.
    pub fn download(file_size: u64, filename: impl Into<String>) -> Self {
        Self {
            file_size: Some(file_size),
            filename: Some(filename.into()),
            ..Self::with_status(Status::Ok)
        }
    }

    /// Returns `true` for `status: ok`.
    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    /// Returns `true` if this is the version-mismatch error.
    pub fn is_update_required(&self) -> bool {
        self.status == Status::Error && self.error.as_deref() == Some(UPDATE_REQUIRED)
    }

    /// Decodes `result` into `T`, or returns the error message.
    pub fn into_result<T: DeserializeOwned>(self) -> Result<T, String> {
        match self.status {
            Status::Error => Err(self.error.unwrap_or_else(|| "unknown error".into())),
            _ => serde_json::from_value(self.result.unwrap_or(Value::Null))
                .map_err(|e| format!("unexpected result shape: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_ok_json_shape() {
        let json = serde_json::to_value(Response::ok(json!({"id": "1"}))).unwrap();
        assert_eq!(json, json!({"status": "ok", "result": {"id": "1"}}));
    }

    #[test]
    fn test_error_json_shape() {
        let json = serde_json::to_value(Response::error(404, "not found")).unwrap();
        assert_eq!(json, json!({"status": "error", "error": "not found", "code": 404}));
    }

    #[test]
    fn test_update_required_carries_artifact_id() {
        let resp = Response::update_required("7");
        assert!(resp.is_update_required());
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["error"], "UPDATE_REQUIRED");
        assert_eq!(json["artifact_id"], "7");
    }

    #[test]
    fn test_ready_to_recv_and_download_shapes() {
        let json = serde_json::to_value(Response::ready_to_recv()).unwrap();
        assert_eq!(json, json!({"status": "ready_to_recv"}));

        let json = serde_json::to_value(Response::download(100, "game.py")).unwrap();
        assert_eq!(
            json,
            json!({"status": "ok", "file_size": 100, "filename": "game.py"})
        );
    }

    #[test]
    fn test_into_result() {
        let ok: Vec<u32> = Response::ok(json!([1, 2])).into_result().unwrap();
        assert_eq!(ok, vec![1, 2]);
        let err = Response::error(401, "Auth required")
            .into_result::<Value>()
            .unwrap_err();
        assert_eq!(err, "Auth required");
    }
}
