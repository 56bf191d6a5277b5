//! Publisher actions: create, list, update, soft-delete, upload.
//!
//! Every function here expects the caller to have checked the session
//! role already and receives the publisher's username.

use playhub_protocol::{
    Artifact, ArtifactRef, ArtifactUpdate, NewArtifact, Response, UploadInit, collections,
    send_message,
};
use playhub_transport::TcpConnection;
use serde::Serialize;
use serde_json::json;

use crate::ActionError;
use crate::handler::read_artifact;
use crate::server::ServerState;
use crate::storage::ArtifactStorage;

#[derive(Serialize)]
struct VersionPatch<'a> {
    version: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

/// Loads an artifact the publisher may modify.
async fn owned_artifact(state: &ServerState, owner: &str, id: &str) -> Result<Artifact, ActionError> {
    let artifact = read_artifact(state, id).await?;
    if artifact.owner != owner {
        return Err(ActionError::Forbidden("Not the owner of this artifact".into()));
    }
    Ok(artifact)
}

pub(crate) async fn create_artifact(
    state: &ServerState,
    owner: &str,
    new: NewArtifact,
) -> Result<Response, ActionError> {
    if new.max_participants < 1 {
        return Err(ActionError::Invalid("max_participants must be at least 1".into()));
    }
    if new.name.trim().is_empty() {
        return Err(ActionError::Invalid("name must not be empty".into()));
    }
    let artifact = Artifact {
        id: String::new(),
        owner: owner.to_string(),
        name: new.name,
        description: new.description,
        version: new.version,
        max_participants: new.max_participants,
        kind: new.kind,
        deleted: false,
    };
    let created: Artifact = state.store.create(collections::ARTIFACTS, &artifact).await?;
    tracing::info!(owner, artifact_id = %created.id, version = %created.version, "artifact created");
    Ok(Response::ok_with(&created)?)
}

/// The publisher's own artifacts, soft-deleted ones excluded.
pub(crate) async fn list_artifacts(state: &ServerState, owner: &str) -> Result<Response, ActionError> {
    let mine: Vec<Artifact> = state
        .store
        .query(collections::ARTIFACTS, &json!({ "owner": owner }))
        .await?;
    let live: Vec<Artifact> = mine.into_iter().filter(|a| !a.deleted).collect();
    Ok(Response::ok_with(&live)?)
}

pub(crate) async fn update_artifact(
    state: &ServerState,
    owner: &str,
    update: ArtifactUpdate,
) -> Result<Response, ActionError> {
    let artifact = owned_artifact(state, owner, &update.artifact_id).await?;
    let patch = VersionPatch {
        version: &update.version,
        description: update.description.as_deref(),
    };
    let updated: Artifact = state
        .store
        .update(collections::ARTIFACTS, &artifact.id, &patch)
        .await?;
    tracing::info!(owner, artifact_id = %updated.id, from = %artifact.version, to = %updated.version, "artifact updated");
    Ok(Response::ok_with(&updated)?)
}

/// Soft delete: the record stays, flagged `deleted`.
pub(crate) async fn delete_artifact(
    state: &ServerState,
    owner: &str,
    target: ArtifactRef,
) -> Result<Response, ActionError> {
    let artifact = owned_artifact(state, owner, &target.artifact_id).await?;
    let updated: Artifact = state
        .store
        .update(collections::ARTIFACTS, &artifact.id, &json!({ "deleted": true }))
        .await?;
    tracing::info!(owner, artifact_id = %updated.id, "artifact deleted");
    Ok(Response::ok_with(&updated)?)
}

/// Upload handshake: check, answer `ready_to_recv`, take exactly
/// `file_size` raw bytes, then report.
pub(crate) async fn upload(
    conn: &TcpConnection,
    state: &ServerState,
    owner: &str,
    init: UploadInit,
) -> Result<Response, ActionError> {
    let artifact = owned_artifact(state, owner, &init.artifact_id).await?;
    if init.file_size > state.max_upload {
        return Err(ActionError::Invalid(format!(
            "upload of {} bytes exceeds the {} byte limit",
            init.file_size, state.max_upload
        )));
    }
    ArtifactStorage::file_name(&init.filename)?;

    send_message(conn, &state.codec, &Response::ready_to_recv()).await?;
    let stored = state
        .storage
        .receive(conn, &artifact.id, &init.filename, init.file_size)
        .await?;
    Ok(Response::ok(json!({
        "artifact_id": artifact.id,
        "filename": stored.filename,
        "file_size": stored.size,
    })))
}
