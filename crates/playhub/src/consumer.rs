//! Consumer actions: browsing, download, ownership, reviews, rooms.

use playhub_protocol::{
    Artifact, ArtifactDetail, ArtifactRef, NewReview, OwnershipRecord, Response, Review, RoomRef,
    collections, send_message,
};
use playhub_room::{NewRoom, RoomError};
use playhub_store::{StoreClient, StoreError};
use playhub_transport::TcpConnection;
use serde_json::json;

use crate::ActionError;
use crate::handler::read_artifact;
use crate::server::ServerState;

/// Loads an artifact that has not been soft-deleted.
async fn live_artifact(state: &ServerState, id: &str) -> Result<Artifact, ActionError> {
    let artifact = read_artifact(state, id).await?;
    if artifact.deleted {
        return Err(ActionError::NotFound("Artifact not found".into()));
    }
    Ok(artifact)
}

async fn find_ownership(
    store: &StoreClient,
    consumer: &str,
    artifact_id: &str,
) -> Result<Option<OwnershipRecord>, StoreError> {
    let found: Vec<OwnershipRecord> = store
        .query(
            collections::OWNERSHIPS,
            &json!({ "consumer": consumer, "artifact_id": artifact_id }),
        )
        .await?;
    Ok(found.into_iter().next())
}

/// Fails with [`ActionError::UpdateRequired`] unless the consumer holds the
/// artifact's published version.
async fn ensure_current(state: &ServerState, consumer: &str, artifact: &Artifact) -> Result<(), ActionError> {
    match find_ownership(&state.store, consumer, &artifact.id).await? {
        Some(held) if held.version == artifact.version => Ok(()),
        held => {
            tracing::debug!(
                consumer,
                artifact_id = %artifact.id,
                held = ?held.map(|h| h.version),
                published = %artifact.version,
                "version gate"
            );
            Err(ActionError::UpdateRequired {
                artifact_id: artifact.id.clone(),
            })
        }
    }
}

/// Flags the consumer's ownership record for `artifact_id` as having
/// completed a room session. A consumer without a record is skipped.
pub(crate) async fn mark_session_completed(
    store: &StoreClient,
    artifact_id: &str,
    consumer: &str,
) -> Result<(), StoreError> {
    let Some(record) = find_ownership(store, consumer, artifact_id).await? else {
        tracing::debug!(consumer, artifact_id, "no ownership record to complete");
        return Ok(());
    };
    if record.has_session_completed {
        return Ok(());
    }
    let _: OwnershipRecord = store
        .update(
            collections::OWNERSHIPS,
            &record.id,
            &json!({ "has_session_completed": true }),
        )
        .await?;
    Ok(())
}

/// Every live artifact, across publishers.
pub(crate) async fn list_artifacts(state: &ServerState) -> Result<Response, ActionError> {
    let all: Vec<Artifact> = state.store.list(collections::ARTIFACTS).await?;
    let live: Vec<Artifact> = all.into_iter().filter(|a| !a.deleted).collect();
    Ok(Response::ok_with(&live)?)
}

pub(crate) async fn artifact_detail(state: &ServerState, target: ArtifactRef) -> Result<Response, ActionError> {
    let artifact = live_artifact(state, &target.artifact_id).await?;
    let reviews: Vec<Review> = state
        .store
        .query(collections::REVIEWS, &json!({ "artifact_id": artifact.id }))
        .await?;
    Ok(Response::ok_with(&ArtifactDetail { artifact, reviews })?)
}

/// Announces the payload with `{file_size, filename}` and streams it.
/// Nothing follows the raw bytes.
///
/// Once the announcement is out the client expects raw bytes only, so any
/// later failure ends the connection.
pub(crate) async fn download(
    conn: &TcpConnection,
    state: &ServerState,
    consumer: &str,
    target: ArtifactRef,
) -> Result<(), ActionError> {
    let artifact = live_artifact(state, &target.artifact_id).await?;
    let payload = state
        .storage
        .open(&artifact.id)
        .await?
        .ok_or_else(|| ActionError::NotFound("No file uploaded for this artifact".into()))?;
    let size = payload.size;

    send_message(
        conn,
        &state.codec,
        &Response::download(size, payload.filename.clone()),
    )
    .await?;
    payload.send(conn).await.map_err(ActionError::TransferAborted)?;
    tracing::info!(consumer, artifact_id = %artifact.id, size, "payload sent");
    Ok(())
}

/// Records that the consumer now holds the artifact's published version.
pub(crate) async fn update_record(
    state: &ServerState,
    consumer: &str,
    target: ArtifactRef,
) -> Result<Response, ActionError> {
    let artifact = live_artifact(state, &target.artifact_id).await?;
    let record: OwnershipRecord = match find_ownership(&state.store, consumer, &artifact.id).await? {
        Some(held) => {
            state
                .store
                .update(
                    collections::OWNERSHIPS,
                    &held.id,
                    &json!({ "version": artifact.version }),
                )
                .await?
        }
        None => {
            let record = OwnershipRecord {
                id: String::new(),
                consumer: consumer.to_string(),
                artifact_id: artifact.id.clone(),
                version: artifact.version.clone(),
                has_session_completed: false,
            };
            state.store.create(collections::OWNERSHIPS, &record).await?
        }
    };
    tracing::info!(consumer, artifact_id = %artifact.id, version = %record.version, "ownership recorded");
    Ok(Response::ok_with(&record)?)
}

/// Reviews need a score in `1..=5` and a completed room session.
pub(crate) async fn rate(state: &ServerState, consumer: &str, review: NewReview) -> Result<Response, ActionError> {
    let score = u8::try_from(review.score)
        .ok()
        .filter(|s| (1..=5).contains(s))
        .ok_or_else(|| ActionError::Invalid("Score must be between 1 and 5".into()))?;

    let Some(held) = find_ownership(&state.store, consumer, &review.artifact_id).await? else {
        return Err(ActionError::Forbidden("You do not own this artifact".into()));
    };
    if !held.has_session_completed {
        return Err(ActionError::Forbidden(
            "Finish a session with this artifact before rating it".into(),
        ));
    }

    let record = Review {
        id: String::new(),
        artifact_id: held.artifact_id,
        consumer: consumer.to_string(),
        score,
        comment: review.comment,
    };
    let created: Review = state.store.create(collections::REVIEWS, &record).await?;
    tracing::info!(consumer, artifact_id = %created.artifact_id, score, "review added");
    Ok(Response::ok_with(&created)?)
}

pub(crate) async fn create_room(state: &ServerState, consumer: &str, target: ArtifactRef) -> Result<Response, ActionError> {
    let artifact = live_artifact(state, &target.artifact_id).await?;
    ensure_current(state, consumer, &artifact).await?;
    let room = state
        .rooms
        .create(NewRoom {
            artifact_id: artifact.id,
            artifact_name: artifact.name,
            host: consumer.to_string(),
            max_participants: artifact.max_participants,
        })
        .await?;
    Ok(Response::ok_with(&room)?)
}

/// Joins an open room. Capacity is checked before the version gate so a
/// full room costs no store traffic; the registry checks it again.
pub(crate) async fn join_room(state: &ServerState, consumer: &str, target: RoomRef) -> Result<Response, ActionError> {
    let room_id = target.room_id;
    let room = state
        .rooms
        .get(room_id)
        .await
        .ok_or(RoomError::NotFound(room_id))?;
    let seated = room.participants.iter().any(|p| p == consumer);
    if !seated && (room.is_full() || !room.state.is_joinable()) {
        return Err(RoomError::RoomFull(room_id).into());
    }

    let artifact = read_artifact(state, &room.artifact_id).await?;
    ensure_current(state, consumer, &artifact).await?;

    let room = state.rooms.join(room_id, consumer).await?;
    Ok(Response::ok_with(&room)?)
}

pub(crate) async fn list_rooms(state: &ServerState) -> Result<Response, ActionError> {
    Ok(Response::ok_with(&state.rooms.list().await)?)
}
