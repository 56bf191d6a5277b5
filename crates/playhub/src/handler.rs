//! Per-connection handler: decode, dispatch, reply.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive a frame → decode `{action, data}` into a [`Request`]
//!   2. Check the session role the action needs
//!   3. Run the action against the store / rooms / payload storage
//!   4. Send the response (some actions also move raw bytes)
//!
//! A frame that is not JSON, or any broken stream, ends the connection.
//! Everything else, unknown actions included, gets an error response.
//! The session's presence claim is released when the handler returns.

use std::sync::Arc;

use playhub_protocol::{
    Artifact, ProtocolError, Request, Response, Role, collections, recv_message, send_message,
};
use playhub_session::{Authenticator, SessionContext};
use playhub_store::StoreError;
use playhub_transport::{Connection, TcpConnection};
use serde_json::{Value, json};

use crate::server::ServerState;
use crate::{ActionError, PlayhubError, consumer, publisher};

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection(
    conn: TcpConnection,
    state: Arc<ServerState>,
) -> Result<(), PlayhubError> {
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");

    let mut session = SessionContext::new();
    let result = serve(&conn, &state, &mut session).await;

    if let Some(identity) = session.logout() {
        tracing::debug!(%conn_id, %identity, "session ended with connection");
    }
    let _ = conn.close().await;
    result
}

async fn serve(
    conn: &TcpConnection,
    state: &ServerState,
    session: &mut SessionContext,
) -> Result<(), PlayhubError> {
    let conn_id = conn.id();
    loop {
        let value: Value = match recv_message(conn, &state.codec).await {
            Ok(Some(value)) => value,
            Ok(None) => {
                tracing::debug!(%conn_id, "connection closed cleanly");
                return Ok(());
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "dropping connection");
                return Ok(());
            }
        };

        let request = match Request::from_value(value) {
            Ok(request) => request,
            Err(e) => {
                let message = match e {
                    ProtocolError::UnknownAction(action) => format!("Unknown action: {action}"),
                    other => other.to_string(),
                };
                tracing::debug!(%conn_id, error = %message, "rejected request");
                send_message(conn, &state.codec, &Response::error(400, message)).await?;
                continue;
            }
        };

        let action = request.action();
        match dispatch(conn, state, session, request).await {
            Ok(Some(response)) => send_message(conn, &state.codec, &response).await?,
            Ok(None) => {}
            Err(e) if e.is_fatal() => {
                tracing::info!(%conn_id, action, error = %e, "action broke the connection");
                return Err(e.into());
            }
            Err(e) => {
                tracing::debug!(%conn_id, action, code = e.code(), error = %e, "action failed");
                send_message(conn, &state.codec, &e.to_response()).await?;
            }
        }
    }
}

/// Runs one request. `Ok(None)` means the action already wrote everything
/// it had to say.
async fn dispatch(
    conn: &TcpConnection,
    state: &ServerState,
    session: &mut SessionContext,
    request: Request,
) -> Result<Option<Response>, ActionError> {
    let response = match request {
        Request::Register(creds) => {
            let account = state.accounts.register(&creds).await?;
            Response::ok(json!({
                "id": account.id,
                "username": account.username,
                "role": account.role,
            }))
        }
        Request::Login(creds) => {
            let identity = session.login(&state.accounts, &state.presence, &creds).await?;
            Response::ok(json!({ "role": identity.role, "username": identity.username }))
        }
        Request::Logout {} => {
            session.logout();
            Response::ok_empty()
        }

        Request::CreateArtifact(new) => {
            publisher::create_artifact(state, session.require_publisher()?, new).await?
        }
        Request::UpdateArtifact(update) => {
            publisher::update_artifact(state, session.require_publisher()?, update).await?
        }
        Request::DeleteArtifact(target) => {
            publisher::delete_artifact(state, session.require_publisher()?, target).await?
        }
        Request::UploadInit(init) => {
            publisher::upload(conn, state, session.require_publisher()?, init).await?
        }

        Request::ListArtifacts {} => match session.identity().map(|i| i.role) {
            Some(Role::Publisher) => {
                publisher::list_artifacts(state, session.require_publisher()?).await?
            }
            _ => {
                session.require_consumer()?;
                consumer::list_artifacts(state).await?
            }
        },

        Request::ArtifactDetail(target) => {
            session.require_consumer()?;
            consumer::artifact_detail(state, target).await?
        }
        Request::DownloadReq(target) => {
            consumer::download(conn, state, session.require_consumer()?, target).await?;
            return Ok(None);
        }
        Request::DownloadUpdateRecord(target) => {
            consumer::update_record(state, session.require_consumer()?, target).await?
        }
        Request::RateArtifact(review) => {
            consumer::rate(state, session.require_consumer()?, review).await?
        }
        Request::CreateRoom(target) => {
            consumer::create_room(state, session.require_consumer()?, target).await?
        }
        Request::JoinRoom(target) => {
            consumer::join_room(state, session.require_consumer()?, target).await?
        }
        Request::ListRooms {} => {
            session.require_consumer()?;
            consumer::list_rooms(state).await?
        }
    };
    Ok(Some(response))
}

/// Loads an artifact by id, deleted or not.
pub(crate) async fn read_artifact(state: &ServerState, id: &str) -> Result<Artifact, ActionError> {
    match state.store.read(collections::ARTIFACTS, id).await {
        Ok(artifact) => Ok(artifact),
        Err(StoreError::NotFound { .. }) => Err(ActionError::NotFound("Artifact not found".into())),
        Err(e) => Err(e.into()),
    }
}
