//! REST handlers under `/api/messages`.

use crate::app::AppState;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::metrics;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chatloop_core::{ChatError, SeenOutcome};
use chatloop_protocol::api::{AckResponse, MessagesResponse, PeersResponse, SendResponse};
use chatloop_protocol::{MessageId, MessagePayload, UserId};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// `GET /api/messages/users`
pub async fn list_peers(
    AuthUser(viewer): AuthUser,
    State(state): State<Arc<AppState>>,
) -> Result<Json<PeersResponse>, ApiError> {
    let unseen_messages = state.hub.unseen_counts(&viewer).await?;
    Ok(Json(PeersResponse {
        success: true,
        users: state.directory.peers_of(&viewer),
        unseen_messages,
    }))
}

/// `GET /api/messages/:peer_id`
pub async fn conversation(
    AuthUser(viewer): AuthUser,
    Path(peer_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<MessagesResponse>, ApiError> {
    let peer = UserId::new(peer_id);
    let messages = state.hub.conversation(&viewer, &peer).await?;
    debug!(viewer = %viewer, peer = %peer, count = messages.len(), "Fetched conversation");
    Ok(Json(MessagesResponse {
        success: true,
        messages,
    }))
}

/// `PUT /api/messages/send/:peer_id`
pub async fn send_message(
    AuthUser(sender): AuthUser,
    Path(peer_id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<MessagePayload>,
) -> Result<(StatusCode, Json<SendResponse>), ApiError> {
    let receiver = UserId::new(peer_id);
    if !state.directory.contains(&receiver) {
        return Err(ApiError::UnknownUser(receiver.to_string()));
    }

    let start = Instant::now();
    let delivery = state.hub.send(&sender, &receiver, payload).await?;
    metrics::record_message_sent(start.elapsed().as_secs_f64());
    if let Some(report) = delivery.push {
        metrics::record_push(report);
    }

    Ok((
        StatusCode::CREATED,
        Json(SendResponse {
            success: true,
            new_message: delivery.message,
        }),
    ))
}

/// `PUT /api/messages/mark/:message_id`
///
/// An unknown id is acknowledged like an already seen one.
pub async fn mark_seen(
    AuthUser(viewer): AuthUser,
    Path(message_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<AckResponse>, ApiError> {
    let id: MessageId = message_id
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid message id: {message_id}")))?;

    match state.hub.mark_seen_by(&viewer, id).await {
        Ok(outcome) => {
            metrics::record_seen_mark(match outcome {
                SeenOutcome::Marked => "marked",
                SeenOutcome::AlreadySeen => "already_seen",
                SeenOutcome::NotFound => "not_found",
            });
            Ok(Json(AckResponse::ok()))
        }
        Err(ChatError::NotFound(_)) => {
            debug!(viewer = %viewer, id = %id, "Mark for unknown message acknowledged");
            metrics::record_seen_mark("not_found");
            Ok(Json(AckResponse::ok()))
        }
        Err(e) => Err(e.into()),
    }
}
