use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use tracing::error;
use uuid::Uuid;

use crewdesk_types::api::{Claims, MessageResponse, SendMessageRequest};
use crewdesk_types::events::GatewayEvent;
use crewdesk_types::models::email_domain;

use crate::auth::AppState;

/// Row-policy check shared by the message endpoints: the channel must exist
/// and its domain must match the caller's email domain.
async fn authorize_channel(
    state: &AppState,
    channel_id: Uuid,
    claims: &Claims,
) -> Result<(), StatusCode> {
    let domain = email_domain(&claims.email).ok_or(StatusCode::BAD_REQUEST)?;

    let db = state.db.clone();
    let cid = channel_id.to_string();
    let channel = tokio::task::spawn_blocking(move || db.get_channel(&cid))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    if channel.domain != domain {
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(())
}

/// Full channel history, ascending by creation time, each message carrying
/// the author's joined display name and avatar.
pub async fn get_messages(
    State(state): State<AppState>,
    Path(channel_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    authorize_channel(&state, channel_id, &claims).await?;

    let db = state.db.clone();
    let cid = channel_id.to_string();
    let rows = tokio::task::spawn_blocking(move || db.get_channel_messages(&cid))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let messages: Vec<MessageResponse> = rows.into_iter().map(|r| r.into_response()).collect();
    Ok(Json(messages))
}

pub async fn send_message(
    State(state): State<AppState>,
    Path(channel_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    // Whitespace-only content never reaches the store.
    if req.content.trim().is_empty() {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }

    authorize_channel(&state, channel_id, &claims).await?;

    let message_id = Uuid::new_v4();
    let now = chrono::Utc::now();

    // Insert, then point-lookup the author profile for the avatar that rides
    // on the realtime event. The generated timestamp is written to the row,
    // so history later serves exactly what the live event carried.
    let db = state.db.clone();
    let cid = channel_id.to_string();
    let mid = message_id.to_string();
    let aid = claims.sub.to_string();
    let content = req.content.clone();
    let stored_at = now.to_rfc3339();
    let author = tokio::task::spawn_blocking(move || {
        db.insert_message(&mid, &cid, &aid, &content, &stored_at)?;
        db.get_profile_by_id(&aid)
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let author_avatar_url = author.and_then(|p| p.avatar_url);

    // Broadcast to all WebSocket clients watching this channel
    state.dispatcher.broadcast(GatewayEvent::MessageCreate {
        id: message_id,
        channel_id,
        author_id: claims.sub,
        author_name: claims.name.clone(),
        author_avatar_url: author_avatar_url.clone(),
        content: req.content.clone(),
        timestamp: now,
    });

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            id: message_id,
            channel_id,
            author_id: claims.sub,
            author_name: claims.name.clone(),
            author_avatar_url,
            content: req.content,
            created_at: now,
        }),
    ))
}
