use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use tracing::{error, info};
use uuid::Uuid;

use crewdesk_types::api::{ChannelResponse, Claims, CreateChannelRequest};
use crewdesk_types::models::email_domain;

use crate::auth::AppState;

/// Create a channel. The tenant domain is derived from the caller's verified
/// email. A client may echo it back but can never submit a different one.
pub async fn create_channel(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateChannelRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if req.name.trim().is_empty() || req.name.len() > 80 {
        return Err(StatusCode::BAD_REQUEST);
    }

    let domain = email_domain(&claims.email).ok_or(StatusCode::BAD_REQUEST)?;
    if let Some(submitted) = &req.domain {
        if submitted.to_ascii_lowercase() != domain {
            info!(
                "{} ({}) rejected: submitted domain '{}' != '{}'",
                claims.name, claims.sub, submitted, domain
            );
            return Err(StatusCode::FORBIDDEN);
        }
    }

    let channel_id = Uuid::new_v4();
    let created_at = chrono::Utc::now();

    let db = state.db.clone();
    let id = channel_id.to_string();
    let name = req.name.clone();
    let dom = domain.clone();
    let creator = claims.sub.to_string();
    let stored_at = created_at.to_rfc3339();
    tokio::task::spawn_blocking(move || db.create_channel(&id, &name, &dom, &creator, &stored_at))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok((
        StatusCode::CREATED,
        Json(ChannelResponse {
            id: channel_id,
            name: req.name,
            domain,
            created_by: claims.sub,
            created_at,
        }),
    ))
}

/// All channels visible to the caller: those sharing the caller's email
/// domain. An empty list is indistinguishable from "none exist".
pub async fn list_channels(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let domain = email_domain(&claims.email).ok_or(StatusCode::BAD_REQUEST)?;

    let db = state.db.clone();
    let rows = tokio::task::spawn_blocking(move || db.list_channels_for_domain(&domain))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let channels: Vec<ChannelResponse> = rows.into_iter().map(|r| r.into_response()).collect();
    Ok(Json(channels))
}
