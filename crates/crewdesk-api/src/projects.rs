use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use tracing::error;

use crewdesk_types::api::{Claims, ProjectResponse};

use crate::auth::AppState;

/// Projects the caller belongs to, via project_members.
pub async fn list_projects(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let uid = claims.sub.to_string();
    let rows = tokio::task::spawn_blocking(move || db.list_projects_for_user(&uid))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let projects: Vec<ProjectResponse> = rows.into_iter().map(|r| r.into_response()).collect();
    Ok(Json(projects))
}
