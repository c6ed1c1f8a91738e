use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::error;
use uuid::Uuid;

use carols_db::now_timestamp;
use carols_types::api::{MarkViewedRequest, UnreadCount};

use crate::error::{ApiError, ApiResult};
use crate::{AppState, parse_uuid};

/// Record that a user has the thread open right now. Repeated calls
/// overwrite the bookmark; the timestamp only ever moves forward in
/// practice because each call stamps the current time.
pub async fn mark_viewed(
    State(state): State<AppState>,
    Path(thread_id): Path<Uuid>,
    Json(req): Json<MarkViewedRequest>,
) -> ApiResult<StatusCode> {
    state.db.upsert_thread_view(
        &req.user_id.to_string(),
        &thread_id.to_string(),
        &now_timestamp(),
    )?;

    Ok(StatusCode::NO_CONTENT)
}

/// Per-thread unread counts for a user, computed independently per thread
/// against its last-viewed bookmark.
pub async fn unread_counts(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Vec<UnreadCount>>> {
    let db = state.db.clone();
    let uid = user_id.to_string();
    let counts = tokio::task::spawn_blocking(move || {
        let threads = db.list_threads()?;
        let thread_ids: Vec<String> = threads.into_iter().map(|t| t.id).collect();
        db.unread_counts(&uid, &thread_ids)
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Store(anyhow::anyhow!("join error: {}", e))
    })??;

    Ok(Json(
        counts
            .into_iter()
            .map(|(thread_id, unread)| UnreadCount {
                thread_id: parse_uuid(&thread_id, "thread_id"),
                unread,
            })
            .collect(),
    ))
}
