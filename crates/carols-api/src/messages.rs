use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::error;
use uuid::Uuid;

use carols_db::models::MessageRow;
use carols_db::now_timestamp;
use carols_types::MAX_MESSAGE_LENGTH;
use carols_types::api::{MessageResponse, SendMessageRequest};
use carols_types::events::GatewayEvent;

use crate::error::{ApiError, ApiResult};
use crate::{AppState, parse_timestamp, parse_uuid};

pub async fn get_messages(
    State(state): State<AppState>,
    Path(thread_id): Path<Uuid>,
) -> ApiResult<Json<Vec<MessageResponse>>> {
    // Run the blocking list query off the async runtime
    let db = state.db.clone();
    let tid = thread_id.to_string();
    let rows = tokio::task::spawn_blocking(move || db.get_messages(&tid))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Store(anyhow::anyhow!("join error: {}", e))
        })??;

    Ok(Json(rows.into_iter().map(message_from_row).collect()))
}

/// Append one message. Content is validated before any store call; there is
/// no edit or retract counterpart.
pub async fn send_message(
    State(state): State<AppState>,
    Path(thread_id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    let content = req.content.trim();
    if content.is_empty() {
        return Err(ApiError::Validation("Message cannot be empty".to_string()));
    }
    if content.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(ApiError::Validation(format!(
            "Message is too long (max {} characters)",
            MAX_MESSAGE_LENGTH
        )));
    }

    let author = state
        .db
        .get_user_by_id(&req.user_id.to_string())?
        .ok_or_else(|| ApiError::NotFound(format!("User not found: {}", req.user_id)))?;

    let id = Uuid::new_v4();
    let created_at = now_timestamp();
    state.db.insert_message(
        &id.to_string(),
        &thread_id.to_string(),
        &req.user_id.to_string(),
        content,
        &created_at,
    )?;

    let response = MessageResponse {
        id,
        thread_id,
        user_id: req.user_id,
        author_username: author.username.clone(),
        content: content.to_string(),
        created_at: parse_timestamp(&created_at),
    };

    // Fan out to all connected clients
    state.dispatcher.broadcast(GatewayEvent::MessageCreate {
        id,
        thread_id,
        user_id: req.user_id,
        author_username: author.username,
        content: content.to_string(),
        created_at: response.created_at,
    });

    Ok((StatusCode::CREATED, Json(response)))
}

fn message_from_row(row: MessageRow) -> MessageResponse {
    MessageResponse {
        id: parse_uuid(&row.id, "message id"),
        thread_id: parse_uuid(&row.thread_id, "thread_id"),
        user_id: parse_uuid(&row.user_id, "user_id"),
        author_username: row.author_username,
        content: row.content,
        created_at: parse_timestamp(&row.created_at),
    }
}
