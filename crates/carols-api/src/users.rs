use axum::{
    Json,
    extract::{Path, State},
};
use tracing::info;
use uuid::Uuid;

use carols_db::models::UserRow;
use carols_db::now_timestamp;
use carols_types::MIN_USERNAME_LENGTH;
use carols_types::api::{CreateUserRequest, UpdateUsernameRequest};
use carols_types::events::GatewayEvent;
use carols_types::models::User;

use crate::error::{ApiError, ApiResult};
use crate::{AppState, parse_timestamp, parse_uuid};

/// Look up a user by display name, creating the record on first sight.
/// Repeated calls with the same name return the same record. Concurrent
/// registration of the same name is only guarded by the UNIQUE column.
pub async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<Json<User>> {
    let username = validate_username(&req.username)?;

    if let Some(row) = state.db.get_user_by_username(username)? {
        return Ok(Json(user_from_row(row)));
    }

    let id = Uuid::new_v4();
    let created_at = now_timestamp();
    state
        .db
        .create_user(&id.to_string(), username, false, &created_at)?;

    info!("Registered user {} ({})", username, id);

    Ok(Json(User {
        id,
        username: username.to_string(),
        is_admin: false,
        created_at: parse_timestamp(&created_at),
    }))
}

/// Overwrite the display name. The admin flag is never touched here.
pub async fn update_username(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UpdateUsernameRequest>,
) -> ApiResult<Json<User>> {
    let username = validate_username(&req.new_username)?;

    if !state.db.update_username(&user_id.to_string(), username)? {
        return Err(ApiError::NotFound(format!("User not found: {}", user_id)));
    }

    let row = state
        .db
        .get_user_by_id(&user_id.to_string())?
        .ok_or_else(|| ApiError::NotFound(format!("User not found: {}", user_id)))?;

    // Live gateway sessions pick up the new name for presence and typing
    state.dispatcher.rename_user(user_id, username).await;
    state.dispatcher.broadcast(GatewayEvent::UserUpdate {
        id: user_id,
        username: username.to_string(),
    });

    Ok(Json(user_from_row(row)))
}

fn validate_username(raw: &str) -> Result<&str, ApiError> {
    let username = raw.trim();
    if username.chars().count() < MIN_USERNAME_LENGTH {
        return Err(ApiError::Validation(
            "Username must be at least 2 characters".to_string(),
        ));
    }
    Ok(username)
}

pub(crate) fn user_from_row(row: UserRow) -> User {
    User {
        id: parse_uuid(&row.id, "user id"),
        username: row.username,
        is_admin: row.is_admin,
        created_at: parse_timestamp(&row.created_at),
    }
}
