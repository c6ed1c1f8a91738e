use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::info;
use uuid::Uuid;

use carols_db::models::ThreadRow;
use carols_db::now_timestamp;
use carols_types::api::{CreateThreadRequest, InitializeThreadsRequest, InitializeThreadsResponse};
use carols_types::events::GatewayEvent;
use carols_types::models::Thread;

use crate::error::{ApiError, ApiResult};
use crate::{AppState, parse_timestamp, parse_uuid};

/// Thread set seeded by an admin on an empty install: a General thread plus
/// the 2025 performers.
const DEFAULT_THREADS: [&str; 13] = [
    "General",
    "Tim Campbell",
    "Casey Donovan",
    "David Hobson",
    "Dami Im",
    "Andy Karl",
    "Elise McCann",
    "Rob Mills",
    "Silvie Paladino",
    "Paulini",
    "Michael Paynter",
    "Marina Prior",
    "Denis Walter",
];

pub async fn list_threads(State(state): State<AppState>) -> ApiResult<Json<Vec<Thread>>> {
    let rows = state.db.list_threads()?;
    Ok(Json(rows.into_iter().map(thread_from_row).collect()))
}

/// Insert one thread. Names are not deduplicated.
pub async fn create_thread(
    State(state): State<AppState>,
    Json(req): Json<CreateThreadRequest>,
) -> ApiResult<(StatusCode, Json<Thread>)> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::Validation("Thread name is required".to_string()));
    }

    let id = Uuid::new_v4();
    let created_at = now_timestamp();
    state.db.insert_thread(
        &id.to_string(),
        name,
        Some(&req.user_id.to_string()),
        &created_at,
    )?;

    let thread = Thread {
        id,
        name: name.to_string(),
        created_by: Some(req.user_id),
        created_at: parse_timestamp(&created_at),
    };

    broadcast_thread_create(&state, &thread);

    Ok((StatusCode::CREATED, Json(thread)))
}

/// Seed the default thread set. Admin-only, and refused once any thread
/// exists; the emptiness check and the inserts share one transaction, so
/// concurrent seed calls cannot interleave a partial batch.
pub async fn initialize_threads(
    State(state): State<AppState>,
    Json(req): Json<InitializeThreadsRequest>,
) -> ApiResult<Json<InitializeThreadsResponse>> {
    let caller = state.db.get_user_by_id(&req.user_id.to_string())?;
    if !caller.map(|u| u.is_admin).unwrap_or(false) {
        return Err(ApiError::Forbidden(
            "Only admins can initialize threads".to_string(),
        ));
    }

    let created_at = now_timestamp();
    let rows = state
        .db
        .seed_threads(&DEFAULT_THREADS, &req.user_id.to_string(), &created_at)?
        .ok_or_else(|| ApiError::Validation("Threads already exist".to_string()))?;

    let threads: Vec<Thread> = rows.into_iter().map(thread_from_row).collect();
    for thread in &threads {
        broadcast_thread_create(&state, thread);
    }

    info!("Seeded {} default threads", threads.len());

    Ok(Json(InitializeThreadsResponse {
        count: threads.len(),
        threads,
    }))
}

/// Remove a thread; the store cascades its messages and views away.
pub async fn delete_thread(
    State(state): State<AppState>,
    Path(thread_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    if !state.db.delete_thread(&thread_id.to_string())? {
        return Err(ApiError::NotFound(format!("Thread not found: {}", thread_id)));
    }

    state
        .dispatcher
        .broadcast(GatewayEvent::ThreadDelete { id: thread_id });

    Ok(Json(serde_json::json!({ "deleted": true })))
}

fn broadcast_thread_create(state: &AppState, thread: &Thread) {
    state.dispatcher.broadcast(GatewayEvent::ThreadCreate {
        id: thread.id,
        name: thread.name.clone(),
        created_by: thread.created_by,
        created_at: thread.created_at,
    });
}

pub(crate) fn thread_from_row(row: ThreadRow) -> Thread {
    Thread {
        id: parse_uuid(&row.id, "thread id"),
        name: row.name,
        created_by: row.created_by.as_deref().map(|id| parse_uuid(id, "created_by")),
        created_at: parse_timestamp(&row.created_at),
    }
}
