pub mod error;
pub mod messages;
pub mod threads;
pub mod users;
pub mod views;

use std::sync::Arc;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::{delete, get, post},
};
use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use carols_db::Database;
use carols_gateway::{connection, dispatcher::Dispatcher};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub dispatcher: Dispatcher,
}

/// Assemble the application router: the REST surface plus the WebSocket
/// gateway. Middleware layers (CORS, tracing) are applied by the binary.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/users", post(users::create_user))
        .route("/users/{user_id}/username", post(users::update_username))
        .route("/users/{user_id}/unread", get(views::unread_counts))
        .route("/threads", get(threads::list_threads).post(threads::create_thread))
        .route("/threads/initialize", post(threads::initialize_threads))
        .route("/threads/{thread_id}", delete(threads::delete_thread))
        .route(
            "/threads/{thread_id}/messages",
            get(messages::get_messages).post(messages::send_message),
        )
        .route("/threads/{thread_id}/views", post(views::mark_viewed))
        .route("/gateway", get(ws_upgrade))
        .with_state(state)
}

async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        connection::handle_connection(socket, state.dispatcher.clone(), state.db.clone())
    })
}

/// Parse a stored timestamp. Rows written by this app are RFC3339; rows
/// created through SQLite's own datetime('now') default are naive UTC.
pub(crate) fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}

pub(crate) fn parse_uuid(raw: &str, field: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", field, raw, e);
        Uuid::default()
    })
}
