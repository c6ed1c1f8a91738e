use std::collections::HashMap;

use uuid::Uuid;

use carols_types::api::MessageResponse;
use carols_types::models::{Thread, User};

/// Errors surfaced by a chat backend.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Rejected locally, before any request was made.
    #[error("{0}")]
    Validation(String),

    /// The backend answered with an error status.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// The request never completed.
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Adapter surface over the hosted store. The chat session talks only to
/// this trait; change notifications arrive separately, through the gateway.
#[allow(async_fn_in_trait)]
pub trait ChatBackend {
    async fn register_or_fetch(&self, username: &str) -> ClientResult<User>;

    async fn rename(&self, user_id: Uuid, new_username: &str) -> ClientResult<User>;

    async fn list_threads(&self) -> ClientResult<Vec<Thread>>;

    async fn create_thread(&self, name: &str, user_id: Uuid) -> ClientResult<Thread>;

    async fn delete_thread(&self, thread_id: Uuid) -> ClientResult<()>;

    async fn seed_default_threads(&self, user_id: Uuid) -> ClientResult<Vec<Thread>>;

    async fn list_messages(&self, thread_id: Uuid) -> ClientResult<Vec<MessageResponse>>;

    async fn send_message(
        &self,
        thread_id: Uuid,
        user_id: Uuid,
        content: &str,
    ) -> ClientResult<MessageResponse>;

    async fn mark_viewed(&self, user_id: Uuid, thread_id: Uuid) -> ClientResult<()>;

    async fn unread_counts(&self, user_id: Uuid) -> ClientResult<HashMap<Uuid, u64>>;
}
