use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events sent over the WebSocket gateway: one variant per row change the
/// store notifies about, plus the ephemeral presence/typing signals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms the Identify handshake. The admin flag is freshly
    /// read from the store, not taken from any client-side cache.
    Ready {
        user_id: Uuid,
        username: String,
        is_admin: bool,
    },

    /// A thread was inserted
    ThreadCreate {
        id: Uuid,
        name: String,
        created_by: Option<Uuid>,
        created_at: DateTime<Utc>,
    },

    /// A thread was deleted (its messages cascade away with it)
    ThreadDelete { id: Uuid },

    /// A new message was posted
    MessageCreate {
        id: Uuid,
        thread_id: Uuid,
        user_id: Uuid,
        author_username: String,
        content: String,
        created_at: DateTime<Utc>,
    },

    /// A user changed their display name
    UserUpdate { id: Uuid, username: String },

    /// A user started typing in a thread
    TypingStart {
        thread_id: Uuid,
        user_id: Uuid,
        username: String,
    },

    /// A user stopped typing in a thread
    TypingStop {
        thread_id: Uuid,
        user_id: Uuid,
        username: String,
    },

    /// A user came online or went offline
    PresenceUpdate {
        user_id: Uuid,
        username: String,
        online: bool,
    },
}

impl GatewayEvent {
    /// Returns the thread id if this event is scoped to a specific thread.
    /// Events that return `None` are global.
    pub fn thread_id(&self) -> Option<Uuid> {
        match self {
            Self::MessageCreate { thread_id, .. } => Some(*thread_id),
            Self::TypingStart { thread_id, .. } => Some(*thread_id),
            Self::TypingStop { thread_id, .. } => Some(*thread_id),
            // Ready, thread list changes, renames and presence are global
            _ => None,
        }
    }
}

/// Commands sent FROM client TO server over the WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Bind the connection to a registered user
    Identify { user_id: Uuid },

    /// Indicate typing in a thread
    TypingStart { thread_id: Uuid },

    /// Explicitly stop the typing indicator
    TypingStop { thread_id: Uuid },
}
