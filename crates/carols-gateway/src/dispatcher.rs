use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};
use uuid::Uuid;

use carols_types::events::GatewayEvent;

/// A live gateway connection bound to a user.
#[derive(Debug, Clone)]
struct Session {
    user_id: Uuid,
    username: String,
}

/// Manages connected sessions and broadcasts events to all of them.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Broadcast channel for gateway events — every connected client
    /// receives every event
    broadcast_tx: broadcast::Sender<GatewayEvent>,

    /// Live sessions keyed by connection id. A user may hold several
    /// sessions (tabs); the online set is the deduplicated union.
    sessions: RwLock<HashMap<Uuid, Session>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                sessions: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Subscribe to gateway events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Broadcast an event to all connected clients.
    pub fn broadcast(&self, event: GatewayEvent) {
        let _ = self.inner.broadcast_tx.send(event);
    }

    /// Register a session. Broadcasts a presence update when this is the
    /// user's first live session. Returns the connection id.
    pub async fn session_online(&self, user_id: Uuid, username: String) -> Uuid {
        let conn_id = Uuid::new_v4();
        let first = {
            let mut sessions = self.inner.sessions.write().await;
            let first = !sessions.values().any(|s| s.user_id == user_id);
            sessions.insert(
                conn_id,
                Session {
                    user_id,
                    username: username.clone(),
                },
            );
            first
        };

        if first {
            self.broadcast(GatewayEvent::PresenceUpdate {
                user_id,
                username,
                online: true,
            });
        }

        conn_id
    }

    /// Drop a session. Broadcasts offline once the user's last session is
    /// gone.
    pub async fn session_offline(&self, conn_id: Uuid) {
        let departed = {
            let mut sessions = self.inner.sessions.write().await;
            let Some(session) = sessions.remove(&conn_id) else {
                return;
            };
            let last = !sessions.values().any(|s| s.user_id == session.user_id);
            last.then_some(session)
        };

        if let Some(session) = departed {
            self.broadcast(GatewayEvent::PresenceUpdate {
                user_id: session.user_id,
                username: session.username,
                online: false,
            });
        }
    }

    /// Current online users, one entry per user id.
    pub async fn online_users(&self) -> Vec<(Uuid, String)> {
        let sessions = self.inner.sessions.read().await;
        let mut users: HashMap<Uuid, String> = HashMap::new();
        for session in sessions.values() {
            users
                .entry(session.user_id)
                .or_insert_with(|| session.username.clone());
        }
        users.into_iter().collect()
    }

    /// Propagate a rename into live sessions so presence and typing events
    /// carry the new name.
    pub async fn rename_user(&self, user_id: Uuid, username: &str) {
        let mut sessions = self.inner.sessions.write().await;
        for session in sessions.values_mut() {
            if session.user_id == user_id {
                session.username = username.to_string();
            }
        }
    }
}
