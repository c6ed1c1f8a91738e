use std::time::Instant;

use tracing::warn;
use uuid::Uuid;

use carols_types::api::MessageResponse;
use carols_types::events::GatewayEvent;
use carols_types::models::{Thread, User};
use carols_types::{MAX_MESSAGE_LENGTH, MIN_USERNAME_LENGTH};

use crate::backend::{ChatBackend, ClientError, ClientResult};
use crate::presence::PresenceRoster;
use crate::typing::{TypingDebounce, TypingRoster};
use crate::unread::UnreadTracker;

/// Which panel the single-panel (mobile) layout shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel {
    Threads,
    Conversation,
}

/// Outbound typing broadcast produced by the session; the transport layer
/// forwards it to the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypingBroadcast {
    pub thread_id: Uuid,
    pub signal: crate::typing::TypingSignal,
}

/// Page-level chat state: thread list, selection, loaded messages, and the
/// derived unread/typing/presence state. Change notifications drive
/// re-queries of the backend; user actions call the backend and rely on the
/// notification loop to reflect the result.
pub struct ChatSession<B: ChatBackend> {
    backend: B,
    user: User,
    pub threads: Vec<Thread>,
    pub selected: Option<Uuid>,
    pub messages: Vec<MessageResponse>,
    pub panel: Panel,
    pub threads_loading: bool,
    pub messages_loading: bool,
    /// Dismissible banner for thread/message load failures.
    pub error_banner: Option<String>,
    pub unread: UnreadTracker,
    pub typing: TypingRoster,
    pub presence: PresenceRoster,
    compose: TypingDebounce,
    outbox: Vec<TypingBroadcast>,
}

impl<B: ChatBackend> ChatSession<B> {
    /// Register (or fetch) the user, load the thread list, and select the
    /// first thread. The thread list stays visible after the initial
    /// auto-selection.
    pub async fn start(backend: B, username: &str) -> ClientResult<Self> {
        let trimmed = username.trim();
        if trimmed.chars().count() < MIN_USERNAME_LENGTH {
            return Err(ClientError::Validation(
                "Username must be at least 2 characters".to_string(),
            ));
        }

        let user = backend.register_or_fetch(trimmed).await?;

        let mut session = Self {
            backend,
            user,
            threads: Vec::new(),
            selected: None,
            messages: Vec::new(),
            panel: Panel::Threads,
            threads_loading: false,
            messages_loading: false,
            error_banner: None,
            unread: UnreadTracker::new(),
            typing: TypingRoster::new(),
            presence: PresenceRoster::new(),
            compose: TypingDebounce::new(),
            outbox: Vec::new(),
        };

        session.refresh_threads().await;
        if let Some(first) = session.threads.first().map(|t| t.id) {
            session.select_thread(first).await;
            session.panel = Panel::Threads;
        }

        Ok(session)
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn selected_thread(&self) -> Option<&Thread> {
        self.selected
            .and_then(|id| self.threads.iter().find(|t| t.id == id))
    }

    /// Typing broadcasts produced since the last drain.
    pub fn drain_outbox(&mut self) -> Vec<TypingBroadcast> {
        std::mem::take(&mut self.outbox)
    }

    /// Re-query the thread list and the unread counters. A load failure
    /// surfaces on the banner and keeps the existing state.
    pub async fn refresh_threads(&mut self) {
        self.threads_loading = true;
        self.error_banner = None;

        match self.backend.list_threads().await {
            Ok(threads) => {
                self.threads = threads;
                match self.backend.unread_counts(self.user.id).await {
                    Ok(counts) => self.unread.replace(counts),
                    Err(e) => warn!("Failed to load unread counts: {}", e),
                }
            }
            Err(e) => {
                warn!("Failed to load threads: {}", e);
                self.error_banner =
                    Some("Failed to load threads. Please check your connection.".to_string());
            }
        }

        self.threads_loading = false;
    }

    /// Select a thread: tear down the previous thread's typing state, load
    /// messages, record the view, and switch to the conversation panel.
    pub async fn select_thread(&mut self, thread_id: Uuid) {
        if let Some(previous) = self.selected {
            self.typing.clear_thread(previous);
        }
        self.compose.reset();

        self.selected = Some(thread_id);
        self.panel = Panel::Conversation;
        self.reload_messages().await;

        if let Err(e) = self.backend.mark_viewed(self.user.id, thread_id).await {
            warn!("Failed to mark thread viewed: {}", e);
        }
        self.unread.mark_viewed(thread_id);
    }

    async fn reload_messages(&mut self) {
        let Some(thread_id) = self.selected else {
            return;
        };

        self.messages_loading = true;
        self.error_banner = None;

        match self.backend.list_messages(thread_id).await {
            Ok(messages) => self.messages = messages,
            Err(e) => {
                warn!("Failed to load messages: {}", e);
                self.error_banner =
                    Some("Failed to load messages. Please check your connection.".to_string());
            }
        }

        self.messages_loading = false;
    }

    /// Back to the thread list (mobile single-panel layout).
    pub fn back_to_threads(&mut self) {
        self.panel = Panel::Threads;
    }

    pub fn dismiss_error(&mut self) {
        self.error_banner = None;
    }

    /// A keystroke in the composer.
    pub fn on_keystroke(&mut self, now: Instant) {
        let Some(thread_id) = self.selected else {
            return;
        };
        if let Some(signal) = self.compose.keystroke(now) {
            self.outbox.push(TypingBroadcast { thread_id, signal });
        }
    }

    /// Send the composed message. The local list is not updated here: the
    /// MessageCreate notification triggers the reload that shows it, so
    /// perceived latency is the notification round trip.
    pub async fn send_message(&mut self, content: &str) -> ClientResult<()> {
        let Some(thread_id) = self.selected else {
            return Err(ClientError::Validation("No thread selected".to_string()));
        };

        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(ClientError::Validation("Message cannot be empty".to_string()));
        }
        if trimmed.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(ClientError::Validation(format!(
                "Message is too long (max {} characters)",
                MAX_MESSAGE_LENGTH
            )));
        }

        self.outbox.push(TypingBroadcast {
            thread_id,
            signal: self.compose.submit(),
        });

        self.backend.send_message(thread_id, self.user.id, trimmed).await?;
        Ok(())
    }

    /// Create a thread; the list refreshes via the change notification.
    pub async fn create_thread(&mut self, name: &str) -> ClientResult<Thread> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(ClientError::Validation("Thread name is required".to_string()));
        }
        self.backend.create_thread(trimmed, self.user.id).await
    }

    /// Delete a thread. Fallback selection happens when the ThreadDelete
    /// notification comes back around.
    pub async fn delete_thread(&mut self, thread_id: Uuid) -> ClientResult<()> {
        self.backend.delete_thread(thread_id).await
    }

    pub async fn seed_default_threads(&mut self) -> ClientResult<usize> {
        let threads = self.backend.seed_default_threads(self.user.id).await?;
        Ok(threads.len())
    }

    /// Change the display name; other sessions learn about it through the
    /// UserUpdate notification.
    pub async fn rename(&mut self, new_username: &str) -> ClientResult<()> {
        let trimmed = new_username.trim();
        if trimmed.chars().count() < MIN_USERNAME_LENGTH {
            return Err(ClientError::Validation(
                "Username must be at least 2 characters".to_string(),
            ));
        }
        let user = self.backend.rename(self.user.id, trimmed).await?;
        self.user.username = user.username;
        Ok(())
    }

    /// Apply a change notification from the gateway. Store-table events
    /// trigger a re-query of the affected adapter; ephemeral events update
    /// local state directly. Duplicate notifications only cause idempotent
    /// re-fetches.
    pub async fn handle_event(&mut self, event: GatewayEvent, now: Instant) {
        match event {
            GatewayEvent::Ready { .. } => {}

            GatewayEvent::ThreadCreate { .. } => {
                self.refresh_threads().await;
                if self.selected.is_none() {
                    if let Some(first) = self.threads.first().map(|t| t.id) {
                        self.select_thread(first).await;
                        self.panel = Panel::Threads;
                    }
                }
            }

            GatewayEvent::ThreadDelete { id } => {
                self.typing.clear_thread(id);
                self.unread.remove_thread(id);
                self.refresh_threads().await;

                if self.selected == Some(id) {
                    self.selected = None;
                    self.messages.clear();
                    self.panel = Panel::Threads;
                    if let Some(first) = self.threads.first().map(|t| t.id) {
                        self.select_thread(first).await;
                        self.panel = Panel::Threads;
                    }
                }
            }

            GatewayEvent::MessageCreate {
                thread_id, user_id, ..
            } => {
                if self.selected == Some(thread_id) {
                    self.reload_messages().await;
                }
                self.unread.on_message(thread_id, user_id, self.user.id);
            }

            GatewayEvent::UserUpdate { id, username } => {
                self.presence.rename(id, &username);
                if id == self.user.id {
                    self.user.username = username;
                }
            }

            GatewayEvent::TypingStart {
                thread_id,
                user_id,
                username,
            } => {
                // the gateway echoes our own typing back to us
                if user_id != self.user.id {
                    self.typing.apply_start(thread_id, &username, now);
                }
            }

            GatewayEvent::TypingStop {
                thread_id,
                user_id,
                username,
            } => {
                if user_id != self.user.id {
                    self.typing.apply_stop(thread_id, &username);
                }
            }

            GatewayEvent::PresenceUpdate {
                user_id,
                username,
                online,
            } => {
                self.presence.apply(user_id, &username, online);
            }
        }
    }

    /// Periodic timer sweep: typing expiries plus the composer idle
    /// timeout.
    pub fn tick(&mut self, now: Instant) {
        self.typing.expire(now);

        let timed_out = self.compose.poll(now);
        if let (Some(thread_id), Some(signal)) = (self.selected, timed_out) {
            self.outbox.push(TypingBroadcast { thread_id, signal });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typing::{TYPING_EXPIRY, TYPING_IDLE_TIMEOUT, TypingSignal};
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// In-memory stand-in for the hosted store. Shared between the session
    /// under test and the test body, which plays the role of the platform.
    #[derive(Clone, Default)]
    struct MockBackend {
        state: Arc<Mutex<MockState>>,
    }

    #[derive(Default)]
    struct MockState {
        users: Vec<User>,
        threads: Vec<Thread>,
        messages: Vec<MessageResponse>,
        unread: HashMap<Uuid, u64>,
        viewed: Vec<(Uuid, Uuid)>,
    }

    impl MockBackend {
        fn add_thread(&self, name: &str) -> Thread {
            let thread = Thread {
                id: Uuid::new_v4(),
                name: name.to_string(),
                created_by: None,
                created_at: Utc::now(),
            };
            self.state.lock().unwrap().threads.push(thread.clone());
            thread
        }

        fn add_message(&self, thread_id: Uuid, user_id: Uuid, author: &str, content: &str) -> MessageResponse {
            let message = MessageResponse {
                id: Uuid::new_v4(),
                thread_id,
                user_id,
                author_username: author.to_string(),
                content: content.to_string(),
                created_at: Utc::now(),
            };
            self.state.lock().unwrap().messages.push(message.clone());
            message
        }

        fn remove_thread(&self, thread_id: Uuid) {
            let mut state = self.state.lock().unwrap();
            state.threads.retain(|t| t.id != thread_id);
            state.messages.retain(|m| m.thread_id != thread_id);
        }

        fn viewed(&self) -> Vec<(Uuid, Uuid)> {
            self.state.lock().unwrap().viewed.clone()
        }
    }

    impl ChatBackend for MockBackend {
        async fn register_or_fetch(&self, username: &str) -> ClientResult<User> {
            let mut state = self.state.lock().unwrap();
            if let Some(user) = state.users.iter().find(|u| u.username == username) {
                return Ok(user.clone());
            }
            let user = User {
                id: Uuid::new_v4(),
                username: username.to_string(),
                is_admin: false,
                created_at: Utc::now(),
            };
            state.users.push(user.clone());
            Ok(user)
        }

        async fn rename(&self, user_id: Uuid, new_username: &str) -> ClientResult<User> {
            let mut state = self.state.lock().unwrap();
            let user = state
                .users
                .iter_mut()
                .find(|u| u.id == user_id)
                .ok_or_else(|| ClientError::Api {
                    status: 404,
                    message: "User not found".to_string(),
                })?;
            user.username = new_username.to_string();
            Ok(user.clone())
        }

        async fn list_threads(&self) -> ClientResult<Vec<Thread>> {
            Ok(self.state.lock().unwrap().threads.clone())
        }

        async fn create_thread(&self, name: &str, _user_id: Uuid) -> ClientResult<Thread> {
            Ok(self.add_thread(name))
        }

        async fn delete_thread(&self, thread_id: Uuid) -> ClientResult<()> {
            self.remove_thread(thread_id);
            Ok(())
        }

        async fn seed_default_threads(&self, _user_id: Uuid) -> ClientResult<Vec<Thread>> {
            Ok(vec![self.add_thread("General")])
        }

        async fn list_messages(&self, thread_id: Uuid) -> ClientResult<Vec<MessageResponse>> {
            Ok(self
                .state
                .lock()
                .unwrap()
                .messages
                .iter()
                .filter(|m| m.thread_id == thread_id)
                .cloned()
                .collect())
        }

        async fn send_message(
            &self,
            thread_id: Uuid,
            user_id: Uuid,
            content: &str,
        ) -> ClientResult<MessageResponse> {
            Ok(self.add_message(thread_id, user_id, "me", content))
        }

        async fn mark_viewed(&self, user_id: Uuid, thread_id: Uuid) -> ClientResult<()> {
            self.state.lock().unwrap().viewed.push((user_id, thread_id));
            Ok(())
        }

        async fn unread_counts(&self, _user_id: Uuid) -> ClientResult<HashMap<Uuid, u64>> {
            Ok(self.state.lock().unwrap().unread.clone())
        }
    }

    fn message_event(thread_id: Uuid, user_id: Uuid, content: &str) -> GatewayEvent {
        GatewayEvent::MessageCreate {
            id: Uuid::new_v4(),
            thread_id,
            user_id,
            author_username: "someone".to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn start_selects_the_first_thread_and_marks_it_viewed() {
        let backend = MockBackend::default();
        let general = backend.add_thread("General");
        backend.add_thread("Marina Prior");

        let session = ChatSession::start(backend.clone(), "carol").await.unwrap();

        assert_eq!(session.selected, Some(general.id));
        assert_eq!(session.panel, Panel::Threads);
        assert_eq!(backend.viewed().len(), 1);
        assert_eq!(backend.viewed()[0].1, general.id);
    }

    #[tokio::test]
    async fn short_usernames_are_rejected_before_any_request() {
        let backend = MockBackend::default();
        let err = ChatSession::start(backend.clone(), " x ").await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
        assert!(backend.state.lock().unwrap().users.is_empty());
    }

    #[tokio::test]
    async fn sent_messages_appear_only_via_the_change_notification() {
        let backend = MockBackend::default();
        let general = backend.add_thread("General");
        let mut session = ChatSession::start(backend.clone(), "carol").await.unwrap();
        let me = session.user().id;

        session.send_message("hello everyone").await.unwrap();

        // not locally appended
        assert!(session.messages.is_empty());
        // the submit always broadcasts a typing stop
        let outbox = session.drain_outbox();
        assert_eq!(outbox, vec![TypingBroadcast { thread_id: general.id, signal: TypingSignal::Stop }]);

        // the notification triggers the reload that shows it
        session
            .handle_event(message_event(general.id, me, "hello everyone"), Instant::now())
            .await;
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.messages[0].content, "hello everyone");
        // own messages never count as unread
        assert_eq!(session.unread.count(general.id), 0);
    }

    #[tokio::test]
    async fn oversized_and_blank_messages_are_rejected_locally() {
        let backend = MockBackend::default();
        backend.add_thread("General");
        let mut session = ChatSession::start(backend.clone(), "carol").await.unwrap();

        let too_long = "x".repeat(1001);
        assert!(matches!(
            session.send_message(&too_long).await,
            Err(ClientError::Validation(_))
        ));
        assert!(matches!(
            session.send_message("   ").await,
            Err(ClientError::Validation(_))
        ));
        assert!(backend.state.lock().unwrap().messages.is_empty());

        let max = "x".repeat(1000);
        session.send_message(&max).await.unwrap();
        assert_eq!(backend.state.lock().unwrap().messages.len(), 1);
    }

    #[tokio::test]
    async fn messages_from_others_increment_unread_even_in_the_open_thread() {
        let backend = MockBackend::default();
        let general = backend.add_thread("General");
        let other_thread = backend.add_thread("Dami Im");
        let mut session = ChatSession::start(backend.clone(), "carol").await.unwrap();
        let stranger = Uuid::new_v4();

        // open thread: the list reloads and the counter still bumps
        backend.add_message(general.id, stranger, "dami", "hi");
        session
            .handle_event(message_event(general.id, stranger, "hi"), Instant::now())
            .await;
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.unread.count(general.id), 1);

        // closed thread: counter bumps without loading anything
        session
            .handle_event(message_event(other_thread.id, stranger, "psst"), Instant::now())
            .await;
        assert_eq!(session.unread.count(other_thread.id), 1);

        // re-selecting the open thread clears its badge
        session.select_thread(general.id).await;
        assert_eq!(session.unread.count(general.id), 0);
    }

    #[tokio::test]
    async fn deleting_the_selected_thread_falls_back_to_the_first_remaining() {
        let backend = MockBackend::default();
        let general = backend.add_thread("General");
        let second = backend.add_thread("Rob Mills");
        let mut session = ChatSession::start(backend.clone(), "carol").await.unwrap();
        assert_eq!(session.selected, Some(general.id));

        backend.remove_thread(general.id);
        session
            .handle_event(GatewayEvent::ThreadDelete { id: general.id }, Instant::now())
            .await;
        assert_eq!(session.selected, Some(second.id));

        backend.remove_thread(second.id);
        session
            .handle_event(GatewayEvent::ThreadDelete { id: second.id }, Instant::now())
            .await;
        assert_eq!(session.selected, None);
        assert!(session.messages.is_empty());
    }

    #[tokio::test]
    async fn composer_debounce_and_typing_roster() {
        let backend = MockBackend::default();
        let general = backend.add_thread("General");
        let mut session = ChatSession::start(backend.clone(), "carol").await.unwrap();
        let me = session.user().id;
        let t0 = Instant::now();

        // one start per idle window
        session.on_keystroke(t0);
        session.on_keystroke(t0 + Duration::from_secs(1));
        assert_eq!(
            session.drain_outbox(),
            vec![TypingBroadcast { thread_id: general.id, signal: TypingSignal::Start }]
        );

        // idle timeout broadcasts the stop
        session.tick(t0 + Duration::from_secs(1) + TYPING_IDLE_TIMEOUT);
        assert_eq!(
            session.drain_outbox(),
            vec![TypingBroadcast { thread_id: general.id, signal: TypingSignal::Stop }]
        );

        // another user's typing shows up, then expires on its own
        let stranger = Uuid::new_v4();
        session
            .handle_event(
                GatewayEvent::TypingStart {
                    thread_id: general.id,
                    user_id: stranger,
                    username: "tim".to_string(),
                },
                t0,
            )
            .await;
        assert_eq!(session.typing.typing_in(general.id), vec!["tim"]);

        session.tick(t0 + TYPING_EXPIRY);
        assert!(session.typing.typing_in(general.id).is_empty());

        // our own echoed typing events are ignored
        session
            .handle_event(
                GatewayEvent::TypingStart {
                    thread_id: general.id,
                    user_id: me,
                    username: "carol".to_string(),
                },
                t0,
            )
            .await;
        assert!(session.typing.typing_in(general.id).is_empty());
    }

    #[tokio::test]
    async fn presence_updates_and_renames_flow_into_the_roster() {
        let backend = MockBackend::default();
        backend.add_thread("General");
        let mut session = ChatSession::start(backend.clone(), "carol").await.unwrap();
        let tim = Uuid::new_v4();
        let now = Instant::now();

        session
            .handle_event(
                GatewayEvent::PresenceUpdate {
                    user_id: tim,
                    username: "tim".to_string(),
                    online: true,
                },
                now,
            )
            .await;
        assert_eq!(session.presence.names(), vec!["tim"]);

        session
            .handle_event(
                GatewayEvent::UserUpdate {
                    id: tim,
                    username: "timothy".to_string(),
                },
                now,
            )
            .await;
        assert_eq!(session.presence.names(), vec!["timothy"]);

        session
            .handle_event(
                GatewayEvent::PresenceUpdate {
                    user_id: tim,
                    username: "timothy".to_string(),
                    online: false,
                },
                now,
            )
            .await;
        assert!(session.presence.names().is_empty());
    }
}
