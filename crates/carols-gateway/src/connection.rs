use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use carols_db::Database;
use carols_types::events::{GatewayCommand, GatewayEvent};

use crate::dispatcher::Dispatcher;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// How long a client gets to send Identify before the socket is closed.
const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle a single WebSocket connection: Identify handshake, Ready reply
/// with the freshly stored user record, presence replay, then the relay
/// loop.
pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher, db: Arc<Database>) {
    let (mut sender, mut receiver) = socket.split();

    // Step 1: wait for Identify with the client's user id
    let Some(user_id) = wait_for_identify(&mut receiver).await else {
        warn!("WebSocket client failed to identify, closing");
        return;
    };

    // Step 2: the stored record is authoritative for name and admin flag,
    // not whatever the client has cached
    let user = match db.get_user_by_id(&user_id.to_string()) {
        Ok(Some(user)) => user,
        Ok(None) => {
            warn!("Identify for unknown user {}", user_id);
            return;
        }
        Err(e) => {
            warn!("User lookup failed during identify: {}", e);
            return;
        }
    };
    let username = user.username.clone();

    let ready = GatewayEvent::Ready {
        user_id,
        username: username.clone(),
        is_admin: user.is_admin,
    };
    if sender
        .send(Message::Text(serde_json::to_string(&ready).unwrap().into()))
        .await
        .is_err()
    {
        return;
    }

    info!("{} ({}) connected to gateway", username, user_id);

    // Send existing online users to this client so they see who's already here
    let existing = dispatcher.online_users().await;
    for (uid, uname) in &existing {
        let event = GatewayEvent::PresenceUpdate {
            user_id: *uid,
            username: uname.clone(),
            online: true,
        };
        if sender
            .send(Message::Text(serde_json::to_string(&event).unwrap().into()))
            .await
            .is_err()
        {
            return;
        }
    }

    // Now go online (broadcasts to everyone else when this is the user's
    // first session)
    let conn_id = dispatcher.session_online(user_id, username.clone()).await;

    let mut broadcast_rx = dispatcher.subscribe();
    let dispatcher_recv = dispatcher.clone();

    // Shared flag for heartbeat
    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward broadcasts to this client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = broadcast_rx.recv() => {
                    let event = match result {
                        Ok(event) => event,
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Broadcast receiver lagged by {} events", n);
                            continue;
                        }
                        Err(_) => break,
                    };

                    let text = serde_json::to_string(&event).unwrap();
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from the client
    let username_recv = username.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => handle_command(&dispatcher_recv, user_id, &username_recv, cmd),
                    Err(e) => {
                        warn!(
                            "{} ({}) bad command ({} bytes): {}",
                            username_recv,
                            user_id,
                            text.len(),
                            e
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    dispatcher.session_offline(conn_id).await;
    info!("{} ({}) disconnected from gateway", username, user_id);
}

async fn wait_for_identify(
    receiver: &mut futures_util::stream::SplitStream<WebSocket>,
) -> Option<Uuid> {
    let wait = tokio::time::timeout(IDENTIFY_TIMEOUT, async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(GatewayCommand::Identify { user_id }) =
                    serde_json::from_str::<GatewayCommand>(&text)
                {
                    return Some(user_id);
                }
            }
        }
        None
    });

    wait.await.ok().flatten()
}

fn handle_command(dispatcher: &Dispatcher, user_id: Uuid, username: &str, cmd: GatewayCommand) {
    match cmd {
        GatewayCommand::Identify { .. } => {} // already handled

        GatewayCommand::TypingStart { thread_id } => {
            dispatcher.broadcast(GatewayEvent::TypingStart {
                thread_id,
                user_id,
                username: username.to_string(),
            });
        }

        GatewayCommand::TypingStop { thread_id } => {
            dispatcher.broadcast(GatewayEvent::TypingStop {
                thread_id,
                user_id,
                username: username.to_string(),
            });
        }
    }
}
