use anyhow::{Result, bail};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use uuid::Uuid;

use carols_types::events::{GatewayCommand, GatewayEvent};

use crate::typing::TypingSignal;

/// WebSocket connection to the chat gateway: Identify handshake, then a
/// stream of decoded events.
pub struct GatewayClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    pub user_id: Uuid,
    pub username: String,
    /// Freshly read from the store at connect time; any cached profile is
    /// not authoritative.
    pub is_admin: bool,
}

impl GatewayClient {
    /// Connect and identify. Returns once the server's Ready arrives.
    pub async fn connect(url: &str, user_id: Uuid) -> Result<Self> {
        let (mut stream, _) = connect_async(url).await?;

        let identify = GatewayCommand::Identify { user_id };
        stream
            .send(Message::Text(serde_json::to_string(&identify)?.into()))
            .await?;

        while let Some(msg) = stream.next().await {
            match msg? {
                Message::Text(text) => {
                    let event: GatewayEvent = serde_json::from_str(text.as_str())?;
                    if let GatewayEvent::Ready {
                        user_id: uid,
                        username,
                        is_admin,
                    } = event
                    {
                        return Ok(Self {
                            stream,
                            user_id: uid,
                            username,
                            is_admin,
                        });
                    }
                }
                Message::Ping(payload) => stream.send(Message::Pong(payload)).await?,
                Message::Close(_) => bail!("gateway closed before Ready"),
                _ => {}
            }
        }

        bail!("gateway disconnected before Ready")
    }

    /// Next decoded event. Answers heartbeat pings transparently. `None`
    /// once the connection closes.
    pub async fn next_event(&mut self) -> Result<Option<GatewayEvent>> {
        while let Some(msg) = self.stream.next().await {
            match msg? {
                Message::Text(text) => {
                    return Ok(Some(serde_json::from_str(text.as_str())?));
                }
                Message::Ping(payload) => self.stream.send(Message::Pong(payload)).await?,
                Message::Close(_) => return Ok(None),
                _ => {}
            }
        }

        Ok(None)
    }

    pub async fn send_typing(&mut self, thread_id: Uuid, signal: TypingSignal) -> Result<()> {
        let cmd = match signal {
            TypingSignal::Start => GatewayCommand::TypingStart { thread_id },
            TypingSignal::Stop => GatewayCommand::TypingStop { thread_id },
        };
        self.stream
            .send(Message::Text(serde_json::to_string(&cmd)?.into()))
            .await?;
        Ok(())
    }

    /// Close the connection; the server's presence tracking notices the
    /// disconnect.
    pub async fn close(mut self) -> Result<()> {
        self.stream.close(None).await?;
        Ok(())
    }
}
