use std::collections::HashMap;

use reqwest::Client;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use carols_types::api::{
    CreateThreadRequest, CreateUserRequest, ErrorBody, InitializeThreadsRequest,
    InitializeThreadsResponse, MarkViewedRequest, MessageResponse, SendMessageRequest,
    UnreadCount, UpdateUsernameRequest,
};
use carols_types::models::{Thread, User};

use crate::backend::{ChatBackend, ClientError, ClientResult};

/// REST adapter over the chat API.
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: Client::new(),
            base_url,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> ClientResult<T> {
        if resp.status().is_success() {
            Ok(resp.json::<T>().await?)
        } else {
            Err(Self::api_error(resp).await)
        }
    }

    async fn expect_success(resp: reqwest::Response) -> ClientResult<()> {
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(Self::api_error(resp).await)
        }
    }

    async fn api_error(resp: reqwest::Response) -> ClientError {
        let status = resp.status().as_u16();
        let message = match resp.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => format!("HTTP {}", status),
        };
        ClientError::Api { status, message }
    }
}

impl ChatBackend for HttpBackend {
    async fn register_or_fetch(&self, username: &str) -> ClientResult<User> {
        let req = CreateUserRequest {
            username: username.to_string(),
        };
        let resp = self.client.post(self.url("/users")).json(&req).send().await?;
        Self::decode(resp).await
    }

    async fn rename(&self, user_id: Uuid, new_username: &str) -> ClientResult<User> {
        let req = UpdateUsernameRequest {
            new_username: new_username.to_string(),
        };
        let resp = self
            .client
            .post(self.url(&format!("/users/{}/username", user_id)))
            .json(&req)
            .send()
            .await?;
        Self::decode(resp).await
    }

    async fn list_threads(&self) -> ClientResult<Vec<Thread>> {
        let resp = self.client.get(self.url("/threads")).send().await?;
        Self::decode(resp).await
    }

    async fn create_thread(&self, name: &str, user_id: Uuid) -> ClientResult<Thread> {
        let req = CreateThreadRequest {
            name: name.to_string(),
            user_id,
        };
        let resp = self.client.post(self.url("/threads")).json(&req).send().await?;
        Self::decode(resp).await
    }

    async fn delete_thread(&self, thread_id: Uuid) -> ClientResult<()> {
        let resp = self
            .client
            .delete(self.url(&format!("/threads/{}", thread_id)))
            .send()
            .await?;
        Self::expect_success(resp).await
    }

    async fn seed_default_threads(&self, user_id: Uuid) -> ClientResult<Vec<Thread>> {
        let req = InitializeThreadsRequest { user_id };
        let resp = self
            .client
            .post(self.url("/threads/initialize"))
            .json(&req)
            .send()
            .await?;
        let body: InitializeThreadsResponse = Self::decode(resp).await?;
        Ok(body.threads)
    }

    async fn list_messages(&self, thread_id: Uuid) -> ClientResult<Vec<MessageResponse>> {
        let resp = self
            .client
            .get(self.url(&format!("/threads/{}/messages", thread_id)))
            .send()
            .await?;
        Self::decode(resp).await
    }

    async fn send_message(
        &self,
        thread_id: Uuid,
        user_id: Uuid,
        content: &str,
    ) -> ClientResult<MessageResponse> {
        let req = SendMessageRequest {
            user_id,
            content: content.to_string(),
        };
        let resp = self
            .client
            .post(self.url(&format!("/threads/{}/messages", thread_id)))
            .json(&req)
            .send()
            .await?;
        Self::decode(resp).await
    }

    async fn mark_viewed(&self, user_id: Uuid, thread_id: Uuid) -> ClientResult<()> {
        let req = MarkViewedRequest { user_id };
        let resp = self
            .client
            .post(self.url(&format!("/threads/{}/views", thread_id)))
            .json(&req)
            .send()
            .await?;
        Self::expect_success(resp).await
    }

    async fn unread_counts(&self, user_id: Uuid) -> ClientResult<HashMap<Uuid, u64>> {
        let resp = self
            .client
            .get(self.url(&format!("/users/{}/unread", user_id)))
            .send()
            .await?;
        let counts: Vec<UnreadCount> = Self::decode(resp).await?;
        Ok(counts.into_iter().map(|c| (c.thread_id, c.unread)).collect())
    }
}
