//! HTTP client for the Gmail REST API (v1).

use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{
    ErrorEnvelope, History, ListHistoryResponse, ListMessagesResponse, Message, MessageRef,
    SendRequest, WatchRequest, WatchResponse,
};

/// Default API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://gmail.googleapis.com";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on page size accepted by `messages.list`.
const MAX_PAGE_SIZE: u32 = 500;

/// Connection settings for [`Client`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API endpoint, without trailing slash.
    pub base_url: String,
    /// Mailbox owner (`me` for the authenticated user).
    pub user: String,
    /// `OAuth2` bearer token.
    pub access_token: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl ClientConfig {
    /// Creates a configuration for the authenticated user at the default endpoint.
    #[must_use]
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user: "me".to_string(),
            access_token: access_token.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Overrides the API endpoint.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Overrides the mailbox owner.
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Overrides the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Gmail API client.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    config: ClientConfig,
}

impl Client {
    /// Creates a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if the access token is empty or the HTTP client
    /// cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.access_token.trim().is_empty() {
            return Err(Error::InvalidConfig("access token is empty".into()));
        }
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/gmail/v1/users/{}/{path}",
            self.config.base_url, self.config.user
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(&self.config.access_token)
    }

    /// Lists message references matching a Gmail search query.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list_messages(&self, query: &str, limit: u32) -> Result<Vec<MessageRef>> {
        let mut refs = Vec::new();
        let mut page_token: Option<String> = None;

        while refs.len() < limit as usize {
            let remaining = limit - u32::try_from(refs.len()).unwrap_or(limit);
            let page_size = remaining.min(MAX_PAGE_SIZE).to_string();
            let mut params = vec![("q", query), ("maxResults", page_size.as_str())];
            if let Some(token) = page_token.as_deref() {
                params.push(("pageToken", token));
            }

            let request = self
                .authorized(self.http.get(self.url("messages")))
                .query(&params);
            let page: ListMessagesResponse = read_json(request.send().await?).await?;

            refs.extend(page.messages);
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        refs.truncate(limit as usize);
        Ok(refs)
    }

    /// Fetches a message in `full` format.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn get_message(&self, id: &str) -> Result<Message> {
        let request = self
            .authorized(self.http.get(self.url(&format!("messages/{id}"))))
            .query(&[("format", "full")]);
        read_json(request.send().await?).await
    }

    /// Lists `messageAdded` history records after `start_history_id`,
    /// following every page.
    ///
    /// Returns the records in chronological order together with the mailbox's
    /// current history position.
    ///
    /// # Errors
    ///
    /// Returns `Error::HistoryExpired` if the start point is too old, or another
    /// error if a request fails.
    pub async fn list_history(
        &self,
        start_history_id: &str,
    ) -> Result<(Vec<History>, Option<String>)> {
        let mut records = Vec::new();
        let mut latest = None;
        let mut page_token: Option<String> = None;

        loop {
            let mut params = vec![
                ("startHistoryId", start_history_id),
                ("historyTypes", "messageAdded"),
            ];
            if let Some(token) = page_token.as_deref() {
                params.push(("pageToken", token));
            }

            let request = self
                .authorized(self.http.get(self.url("history")))
                .query(&params);
            let response = request.send().await?;
            if response.status() == StatusCode::NOT_FOUND {
                return Err(Error::HistoryExpired(start_history_id.to_string()));
            }
            let page: ListHistoryResponse = read_json(response).await?;

            debug!(
                records = page.history.len(),
                more = page.next_page_token.is_some(),
                "Fetched history page"
            );
            records.extend(page.history);
            if page.history_id.is_some() {
                latest = page.history_id;
            }
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok((records, latest))
    }

    /// Sends a raw message, optionally placing it in an existing thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn send_message(&self, raw: &str, thread_id: Option<&str>) -> Result<MessageRef> {
        let request = self
            .authorized(self.http.post(self.url("messages/send")))
            .json(&SendRequest { raw, thread_id });
        read_json(request.send().await?).await
    }

    /// Registers push notifications for the inbox on a Pub/Sub topic.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn watch(&self, topic: &str) -> Result<WatchResponse> {
        let request = self
            .authorized(self.http.post(self.url("watch")))
            .json(&WatchRequest {
                topic_name: topic,
                label_ids: vec!["INBOX"],
                label_filter_action: "include",
            });
        read_json(request.send().await?).await
    }
}

/// Reads a JSON body, converting non-success statuses into `Error::Api`.
async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let message = serde_json::from_str::<ErrorEnvelope>(&body)
            .map(|e| e.error.message)
            .unwrap_or(body);
        return Err(Error::Api {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_str(&body).map_err(Into::into)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_token() {
        let err = Client::new(ClientConfig::new("  ")).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_url_building() {
        let client = Client::new(
            ClientConfig::new("token")
                .with_base_url("http://localhost:9999/")
                .with_user("alice@example.com"),
        )
        .unwrap();

        assert_eq!(
            client.url("messages/abc"),
            "http://localhost:9999/gmail/v1/users/alice@example.com/messages/abc"
        );
    }
}
