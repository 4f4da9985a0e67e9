// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the platform REST API.
//!
//! Provides [`PlatformClient`], which implements both collaborator traits
//! the engine needs: channel creation and subscription on the push side,
//! and the rate-limited snapshot queries on the pull side. Transient
//! statuses (429, 500, 503, 529) are retried once.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use livedesk_config::model::PlatformConfig;
use livedesk_core::{
    ChannelEndpoint, ConversationQuery, ConversationSnapshot, EventSocket, LivedeskError,
    NotificationApi, QueueCounts, SnapshotApi, Topic, UsersStatusSnapshot,
};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::socket::WsSocket;
use crate::types::{
    ApiErrorBody, ChannelResponse, ConversationsPage, ObservationResponse, TopicEntry, UsersPage,
    conversation_query_body, observation_query_body,
};

const USERS_PER_REQUEST: usize = 100;
const CONVERSATION_PAGE_SIZE: usize = 100;
const MAX_CONVERSATION_PAGES: usize = 20;

/// Which side of the engine a request serves; picks the error variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Plane {
    Push,
    Pull,
}

impl Plane {
    fn error(
        self,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> LivedeskError {
        match self {
            Self::Push => LivedeskError::Transport { message, source },
            Self::Pull => LivedeskError::Snapshot { message, source },
        }
    }
}

/// Bearer-authenticated REST client for one org.
#[derive(Debug, Clone)]
pub struct PlatformClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    max_retries: u32,
    retry_delay: Duration,
}

impl PlatformClient {
    /// Build a client from the `[platform]` section.
    ///
    /// Fails when no API token is configured.
    pub fn new(config: &PlatformConfig) -> Result<Self, LivedeskError> {
        let token = config
            .api_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| LivedeskError::Config("platform.api_token is not set".into()))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| {
                LivedeskError::Config(format!("invalid API token header value: {e}"))
            })?,
        );
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let timeout = config.request_timeout();
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| LivedeskError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout,
            max_retries: 1,
            retry_delay: Duration::from_secs(1),
        })
    }

    /// Overrides the pause before a retry.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Send the request built by `build`, retrying transient statuses.
    async fn send(
        &self,
        plane: Plane,
        what: &str,
        build: impl Fn() -> RequestBuilder,
    ) -> Result<Response, LivedeskError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, what, "retrying request after transient error");
                tokio::time::sleep(self.retry_delay).await;
            }

            let response = build().send().await.map_err(|e| {
                if e.is_timeout() {
                    LivedeskError::Timeout {
                        duration: self.timeout,
                    }
                } else {
                    plane.error(format!("{what}: request failed: {e}"), Some(Box::new(e)))
                }
            })?;

            let status = response.status();
            debug!(status = %status, attempt, what, "response received");

            if status.is_success() {
                return Ok(response);
            }

            let body = response.text().await.unwrap_or_default();
            if is_transient_error(status) && attempt < self.max_retries {
                warn!(status = %status, what, body = %body, "transient error, will retry");
                last_error = Some(plane.error(format!("{what}: platform returned {status}"), None));
                continue;
            }

            // Non-transient error or exhausted retries.
            let message = match serde_json::from_str::<ApiErrorBody>(&body) {
                Ok(ApiErrorBody {
                    code: Some(code),
                    message: Some(message),
                }) => format!("{what}: platform error ({code}): {message}"),
                _ => format!("{what}: platform returned {status}: {body}"),
            };
            return Err(plane.error(message, None));
        }

        Err(last_error
            .unwrap_or_else(|| plane.error(format!("{what}: failed after retries"), None)))
    }

    async fn json<T: DeserializeOwned>(
        &self,
        plane: Plane,
        what: &str,
        build: impl Fn() -> RequestBuilder,
    ) -> Result<T, LivedeskError> {
        let body = self
            .send(plane, what, build)
            .await?
            .text()
            .await
            .map_err(|e| plane.error(format!("{what}: failed to read body: {e}"), Some(Box::new(e))))?;
        serde_json::from_str(&body)
            .map_err(|e| plane.error(format!("{what}: failed to parse body: {e}"), Some(Box::new(e))))
    }
}

/// Returns true for HTTP status codes that indicate transient errors worth retrying.
fn is_transient_error(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 503 | 529)
}

#[async_trait]
impl NotificationApi for PlatformClient {
    async fn create_channel(&self) -> Result<ChannelEndpoint, LivedeskError> {
        let url = self.url("/api/v2/notifications/channels");
        let channel: ChannelResponse = self
            .json(Plane::Push, "create channel", || self.client.post(&url))
            .await?;
        debug!(channel_id = %channel.id, expires = ?channel.expires, "channel created");
        Ok(ChannelEndpoint {
            id: channel.id,
            connect_uri: channel.connect_uri,
            expires: channel.expires,
        })
    }

    async fn subscribe(&self, channel_id: &str, topics: &[Topic]) -> Result<(), LivedeskError> {
        let url = self.url(&format!(
            "/api/v2/notifications/channels/{channel_id}/subscriptions"
        ));
        let entries: Vec<TopicEntry<'_>> = topics
            .iter()
            .map(|t| TopicEntry { id: t.as_str() })
            .collect();
        self.send(Plane::Push, "subscribe", || self.client.put(&url).json(&entries))
            .await?;
        Ok(())
    }

    async fn open_socket(
        &self,
        connect_uri: &str,
    ) -> Result<Box<dyn EventSocket>, LivedeskError> {
        let socket = WsSocket::connect(connect_uri).await?;
        Ok(Box::new(socket))
    }
}

#[async_trait]
impl SnapshotApi for PlatformClient {
    async fn users_status_scan(
        &self,
        user_ids: &[String],
    ) -> Result<UsersStatusSnapshot, LivedeskError> {
        let url = self.url("/api/v2/users");
        let mut snapshot = UsersStatusSnapshot::default();

        for chunk in user_ids.chunks(USERS_PER_REQUEST) {
            let ids = chunk.join(",");
            let page_size = chunk.len().to_string();
            let page: UsersPage = self
                .json(Plane::Pull, "users status", || {
                    self.client.get(&url).query(&[
                        ("id", ids.as_str()),
                        ("expand", "presence,routingStatus"),
                        ("pageSize", page_size.as_str()),
                    ])
                })
                .await?;
            for user in page.entities {
                if let Some(presence) = user.presence {
                    snapshot.presence.insert(user.id.clone(), presence);
                }
                if let Some(routing) = user.routing_status {
                    snapshot.routing.insert(user.id, routing);
                }
            }
        }
        Ok(snapshot)
    }

    async fn recent_conversations(
        &self,
        query: &ConversationQuery,
    ) -> Result<ConversationSnapshot, LivedeskError> {
        let url = self.url("/api/v2/analytics/conversations/details/query");
        let end = Utc::now();
        let lookback = chrono::Duration::from_std(query.lookback)
            .map_err(|e| LivedeskError::Config(format!("conversation lookback out of range: {e}")))?;
        let start = end - lookback;

        let mut conversations = Vec::new();
        for page_number in 1..=MAX_CONVERSATION_PAGES {
            let body = conversation_query_body(
                &query.queue_ids,
                &query.user_ids,
                start,
                end,
                CONVERSATION_PAGE_SIZE,
                page_number,
            );
            let page: ConversationsPage = self
                .json(Plane::Pull, "conversation details", || {
                    self.client.post(&url).json(&body)
                })
                .await?;
            let received = page.conversations.len();
            conversations.extend(page.conversations);

            let done = received < CONVERSATION_PAGE_SIZE
                || page
                    .total_hits
                    .is_some_and(|total| conversations.len() as u64 >= total);
            if done {
                return Ok(ConversationSnapshot::complete(conversations));
            }
        }
        warn!(
            pages = MAX_CONVERSATION_PAGES,
            conversations = conversations.len(),
            "conversation snapshot truncated at page limit"
        );
        Ok(ConversationSnapshot::truncated(conversations))
    }

    async fn queue_observations(
        &self,
        queue_ids: &[String],
    ) -> Result<Vec<QueueCounts>, LivedeskError> {
        if queue_ids.is_empty() {
            return Ok(Vec::new());
        }
        let url = self.url("/api/v2/analytics/queues/observations/query");
        let body = observation_query_body(queue_ids);
        let response: ObservationResponse = self
            .json(Plane::Pull, "queue observations", || {
                self.client.post(&url).json(&body)
            })
            .await?;

        let mut by_queue: HashMap<String, QueueCounts> = HashMap::new();
        for result in response.results {
            let Some(queue_id) = result.group.queue_id else {
                continue;
            };
            let counts = by_queue
                .entry(queue_id.clone())
                .or_insert_with(|| QueueCounts {
                    queue_id,
                    ..QueueCounts::default()
                });
            for metric in result.data {
                let count = u32::try_from(metric.stats.count.unwrap_or(0)).unwrap_or(u32::MAX);
                match metric.metric.as_str() {
                    "oWaiting" => counts.waiting = counts.waiting.saturating_add(count),
                    "oInteracting" => counts.interacting = counts.interacting.saturating_add(count),
                    _ => {}
                }
            }
        }

        let mut counts: Vec<QueueCounts> = by_queue.into_values().collect();
        counts.sort_by(|a, b| a.queue_id.cmp(&b.queue_id));
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str) -> PlatformConfig {
        PlatformConfig {
            base_url: base_url.into(),
            api_token: Some("tok".into()),
            ..PlatformConfig::default()
        }
    }

    #[test]
    fn missing_token_is_a_config_error() {
        let mut cfg = config("http://localhost");
        cfg.api_token = None;
        assert!(matches!(
            PlatformClient::new(&cfg),
            Err(LivedeskError::Config(_))
        ));
        cfg.api_token = Some("  ".into());
        assert!(PlatformClient::new(&cfg).is_err());
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = PlatformClient::new(&config("https://api.example/")).unwrap();
        assert_eq!(client.base_url(), "https://api.example");
        assert_eq!(
            client.url("/api/v2/users"),
            "https://api.example/api/v2/users"
        );
    }

    #[test]
    fn transient_statuses() {
        for code in [429, 500, 503, 529] {
            assert!(is_transient_error(StatusCode::from_u16(code).unwrap()));
        }
        for code in [400, 401, 404, 502] {
            assert!(!is_transient_error(StatusCode::from_u16(code).unwrap()));
        }
    }
}
