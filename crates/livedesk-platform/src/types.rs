// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire types for the platform REST API.
//!
//! Responses are deserialized permissively: every field the client does not
//! strictly need is optional or defaulted.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// `POST /api/v2/notifications/channels` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelResponse {
    pub id: String,
    pub connect_uri: String,
    #[serde(default)]
    pub expires: Option<DateTime<Utc>>,
}

/// One entry of a subscription list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicEntry<'a> {
    pub id: &'a str,
}

/// `GET /api/v2/users` page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UsersPage {
    pub entities: Vec<UserEntity>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserEntity {
    pub id: String,
    pub presence: Option<Value>,
    pub routing_status: Option<Value>,
}

/// Conversation details query response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConversationsPage {
    pub conversations: Vec<Value>,
    pub total_hits: Option<u64>,
}

/// Queue observation query response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ObservationResponse {
    pub results: Vec<ObservationResult>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ObservationResult {
    pub group: ObservationGroup,
    pub data: Vec<ObservationMetric>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObservationGroup {
    pub queue_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ObservationMetric {
    pub metric: String,
    pub stats: ObservationStats,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ObservationStats {
    pub count: Option<u64>,
}

/// Error body the platform returns alongside non-2xx statuses.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiErrorBody {
    pub code: Option<String>,
    pub message: Option<String>,
}

fn iso(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn any_of(dimension: &str, values: &[String]) -> Value {
    let predicates: Vec<Value> = values
        .iter()
        .map(|v| json!({ "type": "dimension", "dimension": dimension, "operator": "matches", "value": v }))
        .collect();
    json!({ "type": "or", "predicates": predicates })
}

/// Body for one page of open conversations started in `[start, end]`.
pub fn conversation_query_body(
    queue_ids: &[String],
    user_ids: &[String],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    page_size: usize,
    page_number: usize,
) -> Value {
    let mut body = json!({
        "interval": format!("{}/{}", iso(start), iso(end)),
        "order": "asc",
        "orderBy": "conversationStart",
        "conversationFilters": [{
            "type": "and",
            "predicates": [{ "type": "dimension", "dimension": "conversationEnd", "operator": "notExists" }]
        }],
        "paging": { "pageSize": page_size, "pageNumber": page_number }
    });
    let mut segment_filters = Vec::new();
    if !queue_ids.is_empty() {
        segment_filters.push(any_of("queueId", queue_ids));
    }
    if !user_ids.is_empty() {
        segment_filters.push(any_of("userId", user_ids));
    }
    if !segment_filters.is_empty() {
        // Queue or user match: either one brings the conversation into scope.
        body["segmentFilters"] = if segment_filters.len() == 1 {
            json!(segment_filters)
        } else {
            json!([{ "type": "or", "clauses": segment_filters }])
        };
    }
    body
}

pub const OBSERVED_METRICS: [&str; 2] = ["oWaiting", "oInteracting"];

/// Body for a queue observation query over `queue_ids`.
pub fn observation_query_body(queue_ids: &[String]) -> Value {
    json!({
        "filter": any_of("queueId", queue_ids),
        "metrics": OBSERVED_METRICS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_response_accepts_missing_expiry() {
        let parsed: ChannelResponse = serde_json::from_value(json!({
            "id": "ch-1",
            "connectUri": "wss://streaming.example/channels/ch-1"
        }))
        .unwrap();
        assert_eq!(parsed.id, "ch-1");
        assert!(parsed.expires.is_none());

        let parsed: ChannelResponse = serde_json::from_value(json!({
            "id": "ch-2",
            "connectUri": "wss://x",
            "expires": "2026-03-01T10:00:00Z"
        }))
        .unwrap();
        assert!(parsed.expires.is_some());
    }

    #[test]
    fn conversation_query_filters_queues_and_users() {
        let start = DateTime::parse_from_rfc3339("2026-03-01T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let end = DateTime::parse_from_rfc3339("2026-03-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        let body = conversation_query_body(&[], &[], start, end, 100, 1);
        assert_eq!(
            body["interval"],
            "2026-03-01T08:00:00.000Z/2026-03-01T10:00:00.000Z"
        );
        assert!(body.get("segmentFilters").is_none());

        let body = conversation_query_body(&["q1".into()], &[], start, end, 100, 2);
        assert_eq!(body["segmentFilters"][0]["predicates"][0]["value"], "q1");
        assert_eq!(body["paging"]["pageNumber"], 2);

        let body = conversation_query_body(&["q1".into()], &["u1".into()], start, end, 100, 1);
        assert_eq!(body["segmentFilters"][0]["clauses"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn observation_response_is_permissive() {
        let parsed: ObservationResponse = serde_json::from_value(json!({
            "results": [
                { "group": { "queueId": "q1" }, "data": [{ "metric": "oWaiting", "stats": { "count": 2 } }] },
                { "group": {} }
            ]
        }))
        .unwrap();
        assert_eq!(parsed.results.len(), 2);
        assert_eq!(parsed.results[0].group.queue_id.as_deref(), Some("q1"));
        assert!(parsed.results[1].data.is_empty());
    }
}
