// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound event classification: routes a push frame by topic pattern and
//! writes the derived record into the store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use livedesk_core::LivedeskError;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::extract::{ExtractHint, Extraction, extract_conversation, parse_instant};
use crate::record::{PresenceBucket, PresenceRecord, RecordSource, RoutingRecord, RoutingStatus};
use crate::store::{LiveStore, MergeOutcome};
use crate::topic::TopicKind;

/// Wire envelope of a notification frame.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    topic_name: Option<String>,
    #[serde(default)]
    event_body: Value,
}

/// How a frame was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handled {
    Presence { user_id: String, applied: bool },
    Routing { user_id: String, applied: bool },
    Conversation { conversation_id: String, removed: bool },
    Heartbeat,
    /// Unknown topic, or a value with no mapping.
    Ignored,
}

impl Handled {
    /// True when the frame carried entity state.
    pub fn is_event(&self) -> bool {
        matches!(
            self,
            Self::Presence { .. } | Self::Routing { .. } | Self::Conversation { .. }
        )
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Presence { .. } => "presence",
            Self::Routing { .. } => "routing",
            Self::Conversation { .. } => "conversation",
            Self::Heartbeat => "heartbeat",
            Self::Ignored => "ignored",
        }
    }
}

/// Consumer of raw socket frames.
pub trait FrameHandler: Send + Sync + 'static {
    fn handle_frame(&self, raw: &str, now: DateTime<Utc>) -> Result<Handled, LivedeskError>;
}

fn str_at<'a>(body: &'a Value, path: &[&str]) -> Option<&'a str> {
    path.iter()
        .try_fold(body, |v, key| v.get(key))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn first_str<'a>(body: &'a Value, paths: &[&[&str]]) -> Option<&'a str> {
    paths.iter().find_map(|p| str_at(body, p))
}

/// Writes push and pull observations into a [`LiveStore`].
#[derive(Debug, Clone)]
pub struct EventClassifier {
    store: Arc<LiveStore>,
}

impl EventClassifier {
    pub fn new(store: Arc<LiveStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<LiveStore> {
        &self.store
    }

    /// Parse a `{topicName, eventBody}` frame and handle it.
    pub fn on_frame(&self, raw: &str, now: DateTime<Utc>) -> Result<Handled, LivedeskError> {
        let envelope: Envelope = serde_json::from_str(raw)
            .map_err(|e| LivedeskError::Malformed(format!("frame is not an envelope: {e}")))?;
        let topic = envelope
            .topic_name
            .filter(|t| !t.is_empty())
            .ok_or_else(|| LivedeskError::Malformed("frame has no topicName".into()))?;
        self.on_message(&topic, &envelope.event_body, now)
    }

    /// Handle one event body received on `topic`.
    pub fn on_message(
        &self,
        topic: &str,
        body: &Value,
        now: DateTime<Utc>,
    ) -> Result<Handled, LivedeskError> {
        match TopicKind::parse(topic) {
            TopicKind::Heartbeat => Ok(Handled::Heartbeat),
            TopicKind::Unrecognized => {
                debug!(topic, "ignoring frame on unrecognized topic");
                Ok(Handled::Ignored)
            }
            TopicKind::UserPresence(user_id) => {
                self.apply_presence_body(&user_id, body, RecordSource::Push, now)
            }
            TopicKind::UserRouting(user_id) => {
                self.apply_routing_body(&user_id, body, RecordSource::Push, now)
            }
            TopicKind::QueueConversations(queue_id) => self.apply_conversation_body(
                body,
                ExtractHint {
                    queue_id: Some(&queue_id),
                    ..Default::default()
                },
                RecordSource::Push,
                now,
            ),
            TopicKind::Conversation(conversation_id) => self.apply_conversation_body(
                body,
                ExtractHint {
                    conversation_id: Some(&conversation_id),
                    ..Default::default()
                },
                RecordSource::Push,
                now,
            ),
            TopicKind::UserConversations(_) => self.apply_conversation_body(
                body,
                ExtractHint::default(),
                RecordSource::Push,
                now,
            ),
        }
    }

    /// Apply a presence body: `{presenceDefinition: {systemPresence}, modifiedDate}`.
    pub fn apply_presence_body(
        &self,
        user_id: &str,
        body: &Value,
        source: RecordSource,
        now: DateTime<Utc>,
    ) -> Result<Handled, LivedeskError> {
        let raw = first_str(
            body,
            &[
                &["presenceDefinition", "systemPresence"],
                &["systemPresence"],
            ],
        )
        .ok_or_else(|| {
            LivedeskError::Malformed(format!("presence for {user_id} has no systemPresence"))
        })?;
        let Some(presence) = PresenceBucket::from_system_presence(raw) else {
            debug!(user_id, presence = raw, "unmapped presence value");
            return Ok(Handled::Ignored);
        };
        let observed_at = str_at(body, &["modifiedDate"])
            .and_then(parse_instant)
            .unwrap_or(now);
        let applied = self.store.apply_presence(PresenceRecord {
            user_id: user_id.to_string(),
            presence,
            observed_at,
            updated_at: now,
            source,
        });
        Ok(Handled::Presence {
            user_id: user_id.to_string(),
            applied,
        })
    }

    /// Apply a routing body: `{routingStatus: {status, startTime}}` or the flat form.
    pub fn apply_routing_body(
        &self,
        user_id: &str,
        body: &Value,
        source: RecordSource,
        now: DateTime<Utc>,
    ) -> Result<Handled, LivedeskError> {
        let raw = first_str(body, &[&["routingStatus", "status"], &["status"]]).ok_or_else(|| {
            LivedeskError::Malformed(format!("routing status for {user_id} has no status"))
        })?;
        let Some(status) = RoutingStatus::from_platform(raw) else {
            debug!(user_id, status = raw, "unmapped routing status");
            return Ok(Handled::Ignored);
        };
        let observed_at = first_str(body, &[&["routingStatus", "startTime"], &["startTime"]])
            .and_then(parse_instant)
            .unwrap_or(now);
        let applied = self.store.apply_routing(RoutingRecord {
            user_id: user_id.to_string(),
            status,
            observed_at,
            updated_at: now,
            source,
        });
        Ok(Handled::Routing {
            user_id: user_id.to_string(),
            applied,
        })
    }

    /// Derive a conversation record and merge it; ended conversations are removed.
    pub fn apply_conversation_body(
        &self,
        body: &Value,
        hint: ExtractHint<'_>,
        source: RecordSource,
        now: DateTime<Utc>,
    ) -> Result<Handled, LivedeskError> {
        match extract_conversation(body, hint, source, now)? {
            Extraction::Gone(conversation_id) => {
                self.store.remove_conversation(&conversation_id, now);
                Ok(Handled::Conversation {
                    conversation_id,
                    removed: true,
                })
            }
            Extraction::Live(record) => {
                let conversation_id = record.conversation_id.clone();
                let outcome = self.store.merge_conversation(record);
                Ok(Handled::Conversation {
                    conversation_id,
                    removed: matches!(outcome, MergeOutcome::Removed | MergeOutcome::Discarded),
                })
            }
        }
    }
}

impl FrameHandler for EventClassifier {
    fn handle_frame(&self, raw: &str, now: DateTime<Utc>) -> Result<Handled, LivedeskError> {
        self.on_frame(raw, now)
    }
}
