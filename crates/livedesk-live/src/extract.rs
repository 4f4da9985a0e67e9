// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pure extraction of conversation facts from raw interaction payloads.
//!
//! Push events and analytics snapshot records describe the same conversation
//! in different shapes. Both are deserialized into one permissive set of
//! structs where every field is optional, and each derived fact is computed by
//! an ordered list of small extractor functions: the first one that yields a
//! non-empty value wins. Nothing here touches the store or the clock beyond
//! the `now` passed in.

use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use livedesk_core::LivedeskError;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::record::{
    ConversationRecord, Direction, InteractionState, MediaType, RecordSource, WaitClock,
};

/// Session states that count as a live leg of a participant.
const ACTIVE_STATES: &[&str] = &["connected", "alerting", "offering", "dialing", "contacting"];

/// Session states after which a leg is over.
const TERMINAL_STATES: &[&str] = &["disconnected", "terminated"];

/// Treat an explicit JSON `null` like an absent field.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConversationEvent {
    pub id: Option<String>,
    pub conversation_id: Option<String>,
    pub conversation_start: Option<String>,
    pub conversation_end: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub originating_direction: Option<String>,
    pub media_type: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub participants: Vec<Participant>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Participant {
    pub purpose: Option<String>,
    pub user_id: Option<String>,
    pub name: Option<String>,
    pub participant_name: Option<String>,
    pub queue_id: Option<String>,
    pub queue: Option<EntityRef>,
    pub queue_name: Option<String>,
    pub address: Option<String>,
    pub ani: Option<String>,
    pub dnis: Option<String>,
    pub state: Option<String>,
    pub start_time: Option<String>,
    pub connected_time: Option<String>,
    pub end_time: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub calls: Vec<MediaSession>,
    #[serde(deserialize_with = "nullable")]
    pub callbacks: Vec<MediaSession>,
    #[serde(deserialize_with = "nullable")]
    pub chats: Vec<MediaSession>,
    #[serde(deserialize_with = "nullable")]
    pub messages: Vec<MediaSession>,
    #[serde(deserialize_with = "nullable")]
    pub emails: Vec<MediaSession>,
    /// Analytics-shaped sessions (pull snapshots).
    #[serde(deserialize_with = "nullable")]
    pub sessions: Vec<AnalyticsSession>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntityRef {
    pub id: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddressRef {
    pub name: Option<String>,
    pub address_normalized: Option<String>,
    pub address_raw: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MediaSession {
    pub state: Option<String>,
    pub direction: Option<String>,
    pub connected_time: Option<String>,
    pub disconnected_time: Option<String>,
    pub disconnect_type: Option<String>,
    #[serde(rename = "self")]
    pub self_address: Option<AddressRef>,
    pub other: Option<AddressRef>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyticsSession {
    pub media_type: Option<String>,
    pub direction: Option<String>,
    pub ani: Option<String>,
    pub dnis: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub segments: Vec<Segment>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Segment {
    pub segment_type: Option<String>,
    pub queue_id: Option<String>,
    pub segment_start: Option<String>,
    pub segment_end: Option<String>,
}

/// Role of a participant in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Agent,
    Queue,
    Ivr,
    Customer,
    Other,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn state_in(state: Option<&str>, set: &[&str]) -> bool {
    state.is_some_and(|s| set.iter().any(|k| s.eq_ignore_ascii_case(k)))
}

impl MediaSession {
    fn is_active(&self) -> bool {
        state_in(self.state.as_deref(), ACTIVE_STATES) && self.disconnected_time.is_none()
    }

    fn is_closed(&self) -> bool {
        self.disconnected_time.is_some() || state_in(self.state.as_deref(), TERMINAL_STATES)
    }
}

impl AnalyticsSession {
    fn last_segment_open(&self) -> bool {
        self.segments.last().is_some_and(|s| s.segment_end.is_none())
    }
}

impl Participant {
    pub fn role(&self) -> Role {
        let purpose = self.purpose.as_deref().unwrap_or_default().to_ascii_lowercase();
        match purpose.as_str() {
            "agent" | "user" => Role::Agent,
            "acd" | "queue" => Role::Queue,
            "ivr" | "flow" => Role::Ivr,
            "customer" | "external" => Role::Customer,
            _ => Role::Other,
        }
    }

    fn media_sessions(&self) -> impl Iterator<Item = &MediaSession> {
        self.calls
            .iter()
            .chain(&self.callbacks)
            .chain(&self.chats)
            .chain(&self.messages)
            .chain(&self.emails)
    }

    /// True when any leg of this participant is live.
    pub fn has_active_session(&self) -> bool {
        if self.media_sessions().any(MediaSession::is_active) {
            return true;
        }
        if self.end_time.is_none() && state_in(self.state.as_deref(), ACTIVE_STATES) {
            return true;
        }
        self.end_time.is_none() && self.sessions.iter().any(AnalyticsSession::last_segment_open)
    }

    pub fn is_ended(&self) -> bool {
        if self.end_time.is_some() || state_in(self.state.as_deref(), TERMINAL_STATES) {
            return true;
        }
        let mut legs = self.media_sessions().peekable();
        if legs.peek().is_some() && legs.all(MediaSession::is_closed) {
            return true;
        }
        !self.sessions.is_empty() && !self.sessions.iter().any(AnalyticsSession::last_segment_open)
    }

    fn queue_id(&self) -> Option<&str> {
        non_empty(&self.queue_id).or_else(|| self.queue.as_ref().and_then(|q| non_empty(&q.id)))
    }

    fn display_name(&self) -> Option<&str> {
        non_empty(&self.name).or_else(|| non_empty(&self.participant_name))
    }

    fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.sessions.iter().flat_map(|s| s.segments.iter())
    }
}

impl ConversationEvent {
    pub fn conversation_id(&self) -> Option<&str> {
        non_empty(&self.id).or_else(|| non_empty(&self.conversation_id))
    }

    fn with_role(&self, role: Role) -> impl Iterator<Item = &Participant> {
        self.participants.iter().filter(move |p| p.role() == role)
    }

    /// Prefer a live participant of `role`, else the most recent one.
    fn primary(&self, role: Role) -> Option<&Participant> {
        self.with_role(role)
            .filter(|p| p.has_active_session())
            .last()
            .or_else(|| self.with_role(role).last())
    }
}

/// An extractor yielding one fact, or `None` when its source is absent.
pub type Extractor<T> = fn(&ConversationEvent) -> Option<T>;

/// Run `chain` in order and return the first fact found.
pub fn first_match<T>(event: &ConversationEvent, chain: &[Extractor<T>]) -> Option<T> {
    chain.iter().find_map(|extract| extract(event))
}

/// Parse a platform timestamp. Accepts RFC 3339 and zone-less ISO 8601 (read as UTC).
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn instant(value: &Option<String>) -> Option<DateTime<Utc>> {
    non_empty(value).and_then(parse_instant)
}

// --- lifecycle ---

/// Interaction state from the participant scan.
pub fn interaction_state(event: &ConversationEvent) -> InteractionState {
    if event.with_role(Role::Agent).any(Participant::has_active_session) {
        InteractionState::Interacting
    } else if event.with_role(Role::Queue).any(Participant::has_active_session) {
        InteractionState::Waiting
    } else if event.with_role(Role::Ivr).any(|p| !p.is_ended()) {
        InteractionState::Ivr
    } else {
        InteractionState::Unknown
    }
}

/// True when the conversation as a whole has finished.
pub fn is_ended(event: &ConversationEvent) -> bool {
    if event.conversation_end.is_some() || event.end_time.is_some() {
        return true;
    }
    !event.participants.is_empty() && event.participants.iter().all(Participant::is_ended)
}

pub fn has_any_active(event: &ConversationEvent) -> bool {
    event.participants.iter().any(Participant::has_active_session)
}

// --- queue ---

fn queue_id_from_acd(e: &ConversationEvent) -> Option<String> {
    e.primary(Role::Queue).and_then(Participant::queue_id).map(str::to_string)
}

fn queue_id_from_any_participant(e: &ConversationEvent) -> Option<String> {
    e.participants.iter().rev().find_map(Participant::queue_id).map(str::to_string)
}

fn queue_id_from_segments(e: &ConversationEvent) -> Option<String> {
    e.participants
        .iter()
        .flat_map(Participant::segments)
        .filter_map(|s| non_empty(&s.queue_id))
        .last()
        .map(str::to_string)
}

const QUEUE_ID: &[Extractor<String>] = &[
    queue_id_from_acd,
    queue_id_from_any_participant,
    queue_id_from_segments,
];

fn queue_name_from_acd_field(e: &ConversationEvent) -> Option<String> {
    e.primary(Role::Queue)
        .and_then(|p| non_empty(&p.queue_name))
        .map(str::to_string)
}

fn queue_name_from_queue_ref(e: &ConversationEvent) -> Option<String> {
    e.participants
        .iter()
        .rev()
        .find_map(|p| p.queue.as_ref().and_then(|q| non_empty(&q.name)))
        .map(str::to_string)
}

/// On queue legs the participant name is the queue name.
fn queue_name_from_acd_name(e: &ConversationEvent) -> Option<String> {
    e.primary(Role::Queue)
        .and_then(Participant::display_name)
        .map(str::to_string)
}

const QUEUE_NAME: &[Extractor<String>] = &[
    queue_name_from_acd_field,
    queue_name_from_queue_ref,
    queue_name_from_acd_name,
];

// --- agent ---

fn agent_id_from_primary(e: &ConversationEvent) -> Option<String> {
    e.primary(Role::Agent)
        .and_then(|p| non_empty(&p.user_id))
        .map(str::to_string)
}

fn agent_id_from_any_agent(e: &ConversationEvent) -> Option<String> {
    e.with_role(Role::Agent)
        .filter_map(|p| non_empty(&p.user_id))
        .last()
        .map(str::to_string)
}

const AGENT_ID: &[Extractor<String>] = &[agent_id_from_primary, agent_id_from_any_agent];

fn agent_name_from_primary(e: &ConversationEvent) -> Option<String> {
    e.primary(Role::Agent)
        .and_then(Participant::display_name)
        .map(str::to_string)
}

const AGENT_NAME: &[Extractor<String>] = &[agent_name_from_primary];

// --- address ---

fn address_from_customer(e: &ConversationEvent) -> Option<String> {
    e.primary(Role::Customer)
        .and_then(|p| non_empty(&p.address).or_else(|| non_empty(&p.ani)))
        .map(str::to_string)
}

fn address_from_session_other(e: &ConversationEvent) -> Option<String> {
    e.participants
        .iter()
        .flat_map(Participant::media_sessions)
        .filter_map(|s| s.other.as_ref())
        .find_map(|a| non_empty(&a.address_normalized).or_else(|| non_empty(&a.address_raw)))
        .map(str::to_string)
}

fn address_from_analytics_ani(e: &ConversationEvent) -> Option<String> {
    e.with_role(Role::Customer)
        .flat_map(|p| p.sessions.iter())
        .find_map(|s| non_empty(&s.ani))
        .map(str::to_string)
}

const ADDRESS: &[Extractor<String>] = &[
    address_from_customer,
    address_from_session_other,
    address_from_analytics_ani,
];

// --- direction ---

fn known_direction(raw: Option<&str>) -> Option<Direction> {
    raw.map(Direction::from_platform)
        .filter(|d| *d != Direction::Unknown)
}

fn direction_from_origin(e: &ConversationEvent) -> Option<Direction> {
    known_direction(e.originating_direction.as_deref())
}

fn direction_from_media_sessions(e: &ConversationEvent) -> Option<Direction> {
    let customer_first = e
        .with_role(Role::Customer)
        .chain(e.participants.iter().filter(|p| p.role() != Role::Customer));
    customer_first
        .flat_map(Participant::media_sessions)
        .find_map(|s| known_direction(s.direction.as_deref()))
}

fn direction_from_analytics(e: &ConversationEvent) -> Option<Direction> {
    e.participants
        .iter()
        .flat_map(|p| p.sessions.iter())
        .find_map(|s| known_direction(s.direction.as_deref()))
}

const DIRECTION: &[Extractor<Direction>] = &[
    direction_from_origin,
    direction_from_media_sessions,
    direction_from_analytics,
];

// --- media ---

fn media_callback(e: &ConversationEvent) -> Option<MediaType> {
    let callback_leg = e.participants.iter().any(|p| !p.callbacks.is_empty());
    let callback_session = e.participants.iter().flat_map(|p| p.sessions.iter()).any(|s| {
        s.media_type
            .as_deref()
            .is_some_and(|m| MediaType::from_platform(m) == MediaType::Callback)
    });
    (callback_leg || callback_session).then_some(MediaType::Callback)
}

fn media_from_event_field(e: &ConversationEvent) -> Option<MediaType> {
    e.media_type
        .as_deref()
        .map(MediaType::from_platform)
        .filter(|m| *m != MediaType::Unknown)
}

fn media_from_legs(e: &ConversationEvent) -> Option<MediaType> {
    if e.participants.iter().any(|p| !p.calls.is_empty()) {
        return Some(MediaType::Voice);
    }
    e.participants
        .iter()
        .any(|p| !p.chats.is_empty() || !p.messages.is_empty() || !p.emails.is_empty())
        .then_some(MediaType::Message)
}

fn media_from_analytics(e: &ConversationEvent) -> Option<MediaType> {
    e.participants
        .iter()
        .flat_map(|p| p.sessions.iter())
        .filter_map(|s| s.media_type.as_deref())
        .map(MediaType::from_platform)
        .find(|m| *m != MediaType::Unknown)
}

const MEDIA: &[Extractor<MediaType>] = &[
    media_callback,
    media_from_event_field,
    media_from_legs,
    media_from_analytics,
];

// --- wait ---

fn entered_from_acd(e: &ConversationEvent) -> Option<DateTime<Utc>> {
    e.primary(Role::Queue).and_then(|p| {
        instant(&p.start_time)
            .or_else(|| instant(&p.connected_time))
            .or_else(|| p.media_sessions().find_map(|s| instant(&s.connected_time)))
    })
}

fn entered_from_queue_segment(e: &ConversationEvent) -> Option<DateTime<Utc>> {
    e.with_role(Role::Queue)
        .flat_map(Participant::segments)
        .find_map(|s| instant(&s.segment_start))
}

fn entered_from_conversation_start(e: &ConversationEvent) -> Option<DateTime<Utc>> {
    instant(&e.conversation_start).or_else(|| instant(&e.start_time))
}

const QUEUE_ENTERED: &[Extractor<DateTime<Utc>>] = &[
    entered_from_acd,
    entered_from_queue_segment,
    entered_from_conversation_start,
];

fn answered_from_agent(e: &ConversationEvent) -> Option<DateTime<Utc>> {
    e.primary(Role::Agent).and_then(|p| {
        instant(&p.connected_time)
            .or_else(|| p.media_sessions().find_map(|s| instant(&s.connected_time)))
    })
}

fn answered_from_agent_segment(e: &ConversationEvent) -> Option<DateTime<Utc>> {
    e.primary(Role::Agent)
        .and_then(|p| p.segments().find_map(|s| instant(&s.segment_start)))
}

fn answered_from_agent_start(e: &ConversationEvent) -> Option<DateTime<Utc>> {
    e.primary(Role::Agent).and_then(|p| instant(&p.start_time))
}

const ANSWERED: &[Extractor<DateTime<Utc>>] = &[
    answered_from_agent,
    answered_from_agent_segment,
    answered_from_agent_start,
];

/// Wait clock for a conversation in `state`.
///
/// Waiting and IVR conversations get a clock that keeps running from the
/// moment the caller entered; answered ones get the frozen queue wait.
pub fn wait_clock(event: &ConversationEvent, state: InteractionState) -> Option<WaitClock> {
    let entered = first_match(event, QUEUE_ENTERED)?;
    match state {
        InteractionState::Waiting | InteractionState::Ivr => {
            Some(WaitClock::running(Duration::ZERO, entered))
        }
        InteractionState::Interacting => {
            let answered = first_match(event, ANSWERED)?;
            let waited = (answered - entered).to_std().unwrap_or_default();
            Some(WaitClock::frozen(waited, answered))
        }
        InteractionState::Unknown => None,
    }
}

/// Context known from where a payload came from rather than from its body.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractHint<'a> {
    /// Conversation id from an org-wide conversation topic.
    pub conversation_id: Option<&'a str>,
    /// Queue id from a queue-scoped topic.
    pub queue_id: Option<&'a str>,
}

/// Result of interpreting one conversation payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// The conversation is in flight.
    Live(ConversationRecord),
    /// The conversation ended, or nobody is left on it.
    Gone(String),
}

/// Interpret a conversation payload from either path.
pub fn extract_conversation(
    body: &Value,
    hint: ExtractHint<'_>,
    source: RecordSource,
    now: DateTime<Utc>,
) -> Result<Extraction, LivedeskError> {
    if !body.is_object() {
        return Err(LivedeskError::Malformed(
            "conversation body is not an object".into(),
        ));
    }
    let event = ConversationEvent::deserialize(body)
        .map_err(|e| LivedeskError::Malformed(format!("conversation body: {e}")))?;
    let conversation_id = event
        .conversation_id()
        .or(hint.conversation_id)
        .ok_or_else(|| LivedeskError::Malformed("conversation body has no id".into()))?
        .to_string();

    let state = interaction_state(&event);
    if is_ended(&event) || (state == InteractionState::Unknown && !has_any_active(&event)) {
        return Ok(Extraction::Gone(conversation_id));
    }

    let mut record = ConversationRecord::new(conversation_id, state, source, now);
    record.queue_id = first_match(&event, QUEUE_ID).or_else(|| hint.queue_id.map(str::to_string));
    record.queue_name = first_match(&event, QUEUE_NAME);
    record.direction = first_match(&event, DIRECTION).unwrap_or(Direction::Unknown);
    record.media_type = first_match(&event, MEDIA).unwrap_or(MediaType::Unknown);
    record.wait = wait_clock(&event, state);
    record.agent_id = first_match(&event, AGENT_ID);
    record.agent_name = first_match(&event, AGENT_NAME);
    record.address = first_match(&event, ADDRESS);
    Ok(Extraction::Live(record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        parse_instant("2026-03-01T10:00:00Z").expect("valid instant")
    }

    fn live(body: Value) -> ConversationRecord {
        match extract_conversation(&body, ExtractHint::default(), RecordSource::Push, now())
            .expect("should extract")
        {
            Extraction::Live(record) => record,
            Extraction::Gone(id) => panic!("expected live record, got gone {id}"),
        }
    }

    fn queued_call() -> Value {
        json!({
            "id": "c1",
            "participants": [
                {
                    "purpose": "customer",
                    "address": "tel:+15550100",
                    "calls": [{ "state": "connected", "direction": "inbound" }]
                },
                {
                    "purpose": "acd",
                    "queueId": "q1",
                    "name": "Support",
                    "startTime": "2026-03-01T09:58:00Z",
                    "calls": [{ "state": "connected" }]
                }
            ]
        })
    }

    #[test]
    fn queued_call_is_waiting_with_running_clock() {
        let record = live(queued_call());
        assert_eq!(record.conversation_id, "c1");
        assert_eq!(record.state, InteractionState::Waiting);
        assert_eq!(record.queue_id.as_deref(), Some("q1"));
        assert_eq!(record.queue_name.as_deref(), Some("Support"));
        assert_eq!(record.direction, Direction::Inbound);
        assert_eq!(record.media_type, MediaType::Voice);
        assert_eq!(record.address.as_deref(), Some("tel:+15550100"));
        assert_eq!(record.agent_id, None);
        assert_eq!(record.wait_at(now()), Some(Duration::from_secs(120)));
    }

    #[test]
    fn connected_agent_makes_it_interacting_with_frozen_wait() {
        let mut body = queued_call();
        body["participants"][1]["calls"][0]["state"] = json!("disconnected");
        body["participants"][1]["calls"][0]["disconnectedTime"] = json!("2026-03-01T09:59:00Z");
        body["participants"]
            .as_array_mut()
            .expect("participants array")
            .push(json!({
                "purpose": "agent",
                "userId": "a1",
                "name": "Ada",
                "connectedTime": "2026-03-01T09:59:30Z",
                "calls": [{ "state": "connected" }]
            }));

        let record = live(body);
        assert_eq!(record.state, InteractionState::Interacting);
        assert_eq!(record.agent_id.as_deref(), Some("a1"));
        assert_eq!(record.agent_name.as_deref(), Some("Ada"));
        let wait = record.wait.expect("wait clock");
        assert!(!wait.running);
        assert_eq!(wait.elapsed_at(now()), Duration::from_secs(90));
    }

    #[test]
    fn ivr_only_conversation_is_ivr() {
        let record = live(json!({
            "id": "c2",
            "participants": [
                { "purpose": "customer", "calls": [{ "state": "connected" }] },
                { "purpose": "ivr", "startTime": "2026-03-01T09:59:50Z" }
            ]
        }));
        assert_eq!(record.state, InteractionState::Ivr);
        assert_eq!(record.wait_at(now()), None);
    }

    #[test]
    fn conversation_end_marks_gone() {
        let mut body = queued_call();
        body["conversationEnd"] = json!("2026-03-01T09:59:00Z");
        let result =
            extract_conversation(&body, ExtractHint::default(), RecordSource::Push, now());
        assert_eq!(result.expect("extract"), Extraction::Gone("c1".into()));
    }

    #[test]
    fn unknown_with_nobody_active_is_gone() {
        let body = json!({
            "id": "c3",
            "participants": [
                { "purpose": "customer", "calls": [{ "state": "disconnected" }] }
            ]
        });
        let result =
            extract_conversation(&body, ExtractHint::default(), RecordSource::Push, now());
        assert_eq!(result.expect("extract"), Extraction::Gone("c3".into()));
    }

    #[test]
    fn callback_leg_wins_over_voice() {
        let mut body = queued_call();
        body["participants"][1]["callbacks"] = json!([{ "state": "alerting" }]);
        assert_eq!(live(body).media_type, MediaType::Callback);
    }

    #[test]
    fn analytics_shape_is_understood() {
        let record = live(json!({
            "conversationId": "c9",
            "conversationStart": "2026-03-01T09:55:00Z",
            "originatingDirection": "outbound",
            "participants": [
                {
                    "purpose": "acd",
                    "participantName": "Billing",
                    "sessions": [{
                        "mediaType": "message",
                        "segments": [{
                            "segmentType": "interact",
                            "queueId": "q7",
                            "segmentStart": "2026-03-01T09:56:00Z"
                        }]
                    }]
                }
            ]
        }));
        assert_eq!(record.conversation_id, "c9");
        assert_eq!(record.state, InteractionState::Waiting);
        assert_eq!(record.queue_id.as_deref(), Some("q7"));
        assert_eq!(record.queue_name.as_deref(), Some("Billing"));
        assert_eq!(record.direction, Direction::Outbound);
        assert_eq!(record.media_type, MediaType::Message);
        assert_eq!(record.wait_at(now()), Some(Duration::from_secs(240)));
    }

    #[test]
    fn hints_fill_missing_id_and_queue() {
        let body = json!({
            "participants": [
                { "purpose": "acd", "calls": [{ "state": "alerting" }] }
            ]
        });
        let hint = ExtractHint {
            conversation_id: Some("c5"),
            queue_id: Some("q5"),
        };
        match extract_conversation(&body, hint, RecordSource::Push, now()).expect("extract") {
            Extraction::Live(record) => {
                assert_eq!(record.conversation_id, "c5");
                assert_eq!(record.queue_id.as_deref(), Some("q5"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn null_lists_and_missing_id_are_handled() {
        let body = json!({ "id": "c6", "participants": null });
        assert_eq!(
            extract_conversation(&body, ExtractHint::default(), RecordSource::Pull, now())
                .expect("extract"),
            Extraction::Gone("c6".into())
        );

        let err = extract_conversation(
            &json!({ "participants": [] }),
            ExtractHint::default(),
            RecordSource::Push,
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, LivedeskError::Malformed(_)));

        let err = extract_conversation(&json!("x"), ExtractHint::default(), RecordSource::Push, now())
            .unwrap_err();
        assert!(matches!(err, LivedeskError::Malformed(_)));
    }

    #[test]
    fn first_match_respects_order() {
        let event = ConversationEvent {
            originating_direction: Some("inbound".into()),
            ..Default::default()
        };
        fn always_outbound(_: &ConversationEvent) -> Option<Direction> {
            Some(Direction::Outbound)
        }
        assert_eq!(
            first_match(&event, &[direction_from_origin, always_outbound]),
            Some(Direction::Inbound)
        );
        assert_eq!(
            first_match(&event, &[direction_from_analytics, always_outbound]),
            Some(Direction::Outbound)
        );
    }

    #[test]
    fn parses_zoneless_timestamps_as_utc() {
        let a = parse_instant("2026-03-01T10:00:00.250").expect("zone-less");
        let b = parse_instant("2026-03-01T10:00:00.250Z").expect("rfc3339");
        assert_eq!(a, b);
        assert_eq!(parse_instant("yesterday"), None);
    }
}
