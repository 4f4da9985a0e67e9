// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Live entity records and their classification enums.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Uppercase a platform token and unify separators: `"On Queue"` -> `"ON_QUEUE"`.
fn normalize_token(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

/// Coarse presence bucket of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
pub enum PresenceBucket {
    Available,
    Busy,
    Away,
    Break,
    Meal,
    Meeting,
    Training,
    Offline,
}

impl PresenceBucket {
    /// Map a platform system presence to a bucket; `None` for unknown values.
    pub fn from_system_presence(raw: &str) -> Option<Self> {
        match normalize_token(raw).as_str() {
            "AVAILABLE" | "ON_QUEUE" | "IDLE" => Some(Self::Available),
            "BUSY" => Some(Self::Busy),
            "AWAY" => Some(Self::Away),
            "BREAK" => Some(Self::Break),
            "MEAL" => Some(Self::Meal),
            "MEETING" => Some(Self::Meeting),
            "TRAINING" => Some(Self::Training),
            "OFFLINE" => Some(Self::Offline),
            _ => None,
        }
    }
}

/// ACD routing status of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
pub enum RoutingStatus {
    Idle,
    Interacting,
    NotResponding,
    OffQueue,
}

impl RoutingStatus {
    pub fn from_platform(raw: &str) -> Option<Self> {
        match normalize_token(raw).as_str() {
            "IDLE" => Some(Self::Idle),
            "INTERACTING" | "COMMUNICATING" => Some(Self::Interacting),
            "NOT_RESPONDING" => Some(Self::NotResponding),
            "OFF_QUEUE" => Some(Self::OffQueue),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum Direction {
    Inbound,
    Outbound,
    Unknown,
}

impl Direction {
    pub fn from_platform(raw: &str) -> Self {
        match normalize_token(raw).as_str() {
            "INBOUND" => Self::Inbound,
            "OUTBOUND" => Self::Outbound,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum MediaType {
    Voice,
    Message,
    Callback,
    Unknown,
}

impl MediaType {
    pub fn from_platform(raw: &str) -> Self {
        match normalize_token(raw).as_str() {
            "VOICE" | "CALL" | "CALLS" => Self::Voice,
            "CALLBACK" | "CALLBACKS" => Self::Callback,
            "MESSAGE" | "MESSAGES" | "CHAT" | "CHATS" | "WEBCHAT" | "EMAIL" | "EMAILS" => {
                Self::Message
            }
            _ => Self::Unknown,
        }
    }
}

/// Lifecycle state of a conversation from the contact center's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum InteractionState {
    Waiting,
    Interacting,
    Ivr,
    Unknown,
}

impl InteractionState {
    /// Qualitative rank: Unknown < Waiting = Ivr < Interacting.
    pub fn rank(self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::Waiting | Self::Ivr => 1,
            Self::Interacting => 2,
        }
    }
}

/// Which path produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum RecordSource {
    Push,
    Pull,
}

/// Elapsed wait, stored as a baseline plus the instant it was measured.
///
/// While running the value keeps growing at read time; once a conversation is
/// answered the clock is frozen at the measured wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitClock {
    pub baseline: Duration,
    pub measured_at: DateTime<Utc>,
    pub running: bool,
}

impl WaitClock {
    pub fn running(baseline: Duration, measured_at: DateTime<Utc>) -> Self {
        Self {
            baseline,
            measured_at,
            running: true,
        }
    }

    pub fn frozen(baseline: Duration, measured_at: DateTime<Utc>) -> Self {
        Self {
            baseline,
            measured_at,
            running: false,
        }
    }

    /// `baseline + (now - measured_at)` while running, the baseline otherwise.
    pub fn elapsed_at(&self, now: DateTime<Utc>) -> Duration {
        if !self.running {
            return self.baseline;
        }
        let since = (now - self.measured_at).to_std().unwrap_or_default();
        self.baseline + since
    }

    /// Stop the clock at its value for `now`.
    pub fn freeze_at(&self, now: DateTime<Utc>) -> Self {
        Self::frozen(self.elapsed_at(now), now)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceRecord {
    pub user_id: String,
    pub presence: PresenceBucket,
    /// Platform modification time, or the receipt time when absent.
    pub observed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub source: RecordSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingRecord {
    pub user_id: String,
    pub status: RoutingStatus,
    /// Platform status start time, or the receipt time when absent.
    pub observed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub source: RecordSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub conversation_id: String,
    pub queue_id: Option<String>,
    pub queue_name: Option<String>,
    pub direction: Direction,
    pub media_type: MediaType,
    pub state: InteractionState,
    pub wait: Option<WaitClock>,
    pub agent_id: Option<String>,
    pub agent_name: Option<String>,
    pub address: Option<String>,
    pub ended: bool,
    pub source: RecordSource,
    pub updated_at: DateTime<Utc>,
}

impl ConversationRecord {
    /// A bare record with every optional fact unknown.
    pub fn new(
        conversation_id: impl Into<String>,
        state: InteractionState,
        source: RecordSource,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            queue_id: None,
            queue_name: None,
            direction: Direction::Unknown,
            media_type: MediaType::Unknown,
            state,
            wait: None,
            agent_id: None,
            agent_name: None,
            address: None,
            ended: false,
            source,
            updated_at,
        }
    }

    /// Current wait as of `now`, if a wait baseline is known.
    pub fn wait_at(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.wait.map(|w| w.elapsed_at(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).single().expect("valid timestamp")
    }

    #[test]
    fn presence_mapping_is_case_and_separator_insensitive() {
        assert_eq!(
            PresenceBucket::from_system_presence("On Queue"),
            Some(PresenceBucket::Available)
        );
        assert_eq!(
            PresenceBucket::from_system_presence("meal"),
            Some(PresenceBucket::Meal)
        );
        assert_eq!(
            PresenceBucket::from_system_presence("OFFLINE"),
            Some(PresenceBucket::Offline)
        );
        assert_eq!(PresenceBucket::from_system_presence("Vacation"), None);
    }

    #[test]
    fn routing_mapping() {
        assert_eq!(
            RoutingStatus::from_platform("NOT_RESPONDING"),
            Some(RoutingStatus::NotResponding)
        );
        assert_eq!(
            RoutingStatus::from_platform("communicating"),
            Some(RoutingStatus::Interacting)
        );
        assert_eq!(RoutingStatus::from_platform("off-queue"), Some(RoutingStatus::OffQueue));
        assert_eq!(RoutingStatus::from_platform("?"), None);
    }

    #[test]
    fn media_and_direction_fall_back_to_unknown() {
        assert_eq!(MediaType::from_platform("callback"), MediaType::Callback);
        assert_eq!(MediaType::from_platform("webchat"), MediaType::Message);
        assert_eq!(MediaType::from_platform("fax"), MediaType::Unknown);
        assert_eq!(Direction::from_platform("Outbound"), Direction::Outbound);
        assert_eq!(Direction::from_platform(""), Direction::Unknown);
    }

    #[test]
    fn state_rank_orders_lifecycle() {
        assert!(InteractionState::Interacting.rank() > InteractionState::Waiting.rank());
        assert_eq!(InteractionState::Waiting.rank(), InteractionState::Ivr.rank());
        assert!(InteractionState::Ivr.rank() > InteractionState::Unknown.rank());
    }

    #[test]
    fn running_wait_clock_grows_and_frozen_does_not() {
        let clock = WaitClock::running(Duration::from_secs(30), t(0));
        assert_eq!(clock.elapsed_at(t(10)), Duration::from_secs(40));
        // A read before the measurement never goes below the baseline.
        assert_eq!(clock.elapsed_at(t(-5)), Duration::from_secs(30));

        let frozen = clock.freeze_at(t(20));
        assert!(!frozen.running);
        assert_eq!(frozen.elapsed_at(t(500)), Duration::from_secs(50));
    }
}
