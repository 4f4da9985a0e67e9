// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cross-session de-duplication of rate-limited snapshot fetches.
//!
//! Sessions watching the same org share one [`ReservationBook`]. A session
//! must hold the reservation for `(org, purpose)` before fetching; the grant
//! lasts `min_interval` unless the holder releases it early after a failure.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use livedesk_core::{OrgId, SnapshotPurpose};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReservationKey {
    pub org_id: OrgId,
    pub purpose: SnapshotPurpose,
}

impl ReservationKey {
    pub fn new(org_id: OrgId, purpose: SnapshotPurpose) -> Self {
        Self { org_id, purpose }
    }
}

/// Proof of holding a reservation; needed to release it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub key: ReservationKey,
    token: u64,
}

#[derive(Debug, Clone, Copy)]
struct Grant {
    token: u64,
    granted_at: DateTime<Utc>,
    min_interval: Duration,
}

impl Grant {
    fn expired_at(&self, now: DateTime<Utc>) -> bool {
        (now - self.granted_at)
            .to_std()
            .is_ok_and(|held| held >= self.min_interval)
    }
}

#[derive(Debug, Default)]
pub struct ReservationBook {
    grants: DashMap<ReservationKey, Grant>,
    next_token: AtomicU64,
}

impl ReservationBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant the reservation unless another holder's grant is still inside
    /// its interval. The check and the grant happen under one entry lock.
    pub fn try_reserve(
        &self,
        key: ReservationKey,
        min_interval: Duration,
        now: DateTime<Utc>,
    ) -> Option<Reservation> {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed) + 1;
        let grant = Grant {
            token,
            granted_at: now,
            min_interval,
        };
        match self.grants.entry(key.clone()) {
            Entry::Occupied(mut slot) => {
                if !slot.get().expired_at(now) {
                    return None;
                }
                slot.insert(grant);
            }
            Entry::Vacant(slot) => {
                slot.insert(grant);
            }
        }
        Some(Reservation { key, token })
    }

    /// Give a reservation back early so another session may fetch.
    ///
    /// A release for a grant that was already replaced is a no-op.
    pub fn release(&self, reservation: &Reservation) -> bool {
        self.grants
            .remove_if(&reservation.key, |_, grant| grant.token == reservation.token)
            .is_some()
    }

    /// True while a grant for `key` is inside its interval.
    pub fn is_held(&self, key: &ReservationKey, now: DateTime<Utc>) -> bool {
        self.grants.get(key).is_some_and(|g| !g.expired_at(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).single().expect("valid timestamp")
    }

    fn key(purpose: SnapshotPurpose) -> ReservationKey {
        ReservationKey::new(OrgId("org".into()), purpose)
    }

    #[test]
    fn second_reserve_inside_interval_is_refused() {
        let book = ReservationBook::new();
        let interval = Duration::from_secs(60);
        assert!(book.try_reserve(key(SnapshotPurpose::UserStatus), interval, t(0)).is_some());
        assert!(book.try_reserve(key(SnapshotPurpose::UserStatus), interval, t(59)).is_none());
        assert!(book.try_reserve(key(SnapshotPurpose::UserStatus), interval, t(60)).is_some());
    }

    #[test]
    fn purposes_and_orgs_are_independent() {
        let book = ReservationBook::new();
        let interval = Duration::from_secs(60);
        assert!(book.try_reserve(key(SnapshotPurpose::UserStatus), interval, t(0)).is_some());
        assert!(book.try_reserve(key(SnapshotPurpose::Conversations), interval, t(0)).is_some());
        let other = ReservationKey::new(OrgId("other".into()), SnapshotPurpose::UserStatus);
        assert!(book.try_reserve(other, interval, t(0)).is_some());
    }

    #[test]
    fn release_frees_only_the_current_grant() {
        let book = ReservationBook::new();
        let interval = Duration::from_secs(60);
        let k = key(SnapshotPurpose::Conversations);

        let first = book.try_reserve(k.clone(), interval, t(0)).expect("granted");
        assert!(book.release(&first));
        assert!(!book.is_held(&k, t(1)));

        let second = book.try_reserve(k.clone(), interval, t(1)).expect("granted");
        assert!(!book.release(&first), "stale release must not free a newer grant");
        assert!(book.is_held(&k, t(2)));
        assert!(book.release(&second));
    }
}
