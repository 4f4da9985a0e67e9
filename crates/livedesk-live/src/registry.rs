// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Explicit per-org shared state.
//!
//! Sessions for the same org share one [`LiveStore`] and every session
//! shares one [`ReservationBook`]. The registry is passed around as an
//! `Arc`; there is no process-global cache.

use std::sync::Arc;

use dashmap::DashMap;
use livedesk_core::OrgId;
use tracing::debug;

use crate::reservation::ReservationBook;
use crate::store::LiveStore;

/// Shared state a session needs for one org.
#[derive(Debug, Clone)]
pub struct OrgHandle {
    pub org_id: OrgId,
    pub store: Arc<LiveStore>,
    pub reservations: Arc<ReservationBook>,
}

#[derive(Debug, Default)]
pub struct OrgRegistry {
    reservations: Arc<ReservationBook>,
    stores: DashMap<OrgId, Arc<LiveStore>>,
}

impl OrgRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the shared state for `org_id`.
    pub fn acquire(&self, org_id: &OrgId) -> OrgHandle {
        let store = self
            .stores
            .entry(org_id.clone())
            .or_insert_with(|| {
                debug!(org = %org_id, "creating live store");
                Arc::new(LiveStore::new())
            })
            .value()
            .clone();
        OrgHandle {
            org_id: org_id.clone(),
            store,
            reservations: self.reservations.clone(),
        }
    }

    /// Drop the org's store once no session holds it any more.
    pub fn release_idle(&self, org_id: &OrgId) -> bool {
        self.stores
            .remove_if(org_id, |_, store| Arc::strong_count(store) == 1)
            .is_some()
    }

    pub fn org_count(&self) -> usize {
        self.stores.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_org_shares_one_store() {
        let registry = OrgRegistry::new();
        let org = OrgId("org-1".into());
        let a = registry.acquire(&org);
        let b = registry.acquire(&org);
        assert!(Arc::ptr_eq(&a.store, &b.store));
        assert!(Arc::ptr_eq(&a.reservations, &b.reservations));
        assert_eq!(registry.org_count(), 1);
    }

    #[test]
    fn different_orgs_are_isolated_but_share_reservations() {
        let registry = OrgRegistry::new();
        let a = registry.acquire(&OrgId("a".into()));
        let b = registry.acquire(&OrgId("b".into()));
        assert!(!Arc::ptr_eq(&a.store, &b.store));
        assert!(Arc::ptr_eq(&a.reservations, &b.reservations));
    }

    #[test]
    fn idle_store_is_released_only_when_unused() {
        let registry = OrgRegistry::new();
        let org = OrgId("org".into());
        let handle = registry.acquire(&org);
        assert!(!registry.release_idle(&org));
        drop(handle);
        assert!(registry.release_idle(&org));
        assert_eq!(registry.org_count(), 0);
    }
}
