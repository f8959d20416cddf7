//! Stored plans awaiting apply
//!
//! A plan can be applied at most once. Taking a plan leaves a tombstone so a
//! second apply of the same id is rejected rather than reported as unknown.
//! Plans and tombstones both expire after the store's TTL, and the store never
//! holds more than its capacity: inserting past it drops the oldest entries.

use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use refit_foundation::{Plan, RefitError, RefitResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

const DEFAULT_TTL: Duration = Duration::from_secs(3_600);
const DEFAULT_CAPACITY: usize = 256;

enum State {
    Pending(Box<Plan>),
    Consumed,
}

struct Entry {
    state: State,
    stored_at: Instant,
    seq: u64,
}

pub struct PlanStore {
    plans: DashMap<Uuid, Entry>,
    ttl: Duration,
    capacity: usize,
    next_seq: AtomicU64,
}

impl Default for PlanStore {
    fn default() -> Self {
        Self::with_limits(DEFAULT_TTL, DEFAULT_CAPACITY)
    }
}

impl PlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(ttl: Duration, capacity: usize) -> Self {
        Self {
            plans: DashMap::new(),
            ttl,
            capacity: capacity.max(1),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Store a plan and return its id.
    pub fn insert(&self, plan: Plan) -> Uuid {
        let id = plan.id;
        self.put(id, State::Pending(Box::new(plan)));
        id
    }

    /// Remove a pending plan for applying.
    pub fn take(&self, id: Uuid) -> RefitResult<Plan> {
        self.evict_expired();
        match self.plans.entry(id) {
            MapEntry::Vacant(_) => Err(RefitError::not_found(format!("plan {}", id))),
            MapEntry::Occupied(mut entry) => {
                match std::mem::replace(&mut entry.get_mut().state, State::Consumed) {
                    State::Pending(plan) => Ok(*plan),
                    State::Consumed => Err(RefitError::invalid_request(format!(
                        "Plan {} has already been applied",
                        id
                    ))),
                }
            }
        }
    }

    /// Record that a plan applied directly, without being stored, was consumed.
    pub fn mark_consumed(&self, id: Uuid) {
        self.put(id, State::Consumed);
    }

    pub fn is_consumed(&self, id: Uuid) -> bool {
        self.plans
            .get(&id)
            .is_some_and(|e| matches!(e.state, State::Consumed) && !self.expired(&e))
    }

    pub fn pending_count(&self) -> usize {
        self.plans
            .iter()
            .filter(|e| matches!(e.state, State::Pending(_)) && !self.expired(e.value()))
            .count()
    }

    fn put(&self, id: Uuid, state: State) {
        self.evict_expired();
        let entry = Entry {
            state,
            stored_at: Instant::now(),
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
        };
        self.plans.insert(id, entry);
        self.evict_over_capacity();
    }

    fn expired(&self, entry: &Entry) -> bool {
        entry.stored_at.elapsed() >= self.ttl
    }

    fn evict_expired(&self) {
        let before = self.plans.len();
        self.plans.retain(|_, entry| !self.expired(entry));
        let evicted = before.saturating_sub(self.plans.len());
        if evicted > 0 {
            debug!(evicted, "Dropped expired plans");
        }
    }

    fn evict_over_capacity(&self) {
        let excess = self.plans.len().saturating_sub(self.capacity);
        if excess == 0 {
            return;
        }
        let mut by_age: Vec<(u64, Uuid)> = self
            .plans
            .iter()
            .map(|e| (e.value().seq, *e.key()))
            .collect();
        by_age.sort_unstable();
        for (_, id) in by_age.into_iter().take(excess) {
            self.plans.remove(&id);
        }
        debug!(evicted = excess, capacity = self.capacity, "Dropped oldest plans");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refit_foundation::{ErrorKind, RefactorOperation, WorkspaceEdit};

    fn plan() -> Plan {
        Plan::new(
            RefactorOperation::RenameFile {
                old_path: "/p/a.ts".into(),
                new_path: "/p/b.ts".into(),
                overwrite: false,
            },
            WorkspaceEdit::new(),
        )
    }

    #[test]
    fn test_take_once() {
        let store = PlanStore::new();
        let id = store.insert(plan());
        assert_eq!(store.pending_count(), 1);

        assert_eq!(store.take(id).unwrap().id, id);
        let err = store.take(id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(store.is_consumed(id));
        assert_eq!(store.pending_count(), 0);
    }

    #[test]
    fn test_unknown_plan() {
        let store = PlanStore::new();
        let err = store.take(Uuid::new_v4()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let store = PlanStore::with_limits(Duration::from_secs(60), 2);
        let first = store.insert(plan());
        let second = store.insert(plan());
        let third = store.insert(plan());

        assert_eq!(store.pending_count(), 2);
        assert_eq!(store.take(first).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(store.take(second).unwrap().id, second);
        assert_eq!(store.take(third).unwrap().id, third);
    }

    #[test]
    fn test_tombstones_count_against_capacity() {
        let store = PlanStore::with_limits(Duration::from_secs(60), 2);
        let applied = Uuid::new_v4();
        store.mark_consumed(applied);
        store.insert(plan());
        store.insert(plan());

        assert!(!store.is_consumed(applied));
        assert_eq!(store.pending_count(), 2);
    }

    #[test]
    fn test_expired_plan_is_not_found() {
        let store = PlanStore::with_limits(Duration::ZERO, 8);
        let id = store.insert(plan());

        assert_eq!(store.pending_count(), 0);
        assert_eq!(store.take(id).unwrap_err().kind(), ErrorKind::NotFound);
        store.mark_consumed(id);
        assert!(!store.is_consumed(id));
    }
}
