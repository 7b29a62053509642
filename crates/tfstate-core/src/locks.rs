//! In-process lock table.
//!
//! Maps each state name to the claim currently holding it. Every
//! check-then-mutate sequence runs under a single write guard, so two
//! concurrent claims can never both observe "unlocked".

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use tracing::debug;

use crate::types::{LockInfo, StateName};

/// Outcome of [`LockTable::acquire`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquire {
    /// The caller holds the lock. Carries the stored claim, which is the
    /// original one when the same ID re-locks.
    Acquired(LockInfo),
    /// A different claim holds the lock.
    Conflict(LockInfo),
}

/// Outcome of [`LockTable::release`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Release {
    Released,
    /// Nothing was locked.
    NoOp,
    /// A different claim holds the lock and the release was not forced.
    Conflict(LockInfo),
}

/// Mutex-guarded map from state name to held lock.
///
/// Locks live only in memory and are dropped on restart; clients are
/// expected to re-acquire.
#[derive(Debug, Default)]
pub struct LockTable {
    locks: RwLock<HashMap<StateName, LockInfo>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the lock for `name`.
    ///
    /// Re-sending a claim with the ID that already holds the lock succeeds
    /// without mutation, so client retries are not rejected.
    pub fn acquire(&self, name: &StateName, claim: LockInfo) -> Acquire {
        let mut locks = self.locks.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = locks.get(name) {
            if existing.same_claim(&claim) {
                debug!(state = %name, id = %existing.id, "lock re-acquired");
                return Acquire::Acquired(existing.clone());
            }
            return Acquire::Conflict(existing.clone());
        }

        debug!(state = %name, id = %claim.id, "lock acquired");
        locks.insert(name.clone(), claim.clone());
        Acquire::Acquired(claim)
    }

    /// Release the lock for `name` on behalf of `requestor_id`.
    ///
    /// An empty `requestor_id` forces the release regardless of holder.
    pub fn release(&self, name: &StateName, requestor_id: &str) -> Release {
        let mut locks = self.locks.write().unwrap_or_else(PoisonError::into_inner);

        let Some(existing) = locks.get(name) else {
            return Release::NoOp;
        };

        if !requestor_id.is_empty() && requestor_id != existing.id {
            return Release::Conflict(existing.clone());
        }

        if requestor_id.is_empty() {
            debug!(state = %name, id = %existing.id, "lock force-released");
        } else {
            debug!(state = %name, id = %existing.id, "lock released");
        }
        locks.remove(name);
        Release::Released
    }

    /// Current holder of the lock for `name`, if any.
    pub fn peek(&self, name: &StateName) -> Option<LockInfo> {
        let locks = self.locks.read().unwrap_or_else(PoisonError::into_inner);
        locks.get(name).cloned()
    }

    /// Number of locks currently held.
    pub fn len(&self) -> usize {
        self.locks.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;

    fn name(s: &str) -> StateName {
        StateName::from_path(s).unwrap()
    }

    fn claim(id: &str, who: &str) -> LockInfo {
        LockInfo {
            id: id.to_string(),
            operation: "OperationTypeApply".to_string(),
            who: who.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn acquire_unlocked_echoes_claim() {
        let table = LockTable::new();
        let a = claim("a", "alice");

        assert_eq!(table.acquire(&name("proj"), a.clone()), Acquire::Acquired(a.clone()));
        assert_eq!(table.peek(&name("proj")), Some(a));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn reacquire_same_id_returns_original_claim() {
        let table = LockTable::new();
        let original = claim("a", "alice");
        table.acquire(&name("proj"), original.clone());

        let retry = claim("a", "alice-retry");
        assert_eq!(
            table.acquire(&name("proj"), retry),
            Acquire::Acquired(original.clone())
        );
        assert_eq!(table.peek(&name("proj")), Some(original));
    }

    #[test]
    fn acquire_different_id_conflicts_without_mutation() {
        let table = LockTable::new();
        let a = claim("a", "alice");
        table.acquire(&name("proj"), a.clone());

        assert_eq!(
            table.acquire(&name("proj"), claim("b", "bob")),
            Acquire::Conflict(a.clone())
        );
        assert_eq!(table.peek(&name("proj")), Some(a));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn distinct_names_lock_independently() {
        let table = LockTable::new();
        table.acquire(&name("one"), claim("a", "alice"));

        assert!(matches!(
            table.acquire(&name("two"), claim("b", "bob")),
            Acquire::Acquired(_)
        ));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn release_matching_id() {
        let table = LockTable::new();
        table.acquire(&name("proj"), claim("a", "alice"));

        assert_eq!(table.release(&name("proj"), "a"), Release::Released);
        assert!(table.peek(&name("proj")).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn release_unlocked_is_noop() {
        let table = LockTable::new();
        assert_eq!(table.release(&name("proj"), "anything"), Release::NoOp);
        assert_eq!(table.release(&name("proj"), ""), Release::NoOp);
    }

    #[test]
    fn release_mismatched_id_conflicts_and_keeps_lock() {
        let table = LockTable::new();
        let a = claim("a", "alice");
        table.acquire(&name("proj"), a.clone());

        assert_eq!(table.release(&name("proj"), "b"), Release::Conflict(a.clone()));
        assert_eq!(table.peek(&name("proj")), Some(a));
    }

    #[test]
    fn force_release_with_empty_id() {
        let table = LockTable::new();
        table.acquire(&name("proj"), claim("a", "alice"));

        assert_eq!(table.release(&name("proj"), ""), Release::Released);
        assert!(table.peek(&name("proj")).is_none());
    }

    #[test]
    fn concurrent_acquire_has_single_winner() {
        const CONTENDERS: usize = 32;

        let table = Arc::new(LockTable::new());
        let barrier = Arc::new(Barrier::new(CONTENDERS));

        let handles: Vec<_> = (0..CONTENDERS)
            .map(|i| {
                let table = Arc::clone(&table);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    table.acquire(&name("proj"), claim(&format!("claim-{i}"), "racer"))
                })
            })
            .collect();

        let outcomes: Vec<Acquire> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners: Vec<&LockInfo> = outcomes
            .iter()
            .filter_map(|o| match o {
                Acquire::Acquired(info) => Some(info),
                Acquire::Conflict(_) => None,
            })
            .collect();

        assert_eq!(winners.len(), 1);
        assert_eq!(table.len(), 1);

        // Every loser saw the winner's claim.
        let winner = winners[0].clone();
        for outcome in &outcomes {
            if let Acquire::Conflict(held) = outcome {
                assert_eq!(held, &winner);
            }
        }
        assert_eq!(table.peek(&name("proj")), Some(winner));
    }
}
