use std::collections::{HashMap, HashSet};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use log::{debug, trace};
use rand::Rng;

use crate::error::BufferPoolError;
use crate::page_id::PageId;
use crate::permissions::LockMode;
use crate::transaction_id::TransactionId;
use crate::types::BufferResult;

/// `Shared{holders}` keeps the invariant `|holders| >= 1` implicit (the
/// entry is removed from the map once it empties); `Exclusive` carries
/// its single holder directly rather than a one-element set, so
/// "|holders| = 1 whenever mode = Exclusive" is true by construction.
#[derive(Debug)]
enum LockState {
    Shared(HashSet<TransactionId>),
    Exclusive(TransactionId),
}

struct Inner {
    locks: HashMap<PageId, LockState>,
    held_by: HashMap<TransactionId, HashSet<PageId>>,
}

/// Page-granularity two-phase lock manager. A single mutex guards both
/// the lock table and the transaction-index projection so every
/// compatibility decision and its resulting mutation are atomic; a
/// single condvar wakes every blocked acquirer on any release (no
/// per-page condition -- wakeups are rare enough that this doesn't
/// matter at this scale).
pub struct LockTable {
    inner: Mutex<Inner>,
    cond: Condvar,
}

impl LockTable {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                locks: HashMap::new(),
                held_by: HashMap::new(),
            }),
            cond: Condvar::new(),
        }
    }

    /// Blocks until `tid` holds `mode` on `pid`, or until the request's
    /// randomly sampled timeout (uniform in `[0, max_timeout_millis]`)
    /// elapses, in which case it fails with `TransactionAborted`.
    pub fn acquire(
        &self,
        tid: TransactionId,
        pid: PageId,
        mode: LockMode,
        max_timeout_millis: u64,
    ) -> BufferResult<()> {
        let timeout = Duration::from_millis(rand::thread_rng().gen_range(0, max_timeout_millis + 1));
        let started = Instant::now();

        let mut guard = self.inner.lock().unwrap();
        loop {
            if Self::try_grant(&mut guard, tid, pid, mode) {
                trace!("lock granted: tid={} pid={} mode={:?}", tid, pid, mode);
                return Ok(());
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                debug!(
                    "lock acquire timed out: tid={} pid={} mode={:?} after {:?}",
                    tid, pid, mode, elapsed
                );
                return Err(BufferPoolError::TransactionAborted { tid });
            }

            let (new_guard, _) = self
                .cond
                .wait_timeout(guard, timeout - elapsed)
                .unwrap();
            guard = new_guard;
        }
    }

    /// Evaluate compatibility for `(tid, pid, mode)` against the table in
    /// §4.1 and, if granted, install the resulting state atomically.
    fn try_grant(inner: &mut Inner, tid: TransactionId, pid: PageId, mode: LockMode) -> bool {
        let grantable = match inner.locks.get(&pid) {
            None => true,
            Some(LockState::Shared(holders)) => match mode {
                LockMode::Shared => true,
                LockMode::Exclusive => holders.len() == 1 && holders.contains(&tid),
            },
            Some(LockState::Exclusive(holder)) => *holder == tid,
        };
        if !grantable {
            return false;
        }

        let current = inner.locks.remove(&pid);
        let next_state = match (current, mode) {
            (None, LockMode::Shared) => {
                let mut holders = HashSet::new();
                holders.insert(tid);
                LockState::Shared(holders)
            }
            (None, LockMode::Exclusive) => LockState::Exclusive(tid),
            (Some(LockState::Shared(mut holders)), LockMode::Shared) => {
                holders.insert(tid);
                LockState::Shared(holders)
            }
            // Sole holder requesting Exclusive: in-place upgrade, atomic
            // with respect to other acquirers because we hold `inner`'s
            // mutex for the whole decide-and-mutate step.
            (Some(LockState::Shared(_)), LockMode::Exclusive) => LockState::Exclusive(tid),
            // Already the exclusive holder; dominates regardless of the
            // mode requested this time.
            (Some(LockState::Exclusive(holder)), _) => LockState::Exclusive(holder),
        };
        inner.locks.insert(pid, next_state);
        inner
            .held_by
            .entry(tid)
            .or_insert_with(HashSet::new)
            .insert(pid);
        true
    }

    /// Idempotent: releasing a lock `tid` doesn't hold is a no-op.
    pub fn release(&self, tid: TransactionId, pid: PageId) {
        let mut guard = self.inner.lock().unwrap();
        Self::release_locked(&mut guard, tid, pid);
        drop(guard);
        self.cond.notify_all();
    }

    fn release_locked(inner: &mut Inner, tid: TransactionId, pid: PageId) {
        match inner.locks.get_mut(&pid) {
            Some(LockState::Shared(holders)) => {
                holders.remove(&tid);
                if holders.is_empty() {
                    inner.locks.remove(&pid);
                }
            }
            Some(LockState::Exclusive(holder)) => {
                if *holder == tid {
                    inner.locks.remove(&pid);
                }
            }
            None => {}
        }
        if let Some(set) = inner.held_by.get_mut(&tid) {
            set.remove(&pid);
            if set.is_empty() {
                inner.held_by.remove(&tid);
            }
        }
    }

    pub fn release_all(&self, tid: TransactionId) {
        let mut guard = self.inner.lock().unwrap();
        let pids: Vec<PageId> = guard
            .held_by
            .get(&tid)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        for pid in pids {
            Self::release_locked(&mut guard, tid, pid);
        }
        drop(guard);
        self.cond.notify_all();
    }

    pub fn holds(&self, tid: TransactionId, pid: PageId) -> bool {
        let guard = self.inner.lock().unwrap();
        match guard.locks.get(&pid) {
            Some(LockState::Shared(holders)) => holders.contains(&tid),
            Some(LockState::Exclusive(holder)) => *holder == tid,
            None => false,
        }
    }

    pub fn pages_held_by(&self, tid: TransactionId) -> Vec<PageId> {
        let guard = self.inner.lock().unwrap();
        guard
            .held_by
            .get(&tid)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }
}

impl Default for LockTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn pid(n: u32) -> PageId {
        PageId::new(0, n)
    }

    #[test]
    fn shared_sharing() {
        let locks = LockTable::new();
        let t1 = TransactionId::new();
        let t2 = TransactionId::new();
        locks.acquire(t1, pid(1), LockMode::Shared, 1000).unwrap();
        locks.acquire(t2, pid(1), LockMode::Shared, 1000).unwrap();
        assert!(locks.holds(t1, pid(1)));
        assert!(locks.holds(t2, pid(1)));
    }

    #[test]
    fn exclusive_blocks_shared_until_timeout() {
        let locks = LockTable::new();
        let t1 = TransactionId::new();
        let t2 = TransactionId::new();
        locks
            .acquire(t1, pid(1), LockMode::Exclusive, 1000)
            .unwrap();
        // `acquire`'s timeout is sampled uniformly from `[0, 50]` per call
        // (lock_table.rs's own randomized-timeout policy), so only the
        // error kind is asserted here; the elapsed wait can legitimately
        // land anywhere in that range, not just near the ceiling.
        let err = locks.acquire(t2, pid(1), LockMode::Shared, 50);
        assert!(matches!(err, Err(BufferPoolError::TransactionAborted { .. })));
    }

    #[test]
    fn lone_holder_upgrade_is_immediate() {
        let locks = LockTable::new();
        let t1 = TransactionId::new();
        locks.acquire(t1, pid(1), LockMode::Shared, 1000).unwrap();
        locks
            .acquire(t1, pid(1), LockMode::Exclusive, 1000)
            .unwrap();
        assert!(locks.holds(t1, pid(1)));
    }

    #[test]
    fn release_is_idempotent() {
        let locks = LockTable::new();
        let t1 = TransactionId::new();
        locks.acquire(t1, pid(1), LockMode::Shared, 1000).unwrap();
        locks.release(t1, pid(1));
        locks.release(t1, pid(1));
        assert!(!locks.holds(t1, pid(1)));
        assert!(locks.pages_held_by(t1).is_empty());
    }

    #[test]
    fn release_all_frees_every_page() {
        let locks = LockTable::new();
        let t1 = TransactionId::new();
        locks.acquire(t1, pid(1), LockMode::Shared, 1000).unwrap();
        locks.acquire(t1, pid(2), LockMode::Exclusive, 1000).unwrap();
        locks.release_all(t1);
        assert!(!locks.holds(t1, pid(1)));
        assert!(!locks.holds(t1, pid(2)));
    }

    /// Scenario 4 in SPEC_FULL.md: T1 holds Shared(P1), T2 holds
    /// Shared(P2), each requests Exclusive on the other's page. The
    /// randomized timeout must resolve this in bounded time without an
    /// explicit wait-for-graph.
    #[test]
    fn symmetric_deadlock_resolves_via_timeout() {
        let locks = Arc::new(LockTable::new());
        let t1 = TransactionId::new();
        let t2 = TransactionId::new();
        locks.acquire(t1, pid(1), LockMode::Shared, 1000).unwrap();
        locks.acquire(t2, pid(2), LockMode::Shared, 1000).unwrap();

        let l1 = Arc::clone(&locks);
        let h1 = thread::spawn(move || l1.acquire(t1, pid(2), LockMode::Exclusive, 150));
        let l2 = Arc::clone(&locks);
        let h2 = thread::spawn(move || l2.acquire(t2, pid(1), LockMode::Exclusive, 150));

        let r1 = h1.join().unwrap();
        let r2 = h2.join().unwrap();
        // At least one side must have aborted; both succeeding would mean
        // no deadlock existed, both failing is also an acceptable
        // resolution as long as it happened in bounded time (enforced by
        // the test harness timeout).
        assert!(r1.is_err() || r2.is_err());
    }
}
