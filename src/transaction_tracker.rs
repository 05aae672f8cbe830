use crate::lock_table::LockTable;
use crate::page_id::PageId;
use crate::transaction_id::TransactionId;

/// Thin projection over `LockTable`'s transaction index (§4.3): it owns
/// no state of its own, it just names the two queries commit/abort and
/// `holdsLock` need.
pub struct TransactionTracker<'a> {
    locks: &'a LockTable,
}

impl<'a> TransactionTracker<'a> {
    pub fn new(locks: &'a LockTable) -> Self {
        Self { locks }
    }

    pub fn pages_held_by(&self, tid: TransactionId) -> Vec<PageId> {
        self.locks.pages_held_by(tid)
    }

    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        self.locks.holds(tid, pid)
    }
}
