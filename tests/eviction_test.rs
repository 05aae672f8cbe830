mod common;

use common::Harness;
use small_bufferpool::{PageId, Permission, TransactionId};

/// Spec scenario 5: touching page 0 moves it to the MRU end, so when the
/// cache (capacity 2) needs to evict to admit a third page, it picks the
/// least-recently-touched clean page rather than the one just touched.
#[test]
fn eviction_prefers_lru_clean_page() {
    let h = Harness::with_tables(2, 8, 3);
    let tid = TransactionId::new();

    let p0 = PageId::new(h.table_ids[0], 0);
    let p1 = PageId::new(h.table_ids[1], 0);
    let p2 = PageId::new(h.table_ids[2], 0);

    h.bp.get_page(tid, p0, Permission::ReadOnly).unwrap();
    h.bp.get_page(tid, p1, Permission::ReadOnly).unwrap();
    h.bp.transaction_complete(tid, true).unwrap();

    let t2 = TransactionId::new();
    // touch p0 again: it becomes MRU, leaving p1 as the sole LRU page.
    h.bp.get_page(t2, p0, Permission::ReadOnly).unwrap();
    // admitting p2 must evict p1, not p0.
    h.bp.get_page(t2, p2, Permission::ReadOnly).unwrap();
    h.bp.transaction_complete(t2, true).unwrap();

    let t3 = TransactionId::new();
    assert!(h.bp.get_page(t3, p0, Permission::ReadOnly).is_ok());
    h.bp.transaction_complete(t3, true).unwrap();
}

/// Spec scenario: a cache at capacity with every resident page dirty has
/// no eviction candidate (STEAL never writes a dirty page out early) and
/// `get_page` must report `CacheExhausted` rather than block forever.
#[test]
fn cache_exhausted_when_every_resident_page_is_dirty() {
    let h = Harness::with_tables(1, 8, 2);
    let tid = TransactionId::new();

    h.bp.insert_tuple(tid, h.table_ids[0], b"aaaaaaaa").unwrap();

    let err = h.bp.insert_tuple(tid, h.table_ids[1], b"bbbbbbbb");
    assert!(err.is_err());
}
