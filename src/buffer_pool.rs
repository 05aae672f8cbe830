use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, trace, warn};

use crate::catalog::Catalog;
use crate::db_file::RecordId;
use crate::error::BufferPoolError;
use crate::lock_table::LockTable;
use crate::log_file::LogFile;
use crate::page::Page;
use crate::page_cache::PageCache;
use crate::page_id::PageId;
use crate::permissions::Permission;
use crate::transaction_id::TransactionId;
use crate::transaction_tracker::TransactionTracker;
use crate::types::BufferResult;

/// Default page size, overridable process-wide via `set_page_size` the
/// same way the teacher's `BufferPool` exposes a settable static (its
/// tests shrink the page size to make eviction easy to trigger).
const DEFAULT_PAGE_SIZE: usize = 4096;
static PAGE_SIZE: AtomicUsize = AtomicUsize::new(DEFAULT_PAGE_SIZE);

/// Default bound (in milliseconds) sampled from when a lock request has
/// no caller-supplied timeout.
const DEFAULT_MAX_TIMEOUT_MILLIS: u64 = 1500;

pub fn set_page_size(size: usize) {
    PAGE_SIZE.store(size, Ordering::SeqCst);
}

pub fn get_page_size() -> usize {
    PAGE_SIZE.load(Ordering::SeqCst)
}

/// The transactional, page-granularity cache sitting between access
/// methods and on-disk `DbFile`s (SPEC_FULL.md §1/§4). Composes a
/// `PageCache` (bounded storage + eviction), a `LockTable` (2PL), a
/// `Catalog` (table lookup) and a `LogFile` (WAL) behind one monitor --
/// a single mutex plus the lock table's own condvar, rather than the
/// teacher's `concurrent_status.rs` busy-poll-with-sleep loop.
pub struct BufferPool {
    default_max_timeout_millis: u64,
    cache: Mutex<PageCache>,
    locks: LockTable,
    catalog: Arc<Catalog>,
    log: Arc<dyn LogFile>,
}

impl BufferPool {
    pub fn new(capacity_pages: usize, catalog: Arc<Catalog>, log: Arc<dyn LogFile>) -> Self {
        Self {
            default_max_timeout_millis: DEFAULT_MAX_TIMEOUT_MILLIS,
            cache: Mutex::new(PageCache::new(capacity_pages)),
            locks: LockTable::new(),
            catalog,
            log,
        }
    }

    pub fn set_page_size(size: usize) {
        set_page_size(size)
    }

    pub fn get_page_size() -> usize {
        get_page_size()
    }

    pub fn tracker(&self) -> TransactionTracker<'_> {
        TransactionTracker::new(&self.locks)
    }

    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        self.locks.holds(tid, pid)
    }

    /// §4.2: acquire the lock `perm` implies, then return a page, reading
    /// it through the catalog's `DbFile` on a cache miss and admitting it
    /// at the MRU end, evicting first if the cache is full.
    pub fn get_page(&self, tid: TransactionId, pid: PageId, perm: Permission) -> BufferResult<Page> {
        self.get_page_with_timeout(tid, pid, perm, self.default_max_timeout_millis)
    }

    pub fn get_page_with_timeout(
        &self,
        tid: TransactionId,
        pid: PageId,
        perm: Permission,
        max_timeout_millis: u64,
    ) -> BufferResult<Page> {
        self.locks
            .acquire(tid, pid, perm.lock_mode(), max_timeout_millis)?;

        let mut cache = self.cache.lock().unwrap();
        if let Some(page) = cache.touch(pid) {
            trace!("cache hit for {}", pid);
            return Ok(page);
        }

        if cache.size() >= cache.capacity() {
            self.evict(&mut cache)?;
        }

        let file = self.catalog.get_db_file(pid.table_id())?;
        let page = file.read_page(pid)?;
        cache.put(pid, page.clone());
        Ok(page)
    }

    /// Evict the oldest clean page (§3: STEAL, no-FORCE -- only clean
    /// pages are ever chosen, so a dirty page is never written out here).
    /// Fails with `CacheExhausted` if every resident page is dirty.
    fn evict(&self, cache: &mut PageCache) -> BufferResult<()> {
        match cache.choose_eviction_victim() {
            Some(pid) => {
                cache.remove(pid);
                debug!("evicted {}", pid);
                Ok(())
            }
            None => Err(BufferPoolError::CacheExhausted),
        }
    }

    /// §4.4.2: run an access method's mutation through its `DbFile`, then
    /// admit every page it hands back, dirtied and at the MRU end.
    pub fn insert_tuple(&self, tid: TransactionId, table_id: i32, tuple: &[u8]) -> BufferResult<()> {
        let file = self.catalog.get_db_file(table_id)?;
        let dirtied = file.insert_tuple(self, tid, tuple)?;
        self.admit_dirtied(tid, dirtied)
    }

    pub fn delete_tuple(&self, tid: TransactionId, rid: RecordId) -> BufferResult<()> {
        let file = self.catalog.get_db_file(rid.pid.table_id())?;
        let dirtied = file.delete_tuple(self, tid, rid)?;
        self.admit_dirtied(tid, dirtied)
    }

    fn admit_dirtied(&self, tid: TransactionId, pages: Vec<Page>) -> BufferResult<()> {
        let mut cache = self.cache.lock().unwrap();
        for mut page in pages {
            page.mark_dirty(tid);
            let pid = page.pid();
            if !cache.contains(pid) && cache.size() >= cache.capacity() {
                self.evict(&mut cache)?;
            }
            cache.put(pid, page);
        }
        Ok(())
    }

    /// §4.4.3 / §6: commit flushes and releases this transaction's pages;
    /// abort discards the dirty ones (their on-disk copies were never
    /// touched, since no-FORCE means a dirty page is only ever written at
    /// commit) and releases every lock regardless.
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) -> BufferResult<()> {
        let pages = self.tracker().pages_held_by(tid);
        let mut first_err = None;
        if commit {
            for pid in &pages {
                if let Err(e) = self.flush_page_locked(tid, *pid) {
                    first_err.get_or_insert(e);
                }
            }
        } else {
            let mut cache = self.cache.lock().unwrap();
            for pid in &pages {
                if let Some(page) = cache.peek(*pid) {
                    if page.is_dirty() == Some(tid) {
                        cache.remove(*pid);
                    }
                }
            }
        }
        self.locks.release_all(tid);
        debug!(
            "transaction {} {} ({} pages)",
            tid,
            if commit { "committed" } else { "aborted" },
            pages.len()
        );
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Write-ahead: log the before-image and force the log, only then
    /// write the data page, matching the ordering in SPEC_FULL.md §4.4.3.
    /// A no-op for a page that isn't resident or isn't dirty.
    fn flush_page_locked(&self, tid: TransactionId, pid: PageId) -> BufferResult<()> {
        let mut cache = self.cache.lock().unwrap();
        let dirty = match cache.peek(pid) {
            Some(page) => page.is_dirty(),
            None => None,
        };
        if dirty.is_none() {
            return Ok(());
        }

        if let Some(page) = cache.peek(pid) {
            self.log.log_write(tid, page.before_image(), page)?;
        }
        self.log.force()?;

        let file = self.catalog.get_db_file(pid.table_id())?;
        if let Some(page) = cache.get_mut(pid) {
            file.write_page(page)?;
            page.mark_clean();
            page.set_before_image();
        }
        Ok(())
    }

    pub fn flush_page(&self, pid: PageId) -> BufferResult<()> {
        let tid = {
            let cache = self.cache.lock().unwrap();
            cache.peek(pid).and_then(|p| p.is_dirty())
        };
        match tid {
            Some(tid) => self.flush_page_locked(tid, pid),
            None => Ok(()),
        }
    }

    /// Flush every page dirtied by `tid`. The teacher's equivalent
    /// (`btree/page_cache.rs::flush_pages`) flushes the whole cache
    /// regardless of whose pages they are; that's a bug against the
    /// no-FORCE contract (it would force other transactions' uncommitted
    /// writes), so this only ever touches `tid`'s own pages.
    pub fn flush_pages(&self, tid: TransactionId) -> BufferResult<()> {
        warn!(
            "flush_pages({}) invoked: forces a live transaction's pages to disk outside commit, unsafe outside tests",
            tid
        );
        for pid in self.tracker().pages_held_by(tid) {
            self.flush_page_locked(tid, pid)?;
        }
        Ok(())
    }

    /// Test/maintenance hook: flush the whole cache regardless of owner.
    /// Not part of the transactional contract -- calling this mid-flight
    /// can write a page while its owning transaction is still live.
    pub fn flush_all_pages(&self) -> BufferResult<()> {
        warn!("flush_all_pages invoked: forces every resident page regardless of owner, unsafe outside tests");
        let pids = {
            let cache = self.cache.lock().unwrap();
            cache.keys()
        };
        for pid in pids {
            self.flush_page(pid)?;
        }
        Ok(())
    }

    /// Drop `pid` from the cache without writing it back, regardless of
    /// dirty state. Test/maintenance hook, not part of the transactional
    /// contract.
    pub fn discard_page(&self, pid: PageId) {
        let mut cache = self.cache.lock().unwrap();
        cache.remove(pid);
    }

    pub fn unsafe_release_page(&self, tid: TransactionId, pid: PageId) {
        self.locks.release(tid, pid);
    }

    pub fn clear(&self) {
        let mut cache = self.cache.lock().unwrap();
        for pid in cache.keys() {
            cache.remove(pid);
        }
    }
}
