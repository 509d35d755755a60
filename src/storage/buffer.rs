pub mod lru;
pub mod replacer;

use crate::access::tuple::{RecordId, Tuple};
use crate::catalog::Catalog;
use crate::concurrency::{LockError, LockManager};
use crate::config::StorageConfig;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::{HeapPage, Page, PageId, TableId};
use crate::transaction::{Permissions, TransactionId, TransactionIdGenerator};
use log::debug;
use parking_lot::{Mutex, RwLock};
use replacer::Replacer;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Shared handle to a cached page. The `RwLock` guards the in-memory image;
/// logical access rights come from the lock manager.
pub type PageRef = Arc<RwLock<HeapPage>>;

struct PoolState {
    pages: HashMap<PageId, PageRef>,
    replacer: Box<dyn Replacer>,
}

/// Bounded page cache with strict two-phase page locking.
///
/// Pages dirtied by a running transaction stay in memory until it completes
/// (no-steal); commit writes them out before releasing locks (force); abort
/// throws the cached copies away so the next access re-reads disk.
pub struct BufferPool {
    catalog: Arc<Catalog>,
    capacity: usize,
    state: Mutex<PoolState>,
    lock_manager: LockManager,
    id_generator: TransactionIdGenerator,
    active: Mutex<HashSet<TransactionId>>,
}

impl BufferPool {
    pub fn new(catalog: Arc<Catalog>, config: &StorageConfig) -> Self {
        Self {
            catalog,
            capacity: config.pool_capacity,
            state: Mutex::new(PoolState {
                pages: HashMap::with_capacity(config.pool_capacity),
                replacer: Box::new(lru::LruReplacer::new()),
            }),
            lock_manager: LockManager::new(config.lock_timeout, config.deadlock_detection),
            id_generator: TransactionIdGenerator::new(),
            active: Mutex::new(HashSet::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn begin_transaction(&self) -> TransactionId {
        let tid = self.id_generator.next_id();
        self.active.lock().insert(tid);
        debug!("{} started", tid);
        tid
    }

    pub fn is_active(&self, tid: TransactionId) -> bool {
        self.active.lock().contains(&tid)
    }

    fn ensure_active(&self, tid: TransactionId) -> StorageResult<()> {
        if self.is_active(tid) {
            Ok(())
        } else {
            Err(StorageError::TransactionNotActive(tid))
        }
    }

    /// Locks `page_id` for `tid` and returns the cached page, reading it from
    /// its table file on a miss. Blocks while another transaction holds a
    /// conflicting lock.
    ///
    /// If the page cannot be loaded, a lock taken by this call is released.
    pub fn get_page(
        &self,
        tid: TransactionId,
        page_id: PageId,
        perm: Permissions,
    ) -> StorageResult<PageRef> {
        self.ensure_active(tid)?;
        let held_before = self.lock_manager.holds_lock(tid, page_id);
        self.lock_page(tid, page_id, perm)?;

        self.fetch(page_id).inspect_err(|_| {
            if !held_before {
                self.lock_manager.release(tid, page_id);
            }
        })
    }

    pub(crate) fn lock_page(
        &self,
        tid: TransactionId,
        page_id: PageId,
        perm: Permissions,
    ) -> StorageResult<()> {
        self.lock_manager
            .acquire(tid, page_id, perm.lock_mode())
            .map_err(|reason| StorageError::TransactionAborted { tid, reason })
    }

    /// Acquires the logical lock only if no waiting is needed, without
    /// touching the cache. Used to lock a page before it exists on disk.
    pub(crate) fn try_lock_page(
        &self,
        tid: TransactionId,
        page_id: PageId,
        perm: Permissions,
    ) -> StorageResult<()> {
        if self.lock_manager.try_acquire(tid, page_id, perm.lock_mode()) {
            Ok(())
        } else {
            Err(StorageError::TransactionAborted {
                tid,
                reason: LockError::Unavailable,
            })
        }
    }

    fn fetch(&self, page_id: PageId) -> StorageResult<PageRef> {
        let mut state = self.state.lock();

        if let Some(page) = state.pages.get(&page_id).cloned() {
            state.replacer.record_access(page_id);
            return Ok(page);
        }

        let file = self.catalog.table_file(page_id.table_id)?;
        let page = file.read_page(page_id)?;

        if state.pages.len() >= self.capacity {
            self.evict_page(&mut state)?;
        }

        debug!("cache miss: loaded page {}", page_id);
        let page = Arc::new(RwLock::new(page));
        state.pages.insert(page_id, Arc::clone(&page));
        state.replacer.record_access(page_id);
        Ok(page)
    }

    /// Drops the least recently used page that is clean and not exclusively
    /// locked.
    fn evict_page(&self, state: &mut PoolState) -> StorageResult<()> {
        let PoolState { pages, replacer } = state;
        let lock_manager = &self.lock_manager;

        let victim = replacer
            .evict(&mut |page_id| {
                let Some(page) = pages.get(&page_id) else {
                    return true;
                };
                let clean = page
                    .try_read()
                    .is_some_and(|page| page.is_dirty().is_none());
                clean && !lock_manager.is_exclusively_locked(page_id)
            })
            .ok_or(StorageError::BufferPoolFull)?;

        pages.remove(&victim);
        debug!("evicted page {}", victim);
        Ok(())
    }

    /// Adds `tuple` to table `table_id` on behalf of `tid` and returns where it
    /// was placed.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        table_id: TableId,
        tuple: &mut Tuple,
    ) -> StorageResult<RecordId> {
        self.ensure_active(tid)?;
        let file = self.catalog.table_file(table_id)?;

        for page in file.insert_tuple(self, tid, tuple)? {
            page.write().mark_dirty(Some(tid));
        }

        tuple.record_id().ok_or(StorageError::TupleNotPlaced)
    }

    /// Removes `tuple` from the page its record id names and clears the id.
    pub fn delete_tuple(&self, tid: TransactionId, tuple: &mut Tuple) -> StorageResult<()> {
        self.ensure_active(tid)?;
        let record_id = tuple.record_id().ok_or(StorageError::TupleNotPlaced)?;
        let file = self.catalog.table_file(record_id.page_id.table_id)?;

        let page = file.delete_tuple(self, tid, tuple)?;
        page.write().mark_dirty(Some(tid));
        tuple.set_record_id(None);
        Ok(())
    }

    /// Writes a resident page to disk if it is dirty.
    pub fn flush_page(&self, page_id: PageId) -> StorageResult<()> {
        let state = self.state.lock();
        let page = state
            .pages
            .get(&page_id)
            .ok_or(StorageError::PageNotResident(page_id))?;
        self.write_back(page)
    }

    /// Writes every dirty page, committed or not.
    ///
    /// Uncommitted changes written here stay on disk: a later abort only
    /// discards cached copies and cannot undo them.
    pub fn flush_all_pages(&self) -> StorageResult<()> {
        let state = self.state.lock();
        for page in state.pages.values() {
            self.write_back(page)?;
        }
        Ok(())
    }

    /// Writes every page dirtied by `tid`.
    pub fn flush_pages(&self, tid: TransactionId) -> StorageResult<()> {
        let state = self.state.lock();
        for page in state.pages.values() {
            if page.read().is_dirty() == Some(tid) {
                self.write_back(page)?;
            }
        }
        Ok(())
    }

    fn write_back(&self, page: &PageRef) -> StorageResult<()> {
        let mut page = page.write();
        if page.is_dirty().is_none() {
            return Ok(());
        }
        let file = self.catalog.table_file(page.id().table_id)?;
        file.write_page(&page)?;
        page.mark_dirty(None);
        Ok(())
    }

    /// Removes a page from the cache without writing it.
    pub fn discard_page(&self, page_id: PageId) {
        let mut state = self.state.lock();
        if state.pages.remove(&page_id).is_some() {
            state.replacer.remove(page_id);
        }
    }

    fn discard_pages(&self, tid: TransactionId) {
        let mut state = self.state.lock();
        let dirtied: Vec<PageId> = state
            .pages
            .iter()
            .filter(|(_, page)| page.read().is_dirty() == Some(tid))
            .map(|(page_id, _)| *page_id)
            .collect();

        for page_id in dirtied {
            state.pages.remove(&page_id);
            state.replacer.remove(page_id);
            debug!("{} aborted: discarded page {}", tid, page_id);
        }
    }

    /// Ends `tid`. Commit forces its dirty pages to disk; abort discards them.
    /// Either way every lock is then released and `tid` may not be used again.
    ///
    /// Abort only drops cached pages. Pages of `tid` already written by
    /// `flush_page` or `flush_all_pages` keep their changes on disk.
    ///
    /// If the commit flush fails, the error is returned with all locks still
    /// held and `tid` still active, so the caller can abort instead.
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) -> StorageResult<()> {
        self.ensure_active(tid)?;

        if commit {
            self.flush_pages(tid)?;
        } else {
            self.discard_pages(tid);
        }

        self.lock_manager.release_all(tid);
        self.active.lock().remove(&tid);
        debug!("{} {}", tid, if commit { "committed" } else { "aborted" });
        Ok(())
    }

    pub fn holds_lock(&self, tid: TransactionId, page_id: PageId) -> bool {
        self.lock_manager.holds_lock(tid, page_id)
    }

    /// Releases a single lock ahead of transaction end. This breaks two-phase
    /// locking unless the page was never read or written under the lock.
    pub fn release_page(&self, tid: TransactionId, page_id: PageId) {
        self.lock_manager.release(tid, page_id);
    }

    pub fn is_cached(&self, page_id: PageId) -> bool {
        self.state.lock().pages.contains_key(&page_id)
    }

    pub fn num_cached(&self) -> usize {
        self.state.lock().pages.len()
    }
}
