use crate::access::scan::HeapFileIterator;
use crate::access::schema::Schema;
use crate::access::tuple::Tuple;
use crate::access::{TableFile, TupleCursor};
use crate::concurrency::PageLatches;
use crate::storage::buffer::{BufferPool, PageRef};
use crate::storage::disk::PageManager;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::{HeapPage, Page, PageId, TableId};
use crate::transaction::{Permissions, TransactionId};
use log::debug;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Unordered table stored as a file of fixed-size heap pages.
///
/// Page `k` lives at byte offset `k * PAGE_SIZE` and pages are numbered
/// without gaps. `num_pages` only moves forward after the new page has been
/// written, so it never counts a page missing from disk.
pub struct HeapFile {
    table_id: TableId,
    path: PathBuf,
    schema: Arc<Schema>,
    disk: Mutex<PageManager>,
    num_pages: AtomicU32,
    latches: PageLatches,
}

impl HeapFile {
    /// Opens the table file at `path`, creating an empty one if needed.
    pub fn open(
        table_id: TableId,
        path: impl AsRef<Path>,
        schema: Arc<Schema>,
    ) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        let disk = PageManager::open(&path)?;
        let num_pages = disk.num_pages()?;

        Ok(Self {
            table_id,
            path,
            schema,
            disk: Mutex::new(disk),
            num_pages: AtomicU32::new(num_pages),
            latches: PageLatches::new(num_pages),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn page_id(&self, page_number: u32) -> PageId {
        PageId::new(self.table_id, page_number)
    }

    /// Appends a zeroed page and inserts `tuple` into it.
    ///
    /// The exclusive lock on the new page is taken before the page count is
    /// published. It is only ever tried, never waited for, so the growth latch
    /// is not held across a lock wait. A refused lock aborts the insert.
    fn append_page(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> StorageResult<PageRef> {
        let growth = self.latches.lock_growth();
        let page_number = self.num_pages.load(Ordering::SeqCst);
        let page_id = self.page_id(page_number);

        let held_before = pool.holds_lock(tid, page_id);
        pool.try_lock_page(tid, page_id, Permissions::ReadWrite)?;
        if let Err(e) = self
            .disk
            .lock()
            .write_page(page_number, &HeapPage::empty_page_data())
        {
            if !held_before {
                pool.release_page(tid, page_id);
            }
            return Err(e);
        }
        self.num_pages.store(page_number + 1, Ordering::SeqCst);
        drop(growth);

        debug!("table {} grew to {} pages", self.table_id, page_number + 1);

        let page = pool.get_page(tid, page_id, Permissions::ReadWrite)?;
        {
            let latch = self.latches.page(page_number);
            let _latch = latch.lock();
            page.write().insert_tuple(tuple)?;
        }
        Ok(page)
    }
}

impl TableFile for HeapFile {
    fn id(&self) -> TableId {
        self.table_id
    }

    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    fn num_pages(&self) -> u32 {
        self.num_pages.load(Ordering::SeqCst)
    }

    fn read_page(&self, page_id: PageId) -> StorageResult<HeapPage> {
        if page_id.table_id != self.table_id {
            return Err(StorageError::InvalidValue(format!(
                "page {} does not belong to table {}",
                page_id, self.table_id
            )));
        }
        let mut data = HeapPage::empty_page_data();
        self.disk.lock().read_page(page_id.page_number, &mut data)?;
        HeapPage::from_bytes(page_id, &data, Arc::clone(&self.schema))
    }

    fn write_page(&self, page: &HeapPage) -> StorageResult<()> {
        let data = page.page_data();
        self.disk.lock().write_page(page.id().page_number, &data)
    }

    fn insert_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> StorageResult<Vec<PageRef>> {
        if **tuple.schema() != *self.schema {
            return Err(StorageError::SchemaMismatch);
        }

        for page_number in 0..self.num_pages() {
            let page_id = self.page_id(page_number);
            let held_before = pool.holds_lock(tid, page_id);
            let page = pool.get_page(tid, page_id, Permissions::ReadWrite)?;

            let inserted = {
                let latch = self.latches.page(page_number);
                let _latch = latch.lock();
                let mut heap_page = page.write();
                if heap_page.num_empty_slots() > 0 {
                    heap_page.insert_tuple(tuple)?;
                    true
                } else {
                    false
                }
            };

            if inserted {
                return Ok(vec![page]);
            }
            // Nothing was read or written under the lock.
            if !held_before {
                pool.release_page(tid, page_id);
            }
        }

        Ok(vec![self.append_page(pool, tid, tuple)?])
    }

    fn delete_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> StorageResult<PageRef> {
        let record_id = tuple.record_id().ok_or(StorageError::TupleNotPlaced)?;
        let page_number = record_id.page_id.page_number;
        if record_id.page_id.table_id != self.table_id || page_number >= self.num_pages() {
            return Err(StorageError::InvalidValue(format!(
                "record {} is not in table {}",
                record_id, self.table_id
            )));
        }

        let page = pool.get_page(tid, record_id.page_id, Permissions::ReadWrite)?;
        {
            let latch = self.latches.page(page_number);
            let _latch = latch.lock();
            page.write().delete_tuple(tuple)?;
        }
        Ok(page)
    }

    fn iterator<'a>(
        &'a self,
        pool: &'a BufferPool,
        tid: TransactionId,
    ) -> Box<dyn TupleCursor + 'a> {
        Box::new(HeapFileIterator::new(self, pool, tid))
    }
}
