//! Access layer for tuple-oriented operations.
//!
//! - **TableFile**: one table's pages on disk, with slot-level insert/delete
//! - **HeapFile**: the heap-organized `TableFile` backed by a single file
//! - **TupleCursor**: a restartable scan over a table's live tuples
//! - **Tuple**, **Schema**, **Value**: the row model stored in heap pages
//!
//! Query code reaches tables through the buffer pool, which calls back into
//! the `TableFile` to find or make room for tuples.

pub mod heap;
pub mod scan;
pub mod schema;
pub mod tuple;
pub mod value;

pub use heap::HeapFile;
pub use scan::HeapFileIterator;
pub use schema::{Field, Schema};
pub use tuple::{RecordId, Tuple};
pub use value::{DataType, Value, STRING_LEN};

use crate::storage::buffer::{BufferPool, PageRef};
use crate::storage::error::StorageResult;
use crate::storage::page::{HeapPage, PageId, TableId};
use crate::transaction::TransactionId;
use std::sync::Arc;

/// A table's storage.
pub trait TableFile: Send + Sync {
    fn id(&self) -> TableId;

    fn schema(&self) -> &Arc<Schema>;

    fn num_pages(&self) -> u32;

    /// Reads one page straight from disk, bypassing the cache.
    fn read_page(&self, page_id: PageId) -> StorageResult<HeapPage>;

    /// Writes one page straight to disk.
    fn write_page(&self, page: &HeapPage) -> StorageResult<()>;

    /// Places `tuple` on a page with room, growing the file if every page is
    /// full, and returns the pages it modified.
    fn insert_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> StorageResult<Vec<PageRef>>;

    /// Frees the slot `tuple` occupies and returns the modified page.
    fn delete_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> StorageResult<PageRef>;

    /// A cursor over the table's tuples that reads pages through `pool`.
    fn iterator<'a>(
        &'a self,
        pool: &'a BufferPool,
        tid: TransactionId,
    ) -> Box<dyn TupleCursor + 'a>;
}

/// Cursor over tuples with an explicit lifecycle: created unopened, usable
/// after `open`, and dead after `close`.
pub trait TupleCursor {
    fn open(&mut self) -> StorageResult<()>;

    fn has_next(&mut self) -> StorageResult<bool>;

    fn next(&mut self) -> StorageResult<Tuple>;

    /// Restarts from the first tuple.
    fn rewind(&mut self) -> StorageResult<()>;

    fn close(&mut self);
}
