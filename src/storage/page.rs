pub mod heap_page;

use crate::storage::PAGE_SIZE;
use crate::transaction::TransactionId;
use std::fmt;

/// Identifier of a table, as assigned by the catalog.
pub type TableId = u32;

/// Locates one fixed-size block within a table file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageId {
    pub table_id: TableId,
    pub page_number: u32,
}

impl PageId {
    pub fn new(table_id: TableId, page_number: u32) -> Self {
        Self {
            table_id,
            page_number,
        }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.table_id, self.page_number)
    }
}

/// In-memory image of one on-disk block.
pub trait Page: Send + Sync {
    fn id(&self) -> PageId;

    /// Serializes the page into exactly `PAGE_SIZE` bytes.
    fn page_data(&self) -> Box<[u8; PAGE_SIZE]>;

    /// The transaction that last dirtied this page, if it is dirty.
    fn is_dirty(&self) -> Option<TransactionId>;

    /// Marks the page dirty on behalf of `tid`, or clean with `None`.
    fn mark_dirty(&mut self, tid: Option<TransactionId>);
}

pub use heap_page::HeapPage;
