//! Storage layer error types.

use crate::access::RecordId;
use crate::concurrency::lock::LockError;
use crate::storage::page::PageId;
use crate::transaction::TransactionId;
use thiserror::Error;

/// Errors that can occur in the storage layer.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Transaction {tid} aborted: {reason}")]
    TransactionAborted { tid: TransactionId, reason: LockError },

    #[error("Transaction {0} is not active")]
    TransactionNotActive(TransactionId),

    #[error("Buffer pool is full: every cached page is dirty or exclusively locked")]
    BufferPoolFull,

    #[error("Page not resident in buffer pool: {0}")]
    PageNotResident(PageId),

    #[error("Page is full: {0} has no empty slot")]
    PageFull(PageId),

    #[error("Slot is empty: {0}")]
    SlotEmpty(RecordId),

    #[error("Invalid slot {slot} (page has {num_slots} slots)")]
    InvalidSlot { slot: u16, num_slots: u16 },

    #[error("Tuple has no record id")]
    TupleNotPlaced,

    #[error("Tuple {record_id} does not belong to page {page_id}")]
    TupleNotOnPage { record_id: RecordId, page_id: PageId },

    #[error("Tuple schema does not match table schema")]
    SchemaMismatch,

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Table already exists: {0}")]
    TableExists(String),

    #[error("Cursor has not been opened")]
    CursorNotOpen,

    #[error("Cursor has been closed")]
    CursorClosed,

    #[error("Cursor has no more tuples")]
    NoMoreTuples,

    #[error("Corrupted page data: {0}")]
    Corrupted(String),

    #[error("Catalog encoding error: {0}")]
    Catalog(#[from] bincode::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Returns true if the caller must roll the transaction back.
    pub fn is_abort(&self) -> bool {
        matches!(self, StorageError::TransactionAborted { .. })
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
