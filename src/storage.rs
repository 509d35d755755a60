//! Storage layer implementation for slotdb.
//!
//! This module provides the foundation for persistent table storage using a
//! page-based architecture. Key components:
//!
//! - **Page**: Fixed-size (4KB) blocks of data, the basic unit of I/O and caching
//! - **PageManager**: Raw block reads and writes against one table file
//! - **BufferPool**: Bounded in-memory cache of pages with LRU eviction,
//!   transactional page locks and no-steal/force commit semantics
//! - **HeapPage**: Slotted page format with an occupancy bitmap header
//!
//! There is no write-ahead log. Durability comes from forcing a transaction's
//! dirty pages to their heap file at commit, and rollback comes from discarding
//! the cached copies so the next access re-reads the committed image.

pub mod buffer;
pub mod disk;
pub mod error;
pub mod page;

pub use buffer::{BufferPool, PageRef};
pub use disk::{PageManager, PAGE_SIZE};
pub use error::{StorageError, StorageResult};
pub use page::{HeapPage, Page, PageId};
