//! Concurrency control.
//!
//! Two lock tiers with different lifetimes coexist:
//!
//! - **Logical locks** ([`lock::LockManager`]): shared/exclusive page locks
//!   owned by the buffer pool, acquired by `get_page` and held until the
//!   transaction commits or aborts. They provide isolation between
//!   transactions.
//! - **Physical latches** ([`latch::PageLatches`]): short-held per-page and
//!   file-growth latches owned by each heap file. They serialize the bytes of a
//!   single insert or delete and are released before the call returns.
//!
//! A latch is never held while waiting on a logical lock; code that needs both
//! acquires the logical lock first.

pub mod latch;
pub mod lock;

pub use latch::PageLatches;
pub use lock::{LockError, LockManager, LockMode};
