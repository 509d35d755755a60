//! Transaction identity.
//!
//! Transactions are plain ids handed out by the buffer pool. All transactional
//! state (held locks, dirtied pages) lives in the buffer pool and its lock
//! manager; this module only provides the id type, its generator and the
//! access permissions a transaction can request on a page.

pub mod id;
pub mod permissions;

pub use id::{TransactionId, TransactionIdGenerator};
pub use permissions::Permissions;
