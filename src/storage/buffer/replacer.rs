use crate::storage::page::PageId;
use std::fmt::Debug;

/// Chooses which cached page to give up when the pool is full.
pub trait Replacer: Send + Sync + Debug {
    /// Records a use of `page_id`, making it the most recently used page.
    fn record_access(&mut self, page_id: PageId);

    /// Stops tracking `page_id`.
    fn remove(&mut self, page_id: PageId);

    /// Picks the best victim for which `evictable` returns true and stops
    /// tracking it. Returns None if no tracked page qualifies.
    fn evict(&mut self, evictable: &mut dyn FnMut(PageId) -> bool) -> Option<PageId>;
}
