use super::replacer::Replacer;
use crate::storage::page::PageId;
use std::collections::{BTreeMap, HashMap};

/// Least-recently-used replacement.
#[derive(Debug, Default)]
pub struct LruReplacer {
    /// Logical clock, bumped on every access
    tick: u64,
    /// Last access tick of each tracked page
    last_access: HashMap<PageId, u64>,
    /// Tracked pages ordered from least to most recently used
    order: BTreeMap<u64, PageId>,
}

impl LruReplacer {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn size(&self) -> usize {
        self.order.len()
    }
}

impl Replacer for LruReplacer {
    fn record_access(&mut self, page_id: PageId) {
        self.tick += 1;
        if let Some(previous) = self.last_access.insert(page_id, self.tick) {
            self.order.remove(&previous);
        }
        self.order.insert(self.tick, page_id);
    }

    fn remove(&mut self, page_id: PageId) {
        if let Some(tick) = self.last_access.remove(&page_id) {
            self.order.remove(&tick);
        }
    }

    fn evict(&mut self, evictable: &mut dyn FnMut(PageId) -> bool) -> Option<PageId> {
        let (&tick, &page_id) = self
            .order
            .iter()
            .find(|(_, page_id)| evictable(**page_id))?;
        self.order.remove(&tick);
        self.last_access.remove(&page_id);
        Some(page_id)
    }
}
