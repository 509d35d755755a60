use std::time::Duration;

/// Tunables for a storage context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Maximum number of pages the buffer pool caches at once.
    pub pool_capacity: usize,
    /// How long a lock request waits before the requester is aborted.
    pub lock_timeout: Duration,
    /// Abort a requester whose wait would close a cycle in the waits-for graph.
    pub deadlock_detection: bool,
}

impl StorageConfig {
    pub const DEFAULT_POOL_CAPACITY: usize = 50;
    pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(2);

    pub fn with_pool_capacity(mut self, pool_capacity: usize) -> Self {
        self.pool_capacity = pool_capacity;
        self
    }

    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    pub fn with_deadlock_detection(mut self, enabled: bool) -> Self {
        self.deadlock_detection = enabled;
        self
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            pool_capacity: Self::DEFAULT_POOL_CAPACITY,
            lock_timeout: Self::DEFAULT_LOCK_TIMEOUT,
            deadlock_detection: true,
        }
    }
}
