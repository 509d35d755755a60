//! Transactional page locks.
//!
//! This is the logical tier of locking: locks are keyed by `PageId`, granted
//! per transaction and held until the transaction completes (strict two-phase
//! locking). Waiters on a page are served in arrival order. A request that
//! would close a cycle in the wait-for graph, or that waits longer than the
//! configured timeout, fails and its transaction is expected to abort.

use crate::storage::page::PageId;
use crate::transaction::TransactionId;
use log::warn;
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Lock modes supported by the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    /// Shared lock for read operations.
    Shared,
    /// Exclusive lock for write operations.
    Exclusive,
}

impl LockMode {
    /// Checks if this lock mode is compatible with another.
    pub fn is_compatible_with(&self, other: &LockMode) -> bool {
        matches!((self, other), (LockMode::Shared, LockMode::Shared))
    }

    /// Checks if holding this mode satisfies a request for `requested`.
    pub fn covers(&self, requested: LockMode) -> bool {
        *self == LockMode::Exclusive || requested == LockMode::Shared
    }
}

/// Why a lock request was refused.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockError {
    #[error("chosen as deadlock victim")]
    Deadlock,

    #[error("lock wait exceeded {0:?}")]
    Timeout(Duration),

    #[error("lock not immediately available")]
    Unavailable,
}

#[derive(Debug, Clone)]
struct LockRequest {
    tid: TransactionId,
    mode: LockMode,
    granted: bool,
}

/// Granted and waiting requests for one page, in arrival order.
#[derive(Debug)]
struct LockQueue {
    requests: VecDeque<LockRequest>,
    /// A shared holder waiting to become the exclusive holder.
    upgrading: Option<TransactionId>,
    cv: Arc<Condvar>,
}

impl LockQueue {
    fn new() -> Self {
        Self {
            requests: VecDeque::new(),
            upgrading: None,
            cv: Arc::new(Condvar::new()),
        }
    }

    fn held_mode(&self, tid: TransactionId) -> Option<LockMode> {
        self.requests
            .iter()
            .find(|r| r.tid == tid && r.granted)
            .map(|r| r.mode)
    }

    /// Transactions `tid` is waiting on to obtain `mode`.
    fn blockers(&self, tid: TransactionId, mode: LockMode) -> HashSet<TransactionId> {
        if self.upgrading == Some(tid) {
            return self
                .requests
                .iter()
                .filter(|r| r.granted && r.tid != tid)
                .map(|r| r.tid)
                .collect();
        }

        let mut blockers = HashSet::new();
        if let Some(upgrader) = self.upgrading {
            blockers.insert(upgrader);
        }
        // Only requests ahead of ours can block it.
        for request in self.requests.iter().take_while(|r| r.tid != tid) {
            if !request.granted || !request.mode.is_compatible_with(&mode) {
                blockers.insert(request.tid);
            }
        }
        blockers
    }

    /// Grants whatever the queue head allows. Returns the newly granted ids.
    fn grant_waiters(&mut self) -> Vec<TransactionId> {
        let mut granted = Vec::new();

        if let Some(upgrader) = self.upgrading {
            let alone = self
                .requests
                .iter()
                .all(|r| !r.granted || r.tid == upgrader);
            if !alone {
                return granted;
            }
            if let Some(request) = self
                .requests
                .iter_mut()
                .find(|r| r.tid == upgrader && r.granted)
            {
                request.mode = LockMode::Exclusive;
            }
            self.upgrading = None;
            granted.push(upgrader);
        }

        for i in 0..self.requests.len() {
            if self.requests[i].granted {
                continue;
            }
            let LockRequest { tid, mode, .. } = self.requests[i];
            let compatible = self
                .requests
                .iter()
                .filter(|r| r.granted && r.tid != tid)
                .all(|r| r.mode.is_compatible_with(&mode));
            if !compatible {
                // Stop at the first incompatible request to maintain FIFO order
                break;
            }
            self.requests[i].granted = true;
            granted.push(tid);
        }

        granted
    }
}

#[derive(Debug, Default)]
struct LockTable {
    queues: HashMap<PageId, LockQueue>,
    held: HashMap<TransactionId, HashSet<PageId>>,
    /// Wait-for graph: tid -> tids it is waiting on.
    waits_for: HashMap<TransactionId, HashSet<TransactionId>>,
}

impl LockTable {
    fn holds(&self, tid: TransactionId, page_id: PageId, mode: LockMode) -> bool {
        self.queues
            .get(&page_id)
            .and_then(|q| q.held_mode(tid))
            .is_some_and(|held| held.covers(mode))
    }

    fn grant(&mut self, page_id: PageId) {
        let Some(queue) = self.queues.get_mut(&page_id) else {
            return;
        };
        let granted = queue.grant_waiters();
        if granted.is_empty() {
            return;
        }
        queue.cv.notify_all();
        for tid in granted {
            self.held.entry(tid).or_default().insert(page_id);
        }
    }

    /// Withdraws the pending request of `tid` on `page_id`.
    fn cancel(&mut self, tid: TransactionId, page_id: PageId) {
        self.waits_for.remove(&tid);
        if let Some(queue) = self.queues.get_mut(&page_id) {
            if queue.upgrading == Some(tid) {
                queue.upgrading = None;
            } else {
                queue.requests.retain(|r| r.tid != tid || r.granted);
            }
            if queue.requests.is_empty() {
                self.queues.remove(&page_id);
                return;
            }
        }
        self.grant(page_id);
    }

    fn release(&mut self, tid: TransactionId, page_id: PageId) -> bool {
        if let Some(pages) = self.held.get_mut(&tid) {
            pages.remove(&page_id);
            if pages.is_empty() {
                self.held.remove(&tid);
            }
        }

        let Some(queue) = self.queues.get_mut(&page_id) else {
            return false;
        };
        let before = queue.requests.len();
        queue.requests.retain(|r| r.tid != tid);
        if queue.upgrading == Some(tid) {
            queue.upgrading = None;
        }
        let removed = queue.requests.len() != before;

        if queue.requests.is_empty() {
            self.queues.remove(&page_id);
        } else {
            self.grant(page_id);
        }
        removed
    }

    /// Checks if `tid` can reach itself through the wait-for graph.
    fn in_cycle(&self, tid: TransactionId) -> bool {
        let mut visited = HashSet::new();
        let mut queue: VecDeque<TransactionId> = self
            .waits_for
            .get(&tid)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();

        while let Some(current) = queue.pop_front() {
            if current == tid {
                return true;
            }
            if visited.insert(current) {
                if let Some(next) = self.waits_for.get(&current) {
                    queue.extend(next.iter().copied());
                }
            }
        }

        false
    }
}

/// Lock manager for the logical (transaction-lifetime) lock tier.
#[derive(Debug)]
pub struct LockManager {
    table: Mutex<LockTable>,
    timeout: Duration,
    deadlock_detection: bool,
}

impl LockManager {
    pub fn new(timeout: Duration, deadlock_detection: bool) -> Self {
        Self {
            table: Mutex::new(LockTable::default()),
            timeout,
            deadlock_detection,
        }
    }

    /// Blocks until `tid` holds `page_id` in at least `mode`.
    ///
    /// A shared holder asking for exclusive access is upgraded in place once
    /// it is the only holder.
    pub fn acquire(
        &self,
        tid: TransactionId,
        page_id: PageId,
        mode: LockMode,
    ) -> Result<(), LockError> {
        let deadline = Instant::now() + self.timeout;
        let mut table = self.table.lock();

        let cv = {
            let queue = table.queues.entry(page_id).or_insert_with(LockQueue::new);
            match queue.held_mode(tid) {
                Some(held) if held.covers(mode) => return Ok(()),
                Some(_) => {
                    if let Some(other) = queue.upgrading {
                        if other != tid {
                            // Both hold shared and both want exclusive.
                            warn!("{} chosen as deadlock victim upgrading {}", tid, page_id);
                            return Err(LockError::Deadlock);
                        }
                    }
                    queue.upgrading = Some(tid);
                }
                None => queue.requests.push_back(LockRequest {
                    tid,
                    mode,
                    granted: false,
                }),
            }
            Arc::clone(&queue.cv)
        };
        table.grant(page_id);

        loop {
            if table.holds(tid, page_id, mode) {
                table.waits_for.remove(&tid);
                return Ok(());
            }

            let blockers = table
                .queues
                .get(&page_id)
                .map(|q| q.blockers(tid, mode))
                .unwrap_or_default();
            table.waits_for.insert(tid, blockers);

            if self.deadlock_detection && table.in_cycle(tid) {
                warn!("{} chosen as deadlock victim waiting for {}", tid, page_id);
                table.cancel(tid, page_id);
                return Err(LockError::Deadlock);
            }

            if cv.wait_until(&mut table, deadline).timed_out() {
                if table.holds(tid, page_id, mode) {
                    table.waits_for.remove(&tid);
                    return Ok(());
                }
                warn!("{} timed out waiting for {}", tid, page_id);
                table.cancel(tid, page_id);
                return Err(LockError::Timeout(self.timeout));
            }
        }
    }

    /// Grants `page_id` to `tid` only if that needs no waiting. Returns false
    /// and leaves the queue untouched otherwise.
    pub fn try_acquire(&self, tid: TransactionId, page_id: PageId, mode: LockMode) -> bool {
        let mut table = self.table.lock();
        let queue = table.queues.entry(page_id).or_insert_with(LockQueue::new);

        let granted = match queue.held_mode(tid) {
            Some(held) if held.covers(mode) => return true,
            Some(_) => {
                let alone = queue.upgrading.is_none()
                    && queue.requests.iter().all(|r| r.tid == tid || !r.granted);
                if alone {
                    if let Some(request) = queue.requests.iter_mut().find(|r| r.tid == tid) {
                        request.mode = mode;
                    }
                }
                alone
            }
            None => {
                let free = queue.upgrading.is_none()
                    && queue
                        .requests
                        .iter()
                        .all(|r| r.granted && r.mode.is_compatible_with(&mode));
                if free {
                    queue.requests.push_back(LockRequest {
                        tid,
                        mode,
                        granted: true,
                    });
                }
                free
            }
        };

        if granted {
            table.held.entry(tid).or_default().insert(page_id);
        } else if table.queues.get(&page_id).is_some_and(|q| q.requests.is_empty()) {
            table.queues.remove(&page_id);
        }
        granted
    }

    /// Releases one lock. Returns false if `tid` did not hold it.
    pub fn release(&self, tid: TransactionId, page_id: PageId) -> bool {
        self.table.lock().release(tid, page_id)
    }

    /// Releases every lock held by `tid`.
    pub fn release_all(&self, tid: TransactionId) {
        let mut table = self.table.lock();

        let pages = table.held.remove(&tid).unwrap_or_default();
        for page_id in pages {
            table.release(tid, page_id);
        }

        table.waits_for.remove(&tid);
        for waiting_on in table.waits_for.values_mut() {
            waiting_on.remove(&tid);
        }
    }

    pub fn lock_mode(&self, tid: TransactionId, page_id: PageId) -> Option<LockMode> {
        self.table
            .lock()
            .queues
            .get(&page_id)
            .and_then(|q| q.held_mode(tid))
    }

    pub fn holds_lock(&self, tid: TransactionId, page_id: PageId) -> bool {
        self.lock_mode(tid, page_id).is_some()
    }

    /// Checks if any transaction holds `page_id` exclusively.
    pub fn is_exclusively_locked(&self, page_id: PageId) -> bool {
        self.table.lock().queues.get(&page_id).is_some_and(|q| {
            q.requests
                .iter()
                .any(|r| r.granted && r.mode == LockMode::Exclusive)
        })
    }

    /// Pages on which `tid` holds a lock.
    pub fn locked_pages(&self, tid: TransactionId) -> Vec<PageId> {
        let mut pages: Vec<PageId> = self
            .table
            .lock()
            .held
            .get(&tid)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        pages.sort();
        pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::sync::Barrier;
    use std::thread;

    const T1: TransactionId = TransactionId(1);
    const T2: TransactionId = TransactionId(2);
    const T3: TransactionId = TransactionId(3);

    fn page(n: u32) -> PageId {
        PageId::new(1, n)
    }

    fn manager(timeout_ms: u64) -> Arc<LockManager> {
        Arc::new(LockManager::new(Duration::from_millis(timeout_ms), true))
    }

    #[test]
    fn test_lock_compatibility() {
        assert!(LockMode::Shared.is_compatible_with(&LockMode::Shared));
        assert!(!LockMode::Shared.is_compatible_with(&LockMode::Exclusive));
        assert!(!LockMode::Exclusive.is_compatible_with(&LockMode::Shared));
        assert!(!LockMode::Exclusive.is_compatible_with(&LockMode::Exclusive));

        assert!(LockMode::Exclusive.covers(LockMode::Shared));
        assert!(!LockMode::Shared.covers(LockMode::Exclusive));
    }

    #[test]
    fn test_multiple_shared_locks() {
        let manager = manager(100);

        for tid in [T1, T2, T3] {
            manager.acquire(tid, page(0), LockMode::Shared).unwrap();
        }
        for tid in [T1, T2, T3] {
            assert_eq!(manager.lock_mode(tid, page(0)), Some(LockMode::Shared));
        }
        assert!(!manager.is_exclusively_locked(page(0)));
    }

    #[test]
    fn test_reacquire_is_noop() {
        let manager = manager(100);

        manager.acquire(T1, page(0), LockMode::Exclusive).unwrap();
        manager.acquire(T1, page(0), LockMode::Shared).unwrap();
        manager.acquire(T1, page(0), LockMode::Exclusive).unwrap();

        assert_eq!(manager.lock_mode(T1, page(0)), Some(LockMode::Exclusive));
        assert_eq!(manager.locked_pages(T1), vec![page(0)]);
    }

    #[test]
    fn test_exclusive_lock_times_out() {
        let manager = manager(50);

        manager.acquire(T1, page(0), LockMode::Exclusive).unwrap();
        let result = manager.acquire(T2, page(0), LockMode::Shared);

        assert_eq!(result, Err(LockError::Timeout(Duration::from_millis(50))));
        assert!(!manager.holds_lock(T2, page(0)));
        assert!(manager.is_exclusively_locked(page(0)));
    }

    #[test]
    fn test_try_acquire_never_waits() {
        let manager = manager(2000);

        assert!(manager.try_acquire(T1, page(0), LockMode::Shared));
        assert!(manager.try_acquire(T2, page(0), LockMode::Shared));
        assert!(!manager.try_acquire(T3, page(0), LockMode::Exclusive));
        assert!(!manager.holds_lock(T3, page(0)));

        // Upgrade refused while another reader holds the page.
        assert!(!manager.try_acquire(T1, page(0), LockMode::Exclusive));
        manager.release_all(T2);
        assert!(manager.try_acquire(T1, page(0), LockMode::Exclusive));
        assert!(manager.is_exclusively_locked(page(0)));

        assert!(!manager.try_acquire(T2, page(0), LockMode::Shared));
        manager.release_all(T1);
        assert!(manager.try_acquire(T3, page(0), LockMode::Exclusive));
        assert_eq!(manager.locked_pages(T3), vec![page(0)]);
    }

    #[test]
    fn test_upgrade_in_place_when_sole_holder() {
        let manager = manager(50);

        manager.acquire(T1, page(0), LockMode::Shared).unwrap();
        manager.acquire(T1, page(0), LockMode::Exclusive).unwrap();

        assert_eq!(manager.lock_mode(T1, page(0)), Some(LockMode::Exclusive));
    }

    #[test]
    fn test_upgrade_waits_for_other_readers() {
        let manager = manager(2000);
        manager.acquire(T1, page(0), LockMode::Shared).unwrap();
        manager.acquire(T2, page(0), LockMode::Shared).unwrap();

        let m = Arc::clone(&manager);
        let handle = thread::spawn(move || m.acquire(T1, page(0), LockMode::Exclusive));

        thread::sleep(Duration::from_millis(50));
        assert_eq!(manager.lock_mode(T1, page(0)), Some(LockMode::Shared));

        manager.release_all(T2);
        handle.join().unwrap().unwrap();
        assert_eq!(manager.lock_mode(T1, page(0)), Some(LockMode::Exclusive));
    }

    #[test]
    fn test_concurrent_upgrades_deadlock() {
        let manager = manager(2000);
        manager.acquire(T1, page(0), LockMode::Shared).unwrap();
        manager.acquire(T2, page(0), LockMode::Shared).unwrap();

        let m = Arc::clone(&manager);
        let handle = thread::spawn(move || m.acquire(T1, page(0), LockMode::Exclusive));
        thread::sleep(Duration::from_millis(50));

        assert_eq!(
            manager.acquire(T2, page(0), LockMode::Exclusive),
            Err(LockError::Deadlock)
        );

        manager.release_all(T2);
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn test_lock_queue_fifo() {
        let manager = manager(2000);
        let (order_tx, order_rx) = mpsc::channel();

        manager.acquire(T1, page(0), LockMode::Exclusive).unwrap();

        let m = Arc::clone(&manager);
        let tx = order_tx.clone();
        let writer = thread::spawn(move || {
            m.acquire(T2, page(0), LockMode::Exclusive).unwrap();
            tx.send(T2).unwrap();
            thread::sleep(Duration::from_millis(50));
            m.release_all(T2);
        });
        thread::sleep(Duration::from_millis(50));

        let m = Arc::clone(&manager);
        let reader = thread::spawn(move || {
            m.acquire(T3, page(0), LockMode::Shared).unwrap();
            order_tx.send(T3).unwrap();
            m.release_all(T3);
        });
        thread::sleep(Duration::from_millis(50));

        manager.release_all(T1);
        writer.join().unwrap();
        reader.join().unwrap();

        let order: Vec<_> = order_rx.iter().collect();
        assert_eq!(order, vec![T2, T3]);
    }

    #[test]
    fn test_release_all_locks() {
        let manager = manager(100);

        manager.acquire(T1, page(0), LockMode::Shared).unwrap();
        manager.acquire(T1, page(1), LockMode::Exclusive).unwrap();
        manager.acquire(T1, page(2), LockMode::Shared).unwrap();
        assert_eq!(manager.locked_pages(T1).len(), 3);

        manager.release_all(T1);

        assert!(manager.locked_pages(T1).is_empty());
        assert!(!manager.holds_lock(T1, page(1)));
        manager.acquire(T2, page(1), LockMode::Exclusive).unwrap();
    }

    #[test]
    fn test_release_single_lock() {
        let manager = manager(100);

        manager.acquire(T1, page(0), LockMode::Exclusive).unwrap();
        assert!(manager.release(T1, page(0)));
        assert!(!manager.release(T1, page(0)));
        assert!(!manager.is_exclusively_locked(page(0)));
    }

    #[test]
    fn test_deadlock_detection() {
        let manager = manager(5000);
        let barrier = Arc::new(Barrier::new(2));

        manager.acquire(T1, page(0), LockMode::Exclusive).unwrap();
        manager.acquire(T2, page(1), LockMode::Exclusive).unwrap();

        let spawn = |tid: TransactionId, target: PageId| {
            let m = Arc::clone(&manager);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let result = m.acquire(tid, target, LockMode::Exclusive);
                if result.is_err() {
                    m.release_all(tid);
                }
                result
            })
        };
        let h1 = spawn(T1, page(1));
        let h2 = spawn(T2, page(0));

        let results = [h1.join().unwrap(), h2.join().unwrap()];
        let victims = results
            .iter()
            .filter(|r| **r == Err(LockError::Deadlock))
            .count();
        assert_eq!(victims, 1);
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    }
}
