use parking_lot::{Mutex, MutexGuard, RwLock};
use std::sync::Arc;

/// Physical latches for one table file: one per page plus one guarding growth.
#[derive(Debug, Default)]
pub struct PageLatches {
    pages: RwLock<Vec<Arc<Mutex<()>>>>,
    growth: Mutex<()>,
}

impl PageLatches {
    pub fn new(num_pages: u32) -> Self {
        Self {
            pages: RwLock::new((0..num_pages).map(|_| Arc::new(Mutex::new(()))).collect()),
            growth: Mutex::new(()),
        }
    }

    /// Latch for `page_number`, created on first use.
    pub fn page(&self, page_number: u32) -> Arc<Mutex<()>> {
        let index = page_number as usize;
        if let Some(latch) = self.pages.read().get(index) {
            return Arc::clone(latch);
        }

        let mut pages = self.pages.write();
        while pages.len() <= index {
            pages.push(Arc::new(Mutex::new(())));
        }
        Arc::clone(&pages[index])
    }

    /// Serializes page-count growth of the file.
    pub fn lock_growth(&self) -> MutexGuard<'_, ()> {
        self.growth.lock()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.pages.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_latches_created_on_demand() {
        let latches = PageLatches::new(2);
        assert_eq!(latches.len(), 2);

        let a = latches.page(5);
        assert_eq!(latches.len(), 6);
        assert!(Arc::ptr_eq(&a, &latches.page(5)));
        assert!(!Arc::ptr_eq(&a, &latches.page(4)));
    }

    #[test]
    fn test_page_latch_serializes_holders() {
        let latches = Arc::new(PageLatches::new(1));
        let inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let latches = Arc::clone(&latches);
                let inside = Arc::clone(&inside);
                thread::spawn(move || {
                    let latch = latches.page(0);
                    let _guard = latch.lock();
                    assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                    thread::sleep(Duration::from_millis(5));
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn test_growth_latch_is_exclusive() {
        let latches = PageLatches::new(0);
        let guard = latches.lock_growth();
        assert!(latches.growth.try_lock().is_none());
        drop(guard);
        assert!(latches.growth.try_lock().is_some());
    }
}
