//! Page allocator shared by every meshing invocation.
//!
//! The free list sits behind a one-word spin lock: `0` unlocked, `1` locked.
//! An invocation spins on a compare-exchange `0 -> 1`, edits the list, and
//! stores `0` to release. The list lives in a fixed slot array with an atomic
//! length, kept sorted high to low so the lowest free page is always popped
//! first. Slots and length are only touched while the lock is held, so the
//! acquire/release pair on the lock word orders every edit.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use isoterra_core::types::PageIndex;

use crate::error::AllocError;

const UNLOCKED: u32 = 0;
const LOCKED: u32 = 1;

pub struct PageAllocator {
    lock: AtomicU32,
    slots: Box<[AtomicU32]>,
    len: AtomicU32,
    capacity: u32,
    contention: AtomicU64,
}

/// Lock hold over the free list. Dropping it releases the lock.
struct FreeList<'a> {
    allocator: &'a PageAllocator,
}

impl FreeList<'_> {
    fn len(&self) -> usize {
        self.allocator.len.load(Ordering::Relaxed) as usize
    }

    fn set_len(&mut self, len: usize) {
        self.allocator.len.store(len as u32, Ordering::Relaxed);
    }

    fn get(&self, slot: usize) -> PageIndex {
        self.allocator.slots[slot].load(Ordering::Relaxed)
    }

    fn set(&mut self, slot: usize, page: PageIndex) {
        self.allocator.slots[slot].store(page, Ordering::Relaxed);
    }

    /// `Ok(slot)` if `page` is free, otherwise the slot it would be inserted
    /// at to keep the list descending.
    fn find(&self, page: PageIndex) -> Result<usize, usize> {
        let (mut lo, mut hi) = (0, self.len());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let value = self.get(mid);
            if value == page {
                return Ok(mid);
            }
            if value > page {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        Err(lo)
    }

    fn pop(&mut self) -> Option<PageIndex> {
        let len = self.len();
        if len == 0 {
            return None;
        }
        let page = self.get(len - 1);
        self.set_len(len - 1);
        Some(page)
    }

    /// Drop slots `start..start + run`, shifting the tail down.
    fn remove_run(&mut self, start: usize, run: usize) {
        let len = self.len();
        for slot in start + run..len {
            let page = self.get(slot);
            self.set(slot - run, page);
        }
        self.set_len(len - run);
    }

    fn insert(&mut self, slot: usize, page: PageIndex) {
        let len = self.len();
        for from in (slot..len).rev() {
            let moved = self.get(from);
            self.set(from + 1, moved);
        }
        self.set(slot, page);
        self.set_len(len + 1);
    }
}

impl Drop for FreeList<'_> {
    fn drop(&mut self) {
        self.allocator.lock.store(UNLOCKED, Ordering::Release);
    }
}

impl PageAllocator {
    /// Allocator with pages `0..capacity` all free.
    pub fn new(capacity: u32) -> Self {
        Self {
            lock: AtomicU32::new(UNLOCKED),
            slots: (0..capacity).rev().map(AtomicU32::new).collect(),
            len: AtomicU32::new(capacity),
            capacity,
            contention: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> FreeList<'_> {
        while self
            .lock
            .compare_exchange_weak(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            self.contention.fetch_add(1, Ordering::Relaxed);
            std::hint::spin_loop();
        }
        FreeList { allocator: self }
    }

    /// Take the lowest free page.
    pub fn acquire_page(&self) -> Result<PageIndex, AllocError> {
        let mut free = self.lock();
        free.pop().ok_or(AllocError::Exhausted {
            requested: 1,
            free: 0,
        })
    }

    /// Take `count` consecutive pages in one lock hold, lowest run first.
    /// Returns the first page of the run.
    pub fn acquire_pages(&self, count: u32) -> Result<PageIndex, AllocError> {
        if count == 0 {
            return Err(AllocError::OutOfRange {
                first: 0,
                count,
                capacity: self.capacity,
            });
        }
        if count == 1 {
            return self.acquire_page();
        }

        let mut free = self.lock();
        let run = count as usize;
        if free.len() >= run {
            // Descending order: window [i, i + run) is a run exactly when its
            // ends differ by run - 1. Scan from the low end.
            for start in (0..=free.len() - run).rev() {
                let high = free.get(start);
                let low = free.get(start + run - 1);
                if high - low == count - 1 {
                    free.remove_run(start, run);
                    return Ok(low);
                }
            }
        }
        Err(AllocError::Exhausted {
            requested: count,
            free: free.len() as u32,
        })
    }

    /// Return pages `first..first + count` to the free list.
    ///
    /// Nothing is released unless every page of the run is currently owned.
    pub fn release_pages(&self, first: PageIndex, count: u32) -> Result<(), AllocError> {
        let in_range = first
            .checked_add(count)
            .is_some_and(|end| end <= self.capacity);
        if !in_range {
            return Err(AllocError::OutOfRange {
                first,
                count,
                capacity: self.capacity,
            });
        }

        let mut free = self.lock();
        for page in first..first + count {
            if free.find(page).is_ok() {
                return Err(AllocError::DoubleFree(page));
            }
        }
        for page in first..first + count {
            if let Err(slot) = free.find(page) {
                free.insert(slot, page);
            }
        }
        Ok(())
    }

    pub fn free_count(&self) -> u32 {
        self.lock().len() as u32
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Failed lock attempts since creation.
    pub fn contention(&self) -> u64 {
        self.contention.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::{Arc, Barrier};

    #[test]
    fn test_pages_handed_out_lowest_first() {
        let alloc = PageAllocator::new(4);
        assert_eq!(alloc.acquire_page(), Ok(0));
        assert_eq!(alloc.acquire_page(), Ok(1));
        assert_eq!(alloc.free_count(), 2);
    }

    #[test]
    fn test_exhaustion_is_an_error() {
        let alloc = PageAllocator::new(1);
        assert_eq!(alloc.acquire_page(), Ok(0));
        assert_eq!(
            alloc.acquire_page(),
            Err(AllocError::Exhausted {
                requested: 1,
                free: 0
            })
        );
    }

    #[test]
    fn test_contiguous_run_skips_fragmented_pages() {
        let alloc = PageAllocator::new(8);
        for _ in 0..8 {
            alloc.acquire_page().expect("free page");
        }
        // Free 1, 3, 4, 5: only 3..6 is a run of three.
        alloc.release_pages(1, 1).expect("owned");
        alloc.release_pages(3, 3).expect("owned");
        assert_eq!(alloc.acquire_pages(3), Ok(3));
        assert_eq!(alloc.free_count(), 1);
        assert!(matches!(
            alloc.acquire_pages(2),
            Err(AllocError::Exhausted { requested: 2, free: 1 })
        ));
    }

    #[test]
    fn test_release_rejects_double_free() {
        let alloc = PageAllocator::new(4);
        let first = alloc.acquire_pages(2).expect("run");
        alloc.release_pages(first, 2).expect("owned");
        assert_eq!(alloc.release_pages(first, 1), Err(AllocError::DoubleFree(first)));
        assert_eq!(alloc.free_count(), 4);
    }

    #[test]
    fn test_failed_release_changes_nothing() {
        let alloc = PageAllocator::new(4);
        alloc.acquire_page().expect("page 0");
        // Page 1 is still free, so releasing 0..2 must not free page 0 either.
        assert_eq!(alloc.release_pages(0, 2), Err(AllocError::DoubleFree(1)));
        assert_eq!(alloc.free_count(), 3);
        assert!(matches!(
            alloc.release_pages(3, 2),
            Err(AllocError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_release_keeps_lowest_first_order() {
        let alloc = PageAllocator::new(6);
        let first = alloc.acquire_pages(6).expect("whole range");
        assert_eq!(first, 0);
        alloc.release_pages(4, 1).expect("owned");
        alloc.release_pages(0, 2).expect("owned");
        alloc.release_pages(2, 1).expect("owned");
        assert_eq!(alloc.acquire_pages(3), Ok(0));
        assert_eq!(alloc.acquire_page(), Ok(4));
        assert_eq!(alloc.free_count(), 0);
    }

    #[test]
    fn test_blocked_acquire_counts_contention() {
        let alloc = Arc::new(PageAllocator::new(2));
        let held = alloc.lock();
        let waiter = {
            let alloc = Arc::clone(&alloc);
            std::thread::spawn(move || alloc.acquire_page())
        };
        while alloc.contention() == 0 {
            std::thread::yield_now();
        }
        drop(held);
        assert_eq!(waiter.join().expect("worker"), Ok(0));
        assert!(alloc.contention() > 0);
        assert_eq!(alloc.free_count(), 1);
    }

    #[test]
    fn test_concurrent_acquires_are_distinct() {
        let workers = 16;
        let per_worker = 64;
        let alloc = Arc::new(PageAllocator::new(workers * per_worker));
        let barrier = Arc::new(Barrier::new(workers as usize));

        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let alloc = Arc::clone(&alloc);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    (0..per_worker)
                        .map(|_| alloc.acquire_page().expect("enough pages"))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for page in handle.join().expect("worker") {
                assert!(seen.insert(page), "page {page} handed out twice");
            }
        }
        assert_eq!(seen.len() as u32, workers * per_worker);
        assert_eq!(alloc.free_count(), 0);
    }

    #[test]
    fn test_concurrent_acquires_past_capacity() {
        let workers = 32;
        let free = 20;
        let alloc = Arc::new(PageAllocator::new(free));
        let barrier = Arc::new(Barrier::new(workers));

        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let alloc = Arc::clone(&alloc);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    alloc.acquire_page()
                })
            })
            .collect();

        let results: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().expect("worker"))
            .collect();
        let granted: HashSet<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        let exhausted = results
            .iter()
            .filter(|r| matches!(r, Err(AllocError::Exhausted { .. })))
            .count();
        assert_eq!(granted.len(), free as usize);
        assert_eq!(exhausted, workers - free as usize);
    }

    #[test]
    fn test_concurrent_runs_do_not_overlap() {
        let alloc = Arc::new(PageAllocator::new(256));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let alloc = Arc::clone(&alloc);
                std::thread::spawn(move || {
                    let count = 1 + i % 4;
                    (alloc.acquire_pages(count).expect("room"), count)
                })
            })
            .collect();

        let mut owned = HashSet::new();
        for handle in handles {
            let (first, count) = handle.join().expect("worker");
            for page in first..first + count {
                assert!(owned.insert(page), "page {page} in two runs");
            }
        }
    }
}
