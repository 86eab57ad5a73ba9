//! Bounded session-slot allocation and the process-wide connection counters.

use std::fmt;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Identifier of an occupied connection slot, in `1..=capacity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(NonZeroU32);

impl SlotId {
    /// Wrap a raw id. Zero is never a valid slot.
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    /// The raw numeric id.
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Point-in-time counter snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStats {
    /// Connections given a slot since startup. Never decreases.
    pub accepted: u64,
    /// Slots currently held.
    pub active: usize,
    /// Total slots.
    pub capacity: usize,
}

/// Fixed pool of slot ids plus the accepted/active counters.
///
/// Allocation always hands out the smallest free id. This is a linear scan
/// under one lock; replace with a free-list if capacity grows large.
pub struct SlotPool {
    taken: Mutex<Vec<bool>>,
    accepted: AtomicU64,
    active: AtomicUsize,
}

impl SlotPool {
    /// A pool of `capacity` slots, ids `1..=capacity`.
    pub fn new(capacity: u32) -> Self {
        Self {
            taken: Mutex::new(vec![false; capacity as usize]),
            accepted: AtomicU64::new(0),
            active: AtomicUsize::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<bool>> {
        // The table holds plain flags, so a poisoned lock is still consistent.
        self.taken.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim the smallest free slot, or `None` when the pool is full.
    pub fn allocate(&self) -> Option<SlotId> {
        let mut taken = self.lock();
        let index = taken.iter().position(|t| !t)?;
        taken[index] = true;
        self.accepted.fetch_add(1, Ordering::Relaxed);
        self.active.fetch_add(1, Ordering::Relaxed);
        SlotId::new(index as u32 + 1)
    }

    /// Release `slot`. Returns false if it was not held.
    pub fn free(&self, slot: SlotId) -> bool {
        let mut taken = self.lock();
        match taken.get_mut(slot.get() as usize - 1) {
            Some(flag) if *flag => {
                *flag = false;
                self.active.fetch_sub(1, Ordering::Relaxed);
                true
            }
            _ => false,
        }
    }

    /// Whether `slot` is currently held.
    pub fn is_taken(&self, slot: SlotId) -> bool {
        self.lock()
            .get(slot.get() as usize - 1)
            .copied()
            .unwrap_or(false)
    }

    /// Total slots.
    pub fn capacity(&self) -> usize {
        self.lock().len()
    }

    /// Connections given a slot since startup.
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    /// Slots currently held.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    /// Snapshot of all counters.
    pub fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            accepted: self.accepted(),
            active: self.active(),
            capacity: self.capacity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_allocates_smallest_free_id() {
        let pool = SlotPool::new(3);
        let a = pool.allocate().unwrap();
        let b = pool.allocate().unwrap();
        let c = pool.allocate().unwrap();
        assert_eq!((a.get(), b.get(), c.get()), (1, 2, 3));
        assert!(pool.allocate().is_none());

        assert!(pool.free(b));
        assert_eq!(pool.allocate(), Some(b), "freed id is reused");
    }

    #[test]
    fn test_double_free_is_noop() {
        let pool = SlotPool::new(2);
        let slot = pool.allocate().unwrap();
        assert!(pool.free(slot));
        assert!(!pool.free(slot));
        assert_eq!(pool.active(), 0);
    }

    #[test]
    fn test_counters() {
        let pool = SlotPool::new(2);
        let a = pool.allocate().unwrap();
        pool.free(a);
        pool.allocate().unwrap();
        assert_eq!(
            pool.stats(),
            ConnectionStats {
                accepted: 2,
                active: 1,
                capacity: 2,
            }
        );
    }

    #[test]
    fn test_out_of_range_slot_is_not_taken() {
        let pool = SlotPool::new(1);
        let far = SlotId::new(99).unwrap();
        assert!(!pool.is_taken(far));
        assert!(!pool.free(far));
        assert!(SlotId::new(0).is_none());
    }

    #[test]
    fn test_concurrent_allocations_are_unique() {
        let pool = Arc::new(SlotPool::new(64));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || (0..8).filter_map(|_| pool.allocate()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for slot in handle.join().unwrap() {
                assert!(seen.insert(slot), "slot {slot} handed out twice");
            }
        }
        assert_eq!(seen.len(), 64);
        assert_eq!(pool.active(), 64);
    }
}
