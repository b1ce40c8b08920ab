//! Process-wide pool of reusable offset segments.
//!
//! Every [`SegmentedOffsetArray`](crate::SegmentedOffsetArray) grows by taking
//! segments from a shared [`SegmentPool`] and gives all of them back when it is
//! drained. After the first few collections the pool holds enough idle
//! segments that recording an evacuation failure never reaches the system
//! allocator.
//!
//! The idle set is a lock-free `SegQueue`, so acquire and release from many
//! regions never block each other.

use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam::utils::CachePadded;
use crossbeam_queue::SegQueue;

use crate::segment::Segment;

/// Default number of offsets per segment.
pub const DEFAULT_SEGMENT_LENGTH: usize = 256;

/// Upper bound accepted for [`SegmentPoolConfig::segment_length`].
pub const MAX_SEGMENT_LENGTH: usize = 1 << 20;

/// Configuration for a [`SegmentPool`].
///
/// Every set sharing one pool uses the same segment length; it is fixed when
/// the pool is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentPoolConfig {
    /// Number of offsets each segment can hold.
    pub segment_length: usize,
}

impl Default for SegmentPoolConfig {
    fn default() -> Self {
        Self {
            segment_length: DEFAULT_SEGMENT_LENGTH,
        }
    }
}

impl SegmentPoolConfig {
    /// Create a configuration with the given segment length.
    #[must_use]
    pub const fn new(segment_length: usize) -> Self {
        Self { segment_length }
    }

    /// Set the number of offsets per segment.
    #[must_use]
    pub const fn with_segment_length(mut self, segment_length: usize) -> Self {
        self.segment_length = segment_length;
        self
    }

    /// Check that the configuration is usable.
    ///
    /// # Panics
    ///
    /// Panics if `segment_length` is zero or above [`MAX_SEGMENT_LENGTH`].
    pub fn validate(&self) {
        assert!(self.segment_length > 0, "segment length must be non-zero");
        assert!(
            self.segment_length <= MAX_SEGMENT_LENGTH,
            "segment length {} exceeds {}",
            self.segment_length,
            MAX_SEGMENT_LENGTH
        );
    }
}

/// Snapshot of [`SegmentPool`] counters.
///
/// Exact while no acquire or release is in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SegmentPoolStats {
    /// Segments currently idle in the pool.
    pub idle_segments: usize,
    /// Bytes held by idle segments.
    pub idle_mem_size: usize,
    /// Segments allocated from the system since the pool was created.
    pub total_allocated: usize,
    /// Segments handed back to the system by [`SegmentPool::purge`].
    pub total_freed: usize,
}

impl SegmentPoolStats {
    /// Segments that exist right now, idle or owned by an array.
    #[must_use]
    pub const fn live_segments(&self) -> usize {
        self.total_allocated - self.total_freed
    }

    /// Segments currently owned by arrays.
    #[must_use]
    pub const fn segments_in_use(&self) -> usize {
        self.live_segments() - self.idle_segments
    }
}

/// A thread-safe pool of idle [`Segment`]s of one fixed length.
///
/// Share it between sets through an `Arc`. Idle segments are freed when the
/// pool is dropped.
#[derive(Debug)]
pub struct SegmentPool {
    segment_length: usize,
    idle: SegQueue<Box<Segment>>,
    // Incremented before a push and decremented after a pop, so the counters
    // never fall below the true idle count.
    idle_count: CachePadded<AtomicUsize>,
    idle_mem_size: CachePadded<AtomicUsize>,
    total_allocated: AtomicUsize,
    total_freed: AtomicUsize,
}

impl Default for SegmentPool {
    fn default() -> Self {
        Self::new(SegmentPoolConfig::default())
    }
}

impl SegmentPool {
    /// Create an empty pool.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid (see [`SegmentPoolConfig::validate`]).
    #[must_use]
    pub fn new(config: SegmentPoolConfig) -> Self {
        config.validate();
        Self {
            segment_length: config.segment_length,
            idle: SegQueue::new(),
            idle_count: CachePadded::new(AtomicUsize::new(0)),
            idle_mem_size: CachePadded::new(AtomicUsize::new(0)),
            total_allocated: AtomicUsize::new(0),
            total_freed: AtomicUsize::new(0),
        }
    }

    /// Create an empty pool whose segments hold `segment_length` offsets.
    ///
    /// # Panics
    ///
    /// Panics if `segment_length` is zero or above [`MAX_SEGMENT_LENGTH`].
    #[must_use]
    pub fn with_segment_length(segment_length: usize) -> Self {
        Self::new(SegmentPoolConfig::new(segment_length))
    }

    /// Number of offsets each segment holds.
    #[inline]
    #[must_use]
    pub const fn segment_length(&self) -> usize {
        self.segment_length
    }

    /// Take an idle segment, or allocate a new one if none is idle.
    ///
    /// The returned segment is empty and unlinked.
    #[must_use]
    pub fn acquire(&self) -> Box<Segment> {
        if let Some(segment) = self.idle.pop() {
            self.idle_mem_size
                .fetch_sub(segment.mem_size(), Ordering::Relaxed);
            self.idle_count.fetch_sub(1, Ordering::Relaxed);
            gc_assert!(segment.is_reset(), "pooled segment still holds data");
            return segment;
        }

        let segment = Segment::new(self.segment_length);
        self.total_allocated.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "tracing")]
        crate::tracing::internal::log_segment_allocated(
            self.segment_length,
            self.total_allocated(),
        );
        segment
    }

    /// Return a segment to the pool.
    ///
    /// The segment is reset before it becomes visible to other acquirers.
    pub fn release(&self, mut segment: Box<Segment>) {
        gc_assert!(
            segment.capacity() == self.segment_length,
            "segment of {} slots released to pool of {}-slot segments",
            segment.capacity(),
            self.segment_length
        );
        segment.reset();
        self.idle_count.fetch_add(1, Ordering::Relaxed);
        self.idle_mem_size
            .fetch_add(segment.mem_size(), Ordering::Relaxed);
        self.idle.push(segment);
    }

    /// Free idle segments until at most `keep` remain.
    ///
    /// Returns the number of segments freed. Meant for use outside a pause,
    /// for example when the heap shrinks.
    pub fn purge(&self, keep: usize) -> usize {
        let mut freed = 0;
        while self.idle_count.load(Ordering::Relaxed) > keep {
            let Some(segment) = self.idle.pop() else {
                break;
            };
            self.idle_mem_size
                .fetch_sub(segment.mem_size(), Ordering::Relaxed);
            self.idle_count.fetch_sub(1, Ordering::Relaxed);
            drop(segment);
            freed += 1;
        }
        self.total_freed.fetch_add(freed, Ordering::Relaxed);
        #[cfg(feature = "tracing")]
        crate::tracing::internal::log_pool_purged(freed, self.num_idle_segments());
        freed
    }

    /// Number of idle segments.
    #[inline]
    #[must_use]
    pub fn num_idle_segments(&self) -> usize {
        self.idle_count.load(Ordering::Relaxed)
    }

    /// Bytes held by idle segments.
    #[inline]
    #[must_use]
    pub fn idle_mem_size(&self) -> usize {
        self.idle_mem_size.load(Ordering::Relaxed)
    }

    /// Segments allocated from the system since creation.
    #[inline]
    #[must_use]
    pub fn total_allocated(&self) -> usize {
        self.total_allocated.load(Ordering::Relaxed)
    }

    /// Snapshot of all counters.
    #[must_use]
    pub fn stats(&self) -> SegmentPoolStats {
        SegmentPoolStats {
            idle_segments: self.num_idle_segments(),
            idle_mem_size: self.idle_mem_size(),
            total_allocated: self.total_allocated(),
            total_freed: self.total_freed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{SegmentPool, SegmentPoolConfig, DEFAULT_SEGMENT_LENGTH, MAX_SEGMENT_LENGTH};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_config_default() {
        let config = SegmentPoolConfig::default();
        assert_eq!(config.segment_length, DEFAULT_SEGMENT_LENGTH);
        assert_eq!(config.with_segment_length(16).segment_length, 16);
    }

    #[test]
    #[should_panic(expected = "non-zero")]
    fn test_config_rejects_zero_length() {
        let _ = SegmentPool::with_segment_length(0);
    }

    #[test]
    #[should_panic(expected = "exceeds")]
    fn test_config_rejects_huge_length() {
        let _ = SegmentPool::with_segment_length(MAX_SEGMENT_LENGTH + 1);
    }

    #[test]
    fn test_acquire_from_empty_pool_allocates() {
        let pool = SegmentPool::with_segment_length(8);
        let segment = pool.acquire();
        assert_eq!(segment.capacity(), 8);
        assert_eq!(pool.total_allocated(), 1);
        assert_eq!(pool.num_idle_segments(), 0);
        pool.release(segment);
        assert_eq!(pool.num_idle_segments(), 1);
    }

    #[test]
    fn test_release_then_acquire_reuses_segment() {
        let pool = SegmentPool::with_segment_length(8);
        let segment = pool.acquire();
        let addr = &*segment as *const _ as usize;
        assert!(segment.try_push(5));
        pool.release(segment);

        let again = pool.acquire();
        assert_eq!(&*again as *const _ as usize, addr);
        assert_eq!(again.length(), 0);
        assert!(again.is_reset());
        assert_eq!(pool.total_allocated(), 1);
    }

    #[test]
    fn test_idle_mem_size_tracks_segments() {
        let pool = SegmentPool::with_segment_length(32);
        let a = pool.acquire();
        let b = pool.acquire();
        let per_segment = a.mem_size();
        pool.release(a);
        pool.release(b);
        assert_eq!(pool.idle_mem_size(), 2 * per_segment);

        let _c = pool.acquire();
        assert_eq!(pool.idle_mem_size(), per_segment);
    }

    #[test]
    fn test_purge_keeps_requested_count() {
        let pool = SegmentPool::with_segment_length(4);
        let segments: Vec<_> = (0..10).map(|_| pool.acquire()).collect();
        for segment in segments {
            pool.release(segment);
        }

        assert_eq!(pool.purge(3), 7);
        let stats = pool.stats();
        assert_eq!(stats.idle_segments, 3);
        assert_eq!(stats.total_allocated, 10);
        assert_eq!(stats.total_freed, 7);
        assert_eq!(stats.live_segments(), 3);
        assert_eq!(stats.segments_in_use(), 0);

        assert_eq!(pool.purge(5), 0);
        assert_eq!(pool.purge(0), 3);
        assert_eq!(pool.idle_mem_size(), 0);
    }

    #[test]
    #[cfg_attr(
        not(any(debug_assertions, feature = "verify")),
        ignore = "verification compiled out"
    )]
    #[should_panic(expected = "released to pool")]
    fn test_release_foreign_segment_length() {
        let pool = SegmentPool::with_segment_length(4);
        pool.release(crate::Segment::new(8));
    }

    #[test]
    fn test_concurrent_acquire_release_conserves_segments() {
        let pool = Arc::new(SegmentPool::with_segment_length(16));
        let mut handles = Vec::new();

        for _ in 0..8 {
            let pool = Arc::clone(&pool);
            handles.push(thread::spawn(move || {
                for round in 0..200 {
                    let held: Vec<_> = (0..(round % 5 + 1)).map(|_| pool.acquire()).collect();
                    for segment in held {
                        pool.release(segment);
                    }
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        let stats = pool.stats();
        assert_eq!(stats.segments_in_use(), 0);
        assert_eq!(stats.idle_segments, stats.total_allocated);
        // Eight threads never hold more than five segments each.
        assert!(stats.total_allocated <= 40);
    }
}
