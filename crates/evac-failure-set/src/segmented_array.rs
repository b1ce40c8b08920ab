//! Append-only offset storage backed by pooled segments.

use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam::utils::Backoff;

use crate::pool::SegmentPool;
use crate::region::OffsetInRegion;
use crate::segment::Segment;

/// An append-only sequence of offsets stored in a chain of [`Segment`]s.
///
/// New segments are taken from the shared [`SegmentPool`] and pushed onto the
/// head of the chain, so appending never moves data that is already stored.
/// [`record`](Self::record) is lock free and may be called from several
/// threads at once; the collector normally confines each region's array to
/// one recorder at a time, and the only contention it then sees is inside the
/// pool.
///
/// Segments stay linked until [`drop_all`](Self::drop_all), which needs
/// exclusive access and returns every segment to the pool.
#[derive(Debug)]
pub struct SegmentedOffsetArray {
    pool: Arc<SegmentPool>,
    /// Most recently added segment.
    first: AtomicPtr<Segment>,
    num_segments: AtomicUsize,
    num_available_slots: AtomicUsize,
    num_allocated_slots: AtomicUsize,
    mem_size: AtomicUsize,
}

impl SegmentedOffsetArray {
    /// Create an empty array drawing segments from `pool`.
    #[must_use]
    pub fn new(pool: Arc<SegmentPool>) -> Self {
        Self {
            pool,
            first: AtomicPtr::new(ptr::null_mut()),
            num_segments: AtomicUsize::new(0),
            num_available_slots: AtomicUsize::new(0),
            num_allocated_slots: AtomicUsize::new(0),
            mem_size: AtomicUsize::new(0),
        }
    }

    /// The pool this array grows from.
    #[inline]
    #[must_use]
    pub const fn pool(&self) -> &Arc<SegmentPool> {
        &self.pool
    }

    /// Append `offset`.
    ///
    /// Claims a slot in the head segment; when the head is full, installs a
    /// fresh segment from the pool and retries there.
    pub fn record(&self, offset: OffsetInRegion) {
        let backoff = Backoff::new();
        let mut cur = self.first.load(Ordering::Acquire);
        loop {
            if cur.is_null() {
                cur = self.install_segment(cur, &backoff);
                continue;
            }
            // SAFETY: published segments stay linked, and therefore alive,
            // until `drop_all`, which requires `&mut self`.
            let segment = unsafe { &*cur };
            if segment.try_push(offset) {
                self.num_allocated_slots.fetch_add(1, Ordering::Relaxed);
                return;
            }
            cur = self.install_segment(cur, &backoff);
        }
    }

    /// Link a pooled segment in front of `expected` and return the new head.
    ///
    /// If another appender replaced `expected` first, the pooled segment goes
    /// straight back and the winner's head is returned.
    fn install_segment(&self, expected: *mut Segment, backoff: &Backoff) -> *mut Segment {
        let mut segment = self.pool.acquire();
        segment.set_next(expected);
        let capacity = segment.capacity();
        let mem_size = segment.mem_size();
        let new = Box::into_raw(segment);

        match self
            .first
            .compare_exchange(expected, new, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                self.num_segments.fetch_add(1, Ordering::Relaxed);
                self.num_available_slots
                    .fetch_add(capacity, Ordering::Relaxed);
                self.mem_size.fetch_add(mem_size, Ordering::Relaxed);
                new
            }
            Err(current) => {
                // SAFETY: `new` came from `Box::into_raw` above and was never
                // published.
                let segment = unsafe { Box::from_raw(new) };
                self.pool.release(segment);
                #[cfg(feature = "tracing")]
                crate::tracing::internal::log_segment_race_lost();
                backoff.spin();
                current
            }
        }
    }

    /// Number of offsets recorded since the last [`drop_all`](Self::drop_all).
    #[inline]
    #[must_use]
    pub fn num_allocated_slots(&self) -> usize {
        self.num_allocated_slots.load(Ordering::Relaxed)
    }

    /// Whether nothing has been recorded.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.num_allocated_slots() == 0
    }

    /// Number of segments in the chain.
    #[inline]
    #[must_use]
    pub fn num_segments(&self) -> usize {
        self.num_segments.load(Ordering::Relaxed)
    }

    /// Total slot capacity of the chain.
    #[inline]
    #[must_use]
    pub fn num_available_slots(&self) -> usize {
        self.num_available_slots.load(Ordering::Relaxed)
    }

    /// Bytes of segment memory held by the chain.
    #[inline]
    #[must_use]
    pub fn mem_size(&self) -> usize {
        self.mem_size.load(Ordering::Relaxed)
    }

    /// Visit every segment together with its number of stored offsets.
    ///
    /// Segments are visited newest first; callers must not rely on any order
    /// across segments.
    pub fn for_each_segment<F>(&self, mut f: F)
    where
        F: FnMut(&Segment, usize),
    {
        let mut cur = self.first.load(Ordering::Acquire);
        while !cur.is_null() {
            // SAFETY: see `record`.
            let segment = unsafe { &*cur };
            f(segment, segment.length());
            cur = segment.next();
        }
    }

    /// Return every segment to the pool and reset the array to empty.
    pub fn drop_all(&mut self) {
        let mut cur = std::mem::replace(self.first.get_mut(), ptr::null_mut());
        let mut released = 0usize;
        while !cur.is_null() {
            // SAFETY: every linked segment came from `Box::into_raw` in
            // `install_segment`, and `&mut self` rules out concurrent readers.
            let segment = unsafe { Box::from_raw(cur) };
            cur = segment.next();
            self.pool.release(segment);
            released += 1;
        }
        let counted = *self.num_segments.get_mut();
        gc_assert!(
            released == counted,
            "released {} segments but the chain counted {}",
            released,
            counted
        );

        *self.num_segments.get_mut() = 0;
        *self.num_available_slots.get_mut() = 0;
        *self.num_allocated_slots.get_mut() = 0;
        *self.mem_size.get_mut() = 0;
    }
}

impl Drop for SegmentedOffsetArray {
    fn drop(&mut self) {
        self.drop_all();
    }
}
