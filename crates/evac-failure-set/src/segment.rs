//! Fixed-capacity storage blocks for recorded offsets.

use std::ptr;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use crate::region::OffsetInRegion;

/// A fixed-capacity block of offset slots.
///
/// Slots are claimed with an atomic cursor, so several appenders may fill one
/// segment concurrently. The cursor can run past the capacity when appenders
/// race on a full segment; the logical length is clamped to the capacity.
///
/// A segment is either linked into exactly one
/// [`SegmentedOffsetArray`](crate::SegmentedOffsetArray) or idle in a
/// [`SegmentPool`](crate::SegmentPool).
#[derive(Debug)]
pub struct Segment {
    /// Next slot to hand out.
    cursor: AtomicUsize,
    /// Older segment in the owning chain, null at the tail or when idle.
    next: *mut Segment,
    slots: Box<[AtomicU32]>,
}

// SAFETY: `next` is only written by the exclusive owner before the segment is
// published, and only followed by the owning array. Slot data is atomic.
unsafe impl Send for Segment {}

// SAFETY: See Send impl
unsafe impl Sync for Segment {}

impl Segment {
    /// Allocate an empty segment with room for `capacity` offsets.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Box<Self> {
        assert!(capacity > 0, "segment capacity must be non-zero");
        Box::new(Self {
            cursor: AtomicUsize::new(0),
            next: ptr::null_mut(),
            slots: (0..capacity).map(|_| AtomicU32::new(0)).collect(),
        })
    }

    /// Number of slots in this segment.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of filled slots.
    #[inline]
    #[must_use]
    pub fn length(&self) -> usize {
        self.cursor.load(Ordering::Acquire).min(self.capacity())
    }

    /// Whether every slot has been claimed.
    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.cursor.load(Ordering::Relaxed) >= self.capacity()
    }

    /// Bytes of memory held by this segment.
    #[inline]
    #[must_use]
    pub fn mem_size(&self) -> usize {
        std::mem::size_of::<Self>() + self.capacity() * std::mem::size_of::<AtomicU32>()
    }

    /// The offset stored in slot `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not below [`length`](Self::length).
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> OffsetInRegion {
        assert!(index < self.length(), "slot {index} not filled");
        self.slots[index].load(Ordering::Relaxed)
    }

    /// Claim a free slot and store `value` in it.
    ///
    /// Returns `false` without storing if the segment is already full.
    #[inline]
    pub(crate) fn try_push(&self, value: OffsetInRegion) -> bool {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed);
        if index >= self.capacity() {
            return false;
        }
        self.slots[index].store(value, Ordering::Relaxed);
        true
    }

    /// Append the first `length()` offsets to `dst`.
    pub fn copy_to(&self, dst: &mut Vec<OffsetInRegion>) {
        let length = self.length();
        dst.extend(
            self.slots[..length]
                .iter()
                .map(|slot| slot.load(Ordering::Relaxed)),
        );
    }

    #[inline]
    pub(crate) const fn next(&self) -> *mut Self {
        self.next
    }

    #[inline]
    pub(crate) fn set_next(&mut self, next: *mut Self) {
        self.next = next;
    }

    /// Forget all stored offsets and unlink from any chain.
    pub(crate) fn reset(&mut self) {
        *self.cursor.get_mut() = 0;
        self.next = ptr::null_mut();
    }

    /// Whether the segment holds no data and no link.
    #[inline]
    #[must_use]
    pub fn is_reset(&self) -> bool {
        self.cursor.load(Ordering::Relaxed) == 0 && self.next.is_null()
    }
}
