//! Per-region set of objects that failed evacuation.

use std::sync::Arc;

use crate::address::Address;
use crate::drain::DrainPipeline;
use crate::phase_times::PhaseTimes;
use crate::pool::SegmentPool;
use crate::region::{OffsetInRegion, RegionDescriptor};
use crate::safepoint;
use crate::segmented_array::SegmentedOffsetArray;

/// Repair action applied to every object drained from a set.
///
/// Implemented for every `FnMut(Address)`.
pub trait ObjectClosure {
    /// Process the object starting at `obj`.
    fn do_object(&mut self, obj: Address);
}

impl<F: FnMut(Address)> ObjectClosure for F {
    #[inline]
    fn do_object(&mut self, obj: Address) {
        self(obj);
    }
}

/// The objects of one region that could not be evacuated in this pause.
///
/// Objects are recorded as word offsets from the region bottom in a
/// [`SegmentedOffsetArray`]. One set exists per region per collection; it is
/// emptied by [`process_and_drop`](Self::process_and_drop) and can then be
/// reused for the next collection.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use evac_failure_set::{
///     safepoint, Address, EvacFailureObjectSet, RegionDescriptor, SegmentPool, WorkerPhaseTimes,
/// };
///
/// let pool = Arc::new(SegmentPool::with_segment_length(4));
/// let region = RegionDescriptor::new(7, Address::new(0x20_0000), 1024);
/// let mut set = EvacFailureObjectSet::new(region, pool);
///
/// for word in [40, 3, 17, 900, 5] {
///     set.record(region.bottom().offset_words(word));
/// }
///
/// let times = WorkerPhaseTimes::new(1);
/// let _safepoint = safepoint::enter();
/// let mut words = Vec::new();
/// set.process_and_drop(
///     |obj: Address| words.push(obj.word_delta(region.bottom())),
///     &times,
///     0,
/// );
/// assert_eq!(words, vec![3, 5, 17, 40, 900]);
/// ```
#[derive(Debug)]
pub struct EvacFailureObjectSet {
    region: RegionDescriptor,
    offsets: SegmentedOffsetArray,
}

impl EvacFailureObjectSet {
    /// Create an empty set for `region`, growing from `pool`.
    #[must_use]
    pub fn new(region: RegionDescriptor, pool: Arc<SegmentPool>) -> Self {
        Self {
            region,
            offsets: SegmentedOffsetArray::new(pool),
        }
    }

    /// The region this set belongs to.
    #[inline]
    #[must_use]
    pub const fn region(&self) -> &RegionDescriptor {
        &self.region
    }

    /// Record that the object at `obj` failed evacuation.
    ///
    /// Recording the same object twice stores it twice, and it will be
    /// visited twice.
    ///
    /// # Panics
    ///
    /// Panics when verification is enabled and `obj` is not a word-aligned
    /// address inside the region.
    #[inline]
    pub fn record(&self, obj: Address) {
        let offset = self.to_offset(obj);
        self.offsets.record(offset);
    }

    /// Number of recordings since the set was last drained.
    #[inline]
    #[must_use]
    pub fn num_evac_failure_objects(&self) -> usize {
        self.offsets.num_allocated_slots()
    }

    /// Whether nothing has been recorded since the last drain.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// The underlying offset storage.
    #[inline]
    #[must_use]
    pub const fn offsets(&self) -> &SegmentedOffsetArray {
        &self.offsets
    }

    /// Visit every recorded object in ascending address order, then empty
    /// the set and return its segments to the pool.
    ///
    /// The three drain phases are timed against `phase_times` under
    /// `worker_id`. Must run at a safepoint.
    ///
    /// # Panics
    ///
    /// Panics when verification is enabled and no safepoint is active, or if
    /// the gathered offsets do not match the recorded count.
    pub fn process_and_drop<C: ObjectClosure>(
        &mut self,
        closure: C,
        phase_times: &dyn PhaseTimes,
        worker_id: usize,
    ) {
        safepoint::assert_at_safepoint();

        #[cfg(feature = "tracing")]
        let (objects, segments) = (
            self.offsets.num_allocated_slots(),
            self.offsets.num_segments(),
        );

        DrainPipeline::new(&self.region, &mut self.offsets, phase_times, worker_id)
            .process_and_drop(closure);

        #[cfg(feature = "tracing")]
        crate::tracing::internal::log_drain_complete(self.region.index(), objects, segments);
    }

    #[inline]
    fn to_offset(&self, obj: Address) -> OffsetInRegion {
        self.region.to_offset(obj)
    }
}
