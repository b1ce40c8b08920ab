//! Gather, sort, visit, and reclaim one region's recorded offsets.

use crate::object_set::ObjectClosure;
use crate::phase_times::{DrainPhase, PhaseTimes, PhaseTracker};
use crate::region::{OffsetInRegion, RegionDescriptor};
use crate::segmented_array::SegmentedOffsetArray;

/// Consumes one region's [`SegmentedOffsetArray`] exactly once.
///
/// 1. **Gather & sort**: copy every segment into a single buffer sized by the
///    recorded count and sort it ascending.
/// 2. **Visit**: decode each offset and hand the object to the closure, lowest
///    address first.
/// 3. **Reclaim**: free the buffer and return every segment to the pool.
pub struct DrainPipeline<'a> {
    region: &'a RegionDescriptor,
    offsets: &'a mut SegmentedOffsetArray,
    phase_times: &'a dyn PhaseTimes,
    worker_id: usize,
}

impl<'a> DrainPipeline<'a> {
    pub fn new(
        region: &'a RegionDescriptor,
        offsets: &'a mut SegmentedOffsetArray,
        phase_times: &'a dyn PhaseTimes,
        worker_id: usize,
    ) -> Self {
        Self {
            region,
            offsets,
            phase_times,
            worker_id,
        }
    }

    pub fn process_and_drop<C: ObjectClosure>(self, mut closure: C) {
        let sorted = {
            let _tracker = self.track(DrainPhase::GatherSort);
            self.join_and_sort()
        };

        {
            let _tracker = self.track(DrainPhase::Visit);
            for &offset in &sorted {
                closure.do_object(self.region.from_offset(offset));
            }
        }

        {
            let _tracker = self.track(DrainPhase::Reclaim);
            drop(sorted);
            self.offsets.drop_all();
        }
    }

    fn join_and_sort(&self) -> Vec<OffsetInRegion> {
        let expected = self.offsets.num_allocated_slots();
        let mut sorted = Vec::with_capacity(expected);
        self.offsets
            .for_each_segment(|segment, _length| segment.copy_to(&mut sorted));
        gc_assert!(
            sorted.len() == expected,
            "gathered {} offsets but {} were recorded",
            sorted.len(),
            expected
        );

        // Plain `Ord` on the unsigned offsets; no subtraction-based compare.
        sorted.sort_unstable();
        sorted
    }

    fn track(&self, phase: DrainPhase) -> PhaseTracker<'a> {
        PhaseTracker::new(self.phase_times, phase, self.worker_id)
    }
}
