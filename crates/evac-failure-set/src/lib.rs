//! Per-region bookkeeping for objects that failed evacuation.
//!
//! When a copying collector runs out of destination space during a pause, the
//! objects it could not move stay in place with a self-forwarding marker in
//! their header. `evac-failure-set` records those objects cheaply while the
//! pause is running, and later hands every recorded object back to the
//! collector exactly once per recording, in ascending address order, so the
//! marker can be removed.
//!
//! # Layout
//!
//! - **Offsets, not addresses**: an object is stored as a `u32` word offset
//!   from the bottom of its region ([`RegionDescriptor`]).
//! - **Segmented storage**: offsets are appended to a chain of fixed-size
//!   segments ([`SegmentedOffsetArray`]); appending never moves existing data
//!   and is lock free.
//! - **Shared segment pool**: segments come from, and go back to, a
//!   [`SegmentPool`] shared by every region and reused across collections.
//! - **Three-phase drain**: [`EvacFailureObjectSet::process_and_drop`] gathers
//!   and sorts the offsets, visits each object, then returns all segments to
//!   the pool.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use evac_failure_set::{
//!     safepoint, Address, EvacFailureObjectSet, NoopPhaseTimes, RegionDescriptor, SegmentPool,
//!     HEAP_WORD_SIZE,
//! };
//!
//! let pool = Arc::new(SegmentPool::default());
//! let region = RegionDescriptor::new(0, Address::new(0x10_0000), 4096);
//! let mut set = EvacFailureObjectSet::new(region, Arc::clone(&pool));
//!
//! set.record(region.bottom().offset_words(3));
//! set.record(region.bottom().offset_words(1));
//! assert_eq!(set.num_evac_failure_objects(), 2);
//!
//! let _safepoint = safepoint::enter();
//! let mut visited = Vec::new();
//! set.process_and_drop(|obj: Address| visited.push(obj), &NoopPhaseTimes, 0);
//!
//! assert_eq!(visited[0].as_usize() + 2 * HEAP_WORD_SIZE, visited[1].as_usize());
//! assert!(set.is_empty());
//! ```
//!
//! # Thread Safety
//!
//! Recording goes through `&self` and is safe from many threads at once.
//! Draining takes `&mut self`, so it can never overlap a `record()` on the
//! same set. The [`SegmentPool`] is the only state shared between regions.

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

#[macro_use]
mod verify;

mod address;
mod drain;
mod object_set;
mod phase_times;
mod pool;
mod region;
mod segment;
mod segmented_array;
mod tracing;

/// Safepoint bookkeeping used to validate drain preconditions.
pub mod safepoint;

// Re-export public API
pub use address::{Address, HEAP_WORD_SIZE, LOG_HEAP_WORD_SIZE};
pub use object_set::{EvacFailureObjectSet, ObjectClosure};
pub use phase_times::{DrainPhase, NoopPhaseTimes, PhaseTimes, PhaseTracker, WorkerPhaseTimes};
pub use pool::{
    SegmentPool, SegmentPoolConfig, SegmentPoolStats, DEFAULT_SEGMENT_LENGTH, MAX_SEGMENT_LENGTH,
};
pub use region::{OffsetInRegion, RegionDescriptor, MAX_GRAIN_BYTES, MAX_GRAIN_WORDS};
pub use segment::Segment;
pub use segmented_array::SegmentedOffsetArray;
pub use verify::VERIFY_ENABLED;
