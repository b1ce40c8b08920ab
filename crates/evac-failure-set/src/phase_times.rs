//! Per-worker timing of the drain phases.
//!
//! The host collector injects a [`PhaseTimes`] implementation into every
//! drain. Each of the three phases is bracketed by a [`PhaseTracker`], which
//! reports the elapsed time under the draining worker's id when it is dropped.
//! Timing is purely observational; [`NoopPhaseTimes`] is always a valid
//! choice.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// The three phases of draining one region's set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DrainPhase {
    /// Copy every recorded offset into one buffer and sort it.
    GatherSort = 0,
    /// Hand each object to the repair closure in address order.
    Visit = 1,
    /// Free the sort buffer and return all segments to the pool.
    Reclaim = 2,
}

impl DrainPhase {
    /// All phases in execution order.
    pub const ALL: [Self; 3] = [Self::GatherSort, Self::Visit, Self::Reclaim];

    /// Short, stable name for logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::GatherSort => "gather_sort",
            Self::Visit => "visit",
            Self::Reclaim => "reclaim",
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

/// Receiver of drain phase timings.
pub trait PhaseTimes: Sync {
    /// Account `elapsed` to `phase` on worker `worker_id`.
    ///
    /// May be called several times for the same phase and worker; times
    /// accumulate.
    fn record_time(&self, phase: DrainPhase, worker_id: usize, elapsed: Duration);
}

/// A [`PhaseTimes`] that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPhaseTimes;

impl PhaseTimes for NoopPhaseTimes {
    #[inline]
    fn record_time(&self, _phase: DrainPhase, _worker_id: usize, _elapsed: Duration) {}
}

/// Brackets one phase of work and reports its duration on drop.
///
/// # Example
///
/// ```
/// use evac_failure_set::{DrainPhase, PhaseTracker, WorkerPhaseTimes};
///
/// let times = WorkerPhaseTimes::new(2);
/// {
///     let _tracker = PhaseTracker::new(&times, DrainPhase::Visit, 1);
///     // ... visit objects ...
/// }
/// assert_eq!(times.worker_time(DrainPhase::Visit, 0).as_nanos(), 0);
/// ```
pub struct PhaseTracker<'a> {
    times: &'a dyn PhaseTimes,
    phase: DrainPhase,
    worker_id: usize,
    start: Instant,
    #[cfg(feature = "tracing")]
    _span: ::tracing::span::EnteredSpan,
}

impl<'a> PhaseTracker<'a> {
    /// Start timing `phase` for `worker_id`.
    #[must_use]
    pub fn new(times: &'a dyn PhaseTimes, phase: DrainPhase, worker_id: usize) -> Self {
        Self {
            times,
            phase,
            worker_id,
            start: Instant::now(),
            #[cfg(feature = "tracing")]
            _span: crate::tracing::internal::trace_phase(phase, worker_id),
        }
    }

    /// The phase being timed.
    #[must_use]
    pub const fn phase(&self) -> DrainPhase {
        self.phase
    }
}

impl Drop for PhaseTracker<'_> {
    fn drop(&mut self) {
        self.times
            .record_time(self.phase, self.worker_id, self.start.elapsed());
    }
}

impl std::fmt::Debug for PhaseTracker<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseTracker")
            .field("phase", &self.phase)
            .field("worker_id", &self.worker_id)
            .field("start", &self.start)
            .finish_non_exhaustive()
    }
}

/// Accumulated drain phase times for a fixed set of workers.
///
/// Each worker writes only its own slots, so recording is a single relaxed
/// atomic add.
#[derive(Debug)]
pub struct WorkerPhaseTimes {
    nanos: Box<[[AtomicU64; 3]]>,
}

impl WorkerPhaseTimes {
    /// Create zeroed timings for workers `0..num_workers`.
    #[must_use]
    pub fn new(num_workers: usize) -> Self {
        Self {
            nanos: (0..num_workers)
                .map(|_| std::array::from_fn(|_| AtomicU64::new(0)))
                .collect(),
        }
    }

    /// Number of workers tracked.
    #[must_use]
    pub fn num_workers(&self) -> usize {
        self.nanos.len()
    }

    /// Time `worker_id` spent in `phase`.
    #[must_use]
    pub fn worker_time(&self, phase: DrainPhase, worker_id: usize) -> Duration {
        self.nanos.get(worker_id).map_or(Duration::ZERO, |slots| {
            Duration::from_nanos(slots[phase.index()].load(Ordering::Relaxed))
        })
    }

    /// Sum of `phase` times over all workers.
    #[must_use]
    pub fn phase_total(&self, phase: DrainPhase) -> Duration {
        (0..self.num_workers())
            .map(|worker| self.worker_time(phase, worker))
            .sum()
    }

    /// Longest `phase` time of any single worker.
    #[must_use]
    pub fn phase_max(&self, phase: DrainPhase) -> Duration {
        (0..self.num_workers())
            .map(|worker| self.worker_time(phase, worker))
            .max()
            .unwrap_or(Duration::ZERO)
    }

    /// Zero all timings, typically at the start of a pause.
    pub fn reset(&self) {
        for slots in &*self.nanos {
            for slot in slots {
                slot.store(0, Ordering::Relaxed);
            }
        }
    }
}

impl PhaseTimes for WorkerPhaseTimes {
    #[allow(clippy::cast_possible_truncation)]
    fn record_time(&self, phase: DrainPhase, worker_id: usize, elapsed: Duration) {
        gc_assert!(
            worker_id < self.num_workers(),
            "worker {} out of range for {} workers",
            worker_id,
            self.num_workers()
        );
        if let Some(slots) = self.nanos.get(worker_id) {
            slots[phase.index()].fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DrainPhase, NoopPhaseTimes, PhaseTimes, PhaseTracker, WorkerPhaseTimes};
    use std::time::Duration;

    #[test]
    fn test_phase_names() {
        let names: Vec<_> = DrainPhase::ALL.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["gather_sort", "visit", "reclaim"]);
    }

    #[test]
    fn test_worker_times_accumulate() {
        let times = WorkerPhaseTimes::new(3);
        times.record_time(DrainPhase::GatherSort, 1, Duration::from_micros(5));
        times.record_time(DrainPhase::GatherSort, 1, Duration::from_micros(7));
        times.record_time(DrainPhase::GatherSort, 2, Duration::from_micros(20));

        assert_eq!(
            times.worker_time(DrainPhase::GatherSort, 1),
            Duration::from_micros(12)
        );
        assert_eq!(times.worker_time(DrainPhase::GatherSort, 0), Duration::ZERO);
        assert_eq!(times.worker_time(DrainPhase::Visit, 1), Duration::ZERO);
        assert_eq!(
            times.phase_total(DrainPhase::GatherSort),
            Duration::from_micros(32)
        );
        assert_eq!(
            times.phase_max(DrainPhase::GatherSort),
            Duration::from_micros(20)
        );

        times.reset();
        assert_eq!(times.phase_total(DrainPhase::GatherSort), Duration::ZERO);
    }

    #[test]
    fn test_tracker_records_on_drop() {
        let times = WorkerPhaseTimes::new(1);
        {
            let tracker = PhaseTracker::new(&times, DrainPhase::Reclaim, 0);
            assert_eq!(tracker.phase(), DrainPhase::Reclaim);
            std::thread::sleep(Duration::from_millis(2));
        }
        assert!(times.worker_time(DrainPhase::Reclaim, 0) >= Duration::from_millis(2));
    }

    #[test]
    fn test_noop_phase_times() {
        let _tracker = PhaseTracker::new(&NoopPhaseTimes, DrainPhase::Visit, 99);
    }

    #[test]
    fn test_unknown_worker_reads_zero() {
        let times = WorkerPhaseTimes::new(1);
        assert_eq!(times.worker_time(DrainPhase::Visit, 7), Duration::ZERO);
    }
}
