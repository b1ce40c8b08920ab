//! Diagnostic tracing support.
//!
//! When the `tracing` feature is enabled, this module provides structured
//! spans for drain phases and debug events for segment pool activity.

#[cfg(feature = "tracing")]
pub mod internal {
    use ::tracing::{span, Level};

    use crate::phase_times::DrainPhase;

    /// Create a span for one drain phase on one worker.
    pub fn trace_phase(phase: DrainPhase, worker_id: usize) -> span::EnteredSpan {
        span!(
            Level::DEBUG,
            "evac_failure_drain_phase",
            phase = phase.name(),
            worker_id
        )
        .entered()
    }

    /// Log that the pool had to allocate a new segment.
    pub fn log_segment_allocated(segment_length: usize, total_allocated: usize) {
        ::tracing::debug!(segment_length, total_allocated, "segment_allocated");
    }

    /// Log that an appender lost the race to install a new head segment.
    pub fn log_segment_race_lost() {
        ::tracing::trace!("segment_race_lost");
    }

    /// Log idle segments freed by a purge.
    pub fn log_pool_purged(freed: usize, remaining: usize) {
        ::tracing::debug!(freed, remaining, "pool_purged");
    }

    /// Log the end of one region's drain.
    pub fn log_drain_complete(region_index: u32, objects: usize, segments: usize) {
        ::tracing::debug!(region_index, objects, segments, "drain_complete");
    }
}
