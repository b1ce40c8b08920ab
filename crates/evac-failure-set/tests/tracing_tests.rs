//! Integration tests for the tracing feature.
//!
//! These tests verify that drains and pool activity run correctly with a
//! subscriber installed.

#![cfg(feature = "tracing")]

use std::sync::Arc;

use evac_failure_set::{
    safepoint, Address, EvacFailureObjectSet, RegionDescriptor, SegmentPool, WorkerPhaseTimes,
};

fn init_subscriber() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

#[test]
fn test_drain_with_tracing() {
    init_subscriber();

    let pool = Arc::new(SegmentPool::with_segment_length(4));
    let region = RegionDescriptor::new(9, Address::new(0x2000), 512);
    let mut set = EvacFailureObjectSet::new(region, Arc::clone(&pool));
    for word in [30, 10, 20, 0, 500] {
        set.record(region.bottom().offset_words(word));
    }

    let times = WorkerPhaseTimes::new(1);
    let _safepoint = safepoint::enter();
    let mut visited = Vec::new();
    set.process_and_drop(|obj: Address| visited.push(obj), &times, 0);

    assert_eq!(visited.len(), 5);
    assert!(visited.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_purge_with_tracing() {
    init_subscriber();

    let pool = SegmentPool::with_segment_length(4);
    let segments: Vec<_> = (0..3).map(|_| pool.acquire()).collect();
    for segment in segments {
        pool.release(segment);
    }
    assert_eq!(pool.purge(1), 2);
}
