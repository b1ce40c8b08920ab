//! Loom tests for segment publication and pool reuse.
//!
//! These tests exercise the interleavings of concurrent appenders racing to
//! install a new head segment, and of regions sharing one pool.

use std::sync::Arc;

use evac_failure_set::{SegmentPool, SegmentedOffsetArray};

/// Test that two appenders racing on a full segment both land their offset.
#[test]
#[ignore = "loom test - run with cargo test loom_segment_race --release"]
fn test_racing_appenders_lose_nothing() {
    loom::model(|| {
        let pool = Arc::new(SegmentPool::with_segment_length(1));
        let array = Arc::new(SegmentedOffsetArray::new(Arc::clone(&pool)));
        array.record(0);

        let a = loom::thread::spawn({
            let array = Arc::clone(&array);
            move || array.record(1)
        });
        let b = loom::thread::spawn({
            let array = Arc::clone(&array);
            move || array.record(2)
        });
        a.join().unwrap();
        b.join().unwrap();

        let mut all = Vec::new();
        array.for_each_segment(|segment, _| segment.copy_to(&mut all));
        all.sort_unstable();
        assert_eq!(all, vec![0, 1, 2]);
        assert_eq!(
            pool.stats().segments_in_use(),
            array.num_segments(),
            "losing racers return their segment"
        );
    });
}

/// Test that arrays on different threads share the pool without loss.
#[test]
#[ignore = "loom test - run with cargo test loom_segment_pool --release"]
fn test_shared_pool_acquire_release() {
    loom::model(|| {
        let pool = Arc::new(SegmentPool::with_segment_length(2));

        let handles: Vec<_> = (0..2u32)
            .map(|t| {
                let pool = Arc::clone(&pool);
                loom::thread::spawn(move || {
                    let mut array = SegmentedOffsetArray::new(pool);
                    for i in 0..3 {
                        array.record(t * 10 + i);
                    }
                    assert_eq!(array.num_allocated_slots(), 3);
                    array.drop_all();
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let stats = pool.stats();
        assert_eq!(stats.segments_in_use(), 0);
        assert!(stats.total_allocated <= 4);
    });
}
