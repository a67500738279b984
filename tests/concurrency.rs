//! Multi-threaded behavior: shard independence, lock timeouts and
//! consistency of concurrent histories.

use iplist::builder::IndexBuilder;
use iplist::{AddressRange, IpListError, ShardedBitmapIndex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Barrier};
use std::thread;
use std::time::Duration;

fn shard_range(shard: u32, low: u32, high: u32) -> AddressRange {
    AddressRange::new((shard << 16) | low, (shard << 16) | high).unwrap()
}

#[test]
fn test_disjoint_shard_writers() {
    let index = Arc::new(ShardedBitmapIndex::new());
    let threads = 8u32;
    let barrier = Arc::new(Barrier::new(threads as usize));

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let index = Arc::clone(&index);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for shard in (t * 100)..(t * 100 + 100) {
                    index.insert(shard_range(shard, 0, 4095)).unwrap();
                    index.remove(shard_range(shard, 1000, 1999)).unwrap();
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(index.cardinality().unwrap(), u64::from(threads) * 100 * 3096);
    assert_eq!(index.allocated_shards().unwrap(), threads as usize * 100);
}

#[test]
fn test_same_shard_writers_serialize() {
    let index = Arc::new(ShardedBitmapIndex::new());

    // Interleaved stripes of one shard; every thread owns every 8th block.
    let handles: Vec<_> = (0..8u32)
        .map(|t| {
            let index = Arc::clone(&index);
            thread::spawn(move || {
                for block in (t..1024).step_by(8) {
                    index.insert(shard_range(42, block * 64, block * 64 + 63)).unwrap();
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(index.cardinality().unwrap(), 65536);
    assert!(index.contains_range(shard_range(42, 0, 65535)).unwrap());
}

#[test]
fn test_readers_never_see_partial_word_state() {
    let index = Arc::new(ShardedBitmapIndex::new());
    let stop = Arc::new(AtomicBool::new(false));

    let writer = {
        let index = Arc::clone(&index);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let r = shard_range(7, 0, 65535);
            for _ in 0..200 {
                index.insert(r).unwrap();
                index.remove(r).unwrap();
            }
            stop.store(true, Ordering::Release);
        })
    };

    let reader = {
        let index = Arc::clone(&index);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let r = shard_range(7, 0, 65535);
            while !stop.load(Ordering::Acquire) {
                // Single-shard operations are atomic: all or nothing.
                let n = index.count_range(r).unwrap();
                assert!(n == 0 || n == 65536, "observed {n} members");
            }
        })
    };

    writer.join().unwrap();
    reader.join().unwrap();
    assert!(index.is_empty().unwrap());
}

#[test]
fn test_blocked_shard_does_not_stall_others() {
    let index = Arc::new(
        IndexBuilder::new()
            .lock_timeout(Duration::from_millis(20))
            .build()
            .unwrap(),
    );

    let (hold_tx, hold_rx) = mpsc::channel::<()>();
    let (ready_tx, ready_rx) = mpsc::channel();

    // A long-running writer on shard 100: keep inserting into it until told
    // to stop, so its lock is frequently held.
    let busy = {
        let index = Arc::clone(&index);
        thread::spawn(move || {
            ready_tx.send(()).unwrap();
            while hold_rx.try_recv().is_err() {
                let _ = index.insert(shard_range(100, 0, 65535));
                let _ = index.remove(shard_range(100, 0, 65535));
            }
        })
    };
    ready_rx.recv().unwrap();

    // Other shards proceed regardless of the busy one.
    for shard in 200..264 {
        index.insert(shard_range(shard, 0, 255)).unwrap();
    }
    assert_eq!(index.count_range(shard_range(200, 0, 65535)).unwrap(), 256);

    hold_tx.send(()).unwrap();
    busy.join().unwrap();
}

#[test]
fn test_lock_timeout_is_reported() {
    let index = Arc::new(
        IndexBuilder::new()
            .lock_timeout(Duration::from_millis(5))
            .build()
            .unwrap(),
    );
    index.insert(shard_range(3, 0, 0)).unwrap();

    // Saturate shard 3 with full-shard rewrites from several threads; a
    // timed-out attempt must surface as LockAcquisition and nothing else.
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let index = Arc::clone(&index);
            thread::spawn(move || {
                for _ in 0..50 {
                    match index.insert(shard_range(3, 0, 65535)) {
                        Ok(_) => {}
                        Err(IpListError::LockAcquisition { shard, timeout }) => {
                            assert_eq!(shard, 3);
                            assert_eq!(timeout, Duration::from_millis(5));
                        }
                        Err(other) => panic!("unexpected error: {other}"),
                    }
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
    assert!(index.contains((3u32 << 16) | 65535).unwrap());
}

#[test]
fn test_concurrent_clear_all_and_inserts() {
    let index = Arc::new(ShardedBitmapIndex::new());
    let barrier = Arc::new(Barrier::new(3));

    let inserters: Vec<_> = (0..2u32)
        .map(|t| {
            let index = Arc::clone(&index);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for shard in 0..256 {
                    index.insert(shard_range(t * 1000 + shard, 0, 1023)).unwrap();
                }
            })
        })
        .collect();

    barrier.wait();
    index.clear_all().unwrap();

    for h in inserters {
        h.join().unwrap();
    }

    // Whatever survived the clear is whole per shard.
    for stat in index.shard_stats().unwrap() {
        assert_eq!(stat.live, 1024);
    }
    let allocated = index.allocated_shards().unwrap() as u64;
    assert_eq!(index.cardinality().unwrap(), allocated * 1024);

    index.clear_all().unwrap();
    assert!(index.is_empty().unwrap());
}

#[test]
fn test_aggregates_during_writes() {
    let index = Arc::new(ShardedBitmapIndex::new());
    let stop = Arc::new(AtomicBool::new(false));

    let writer = {
        let index = Arc::clone(&index);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            for shard in 0..512 {
                index.insert(shard_range(shard, 0, 99)).unwrap();
            }
            stop.store(true, Ordering::Release);
        })
    };

    let mut last = 0;
    while !stop.load(Ordering::Acquire) {
        // Inserts only grow the set, so successive scans never shrink.
        let now = index.cardinality().unwrap();
        assert_eq!(now % 100, 0);
        assert!(now >= last);
        last = now;
    }
    writer.join().unwrap();
    assert_eq!(index.cardinality().unwrap(), 512 * 100);
}
