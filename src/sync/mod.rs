//! Concurrent, shard-locked address index.
//!
//! # Module Organization
//!
//! - [`ShardedBitmapIndex`] - 65536 independently locked shard bitmaps
//! - [`ShardStats`] - per-shard occupancy snapshot
//!
//! # Concurrency Model
//!
//! Every shard has its own `parking_lot::RwLock`. Queries take read locks,
//! mutations take write locks, one shard at a time. There is no global lock,
//! so threads working on different `/16` blocks never wait for each other.
//!
//! By default a lock is waited for indefinitely. A lock timeout can be set via
//! [`crate::builder::IndexBuilder::lock_timeout`], in which case an operation
//! that cannot get a shard lock in time returns
//! [`crate::IpListError::LockAcquisition`].
//!
//! # Examples
//!
//! ```
//! use iplist::sync::ShardedBitmapIndex;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let index = Arc::new(ShardedBitmapIndex::new());
//!
//! let writer = {
//!     let index = Arc::clone(&index);
//!     thread::spawn(move || {
//!         index.insert("172.16.0.0/12".parse().unwrap()).unwrap();
//!     })
//! };
//! writer.join().unwrap();
//!
//! assert_eq!(index.cardinality().unwrap(), 1 << 20);
//!
//! index.clear_all().unwrap();
//! assert!(index.is_empty().unwrap());
//! ```

mod sharded;

pub use sharded::{ShardStats, ShardedBitmapIndex};

#[cfg(feature = "metrics")]
pub use sharded::IndexMetrics;
