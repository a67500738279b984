//! Sharded bitmap index over the whole IPv4 address space.
//!
//! # Architecture
//!
//! ```text
//! ShardedBitmapIndex
//! ┌──────────────────────────────────────────────────────────────┐
//! │ address >> 16 selects the shard, address & 0xffff the bit    │
//! └──────────────────────────────────────────────────────────────┘
//!          │
//! ┌────────┴────────┬────────────┬────────────┬─────────────┐
//! │                 │            │            │             │
//! Shard 0      Shard 1      Shard 2      ...          Shard 65535
//! ┌────────┐   ┌────────┐   ┌────────┐                ┌────────┐
//! │ RwLock │   │ RwLock │   │ RwLock │                │ RwLock │
//! │ live=0 │   │live=512│   │ live=0 │                │ live=1 │
//! │  None  │   │ 8 KiB ─┼─► │  None  │                │ 8 KiB  │
//! └────────┘   └────────┘   └────────┘                └────────┘
//! ```
//!
//! Each shard is a [`ShardBitmap`] behind its own `parking_lot::RwLock`, padded
//! to a cache line. A shard's word array exists only while it has live bits,
//! so an index holding a few small ranges costs a few 8 KiB blocks on top of
//! the fixed 4 MiB shard table.
//!
//! # Locking Protocol
//!
//! | Operation                 | Locks Acquired            | Lock Type |
//! |---------------------------|---------------------------|-----------|
//! | `contains()`              | Owning shard              | Read      |
//! | `contains_range()`        | Each shard, one at a time | Read      |
//! | `insert()` / `remove()`   | Each shard, one at a time | Write     |
//! | `cardinality()` / size    | Every shard, one at a time| Read      |
//! | `clear_all()`             | Every shard, one at a time| Write     |
//!
//! At most one shard lock is held at any moment and locks are never nested, so
//! no cross-shard deadlock is possible.
//!
//! ## No Cross-Shard Atomicity
//!
//! A range spanning several shards is applied as one locked step per shard.
//! A concurrent reader may observe the first shards updated and the rest not
//! yet, and an operation that fails part-way (lock timeout) leaves the shards
//! it already committed mutated. Aggregates (`cardinality`,
//! `approximate_byte_size`) are per-shard consistent sums, not snapshots.
//!
//! # Examples
//!
//! ```
//! use iplist::sync::ShardedBitmapIndex;
//! use std::net::Ipv4Addr;
//!
//! let index = ShardedBitmapIndex::new();
//! index.insert("10.0.0.0/24".parse().unwrap()).unwrap();
//!
//! assert!(index.contains(Ipv4Addr::new(10, 0, 0, 42)).unwrap());
//! assert!(!index.contains(Ipv4Addr::new(10, 0, 1, 0)).unwrap());
//! assert_eq!(index.cardinality().unwrap(), 256);
//! ```
//!
//! ## Concurrent Access
//!
//! ```
//! use iplist::sync::ShardedBitmapIndex;
//! use iplist::AddressRange;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let index = Arc::new(ShardedBitmapIndex::new());
//!
//! let handles: Vec<_> = (0..4u32)
//!     .map(|t| {
//!         let index = Arc::clone(&index);
//!         thread::spawn(move || {
//!             let base = t << 16;
//!             index.insert(AddressRange::new(base, base + 999).unwrap()).unwrap();
//!         })
//!     })
//!     .collect();
//!
//! for h in handles {
//!     h.join().unwrap();
//! }
//! assert_eq!(index.cardinality().unwrap(), 4000);
//! ```

use crate::builder::IndexConfig;
use crate::core::{
    offset_of, shard_of, AddressRange, AddressSet, Segment, ShardBitmap, SHARD_BITMAP_BYTES,
    SHARD_COUNT,
};
use crate::error::{IpListError, Result};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::fmt;
use std::mem::size_of;
use std::net::Ipv4Addr;

#[cfg(feature = "metrics")]
use std::sync::atomic::{AtomicU64, Ordering};

/// Cache-line size used to pad shards.
const CACHE_LINE_SIZE: usize = 64;

/// One shard: a bitmap and the lock that guards it.
///
/// Padded to a cache line so that threads working on neighbouring shards do
/// not contend on the same line.
#[repr(align(64))]
struct Shard {
    state: RwLock<ShardBitmap>,
}

const _: () = {
    assert!(size_of::<Shard>() == CACHE_LINE_SIZE, "Shard exceeds cache line size");
};

impl Shard {
    fn new() -> Self {
        Self {
            state: RwLock::new(ShardBitmap::new()),
        }
    }
}

/// Occupancy of one non-empty shard.
#[derive(Debug, Clone, PartialEq)]
pub struct ShardStats {
    /// Shard index (high 16 bits of its addresses).
    pub shard: u16,

    /// Number of member addresses in the shard.
    pub live: u32,

    /// `live / 65536`.
    pub fill_rate: f64,
}

/// Operation counters (feature-gated).
#[cfg(feature = "metrics")]
#[derive(Debug, Default)]
pub struct IndexMetrics {
    /// Calls to `insert`.
    pub inserts_total: AtomicU64,

    /// Calls to `remove`.
    pub removes_total: AtomicU64,

    /// Calls to `contains` and `contains_range`.
    pub queries_total: AtomicU64,

    /// Calls to `clear_all`.
    pub clears_total: AtomicU64,

    /// Shard bitmaps allocated (0 -> nonzero transitions).
    pub shard_allocations: AtomicU64,

    /// Shard bitmaps freed (nonzero -> 0 transitions).
    pub shard_frees: AtomicU64,

    /// Operations declined because a shard lock timed out.
    pub lock_timeouts: AtomicU64,
}

/// Concurrent membership set over all 2^32 IPv4 addresses.
///
/// All operations take `&self`; share the index with `Arc`. Range operations
/// lock one shard at a time and are not atomic across shards (see the module
/// documentation).
pub struct ShardedBitmapIndex {
    /// All 65536 shards, indexed by the high 16 bits of an address.
    shards: Box<[Shard]>,

    config: IndexConfig,

    #[cfg(feature = "metrics")]
    metrics: IndexMetrics,
}

impl ShardedBitmapIndex {
    /// Create an empty index that waits indefinitely for shard locks.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(IndexConfig::default())
    }

    /// Create an empty index with the given configuration.
    ///
    /// The configuration is not validated here; use
    /// [`crate::builder::IndexBuilder`] for that.
    #[must_use]
    pub fn with_config(config: IndexConfig) -> Self {
        let shards = (0..SHARD_COUNT)
            .map(|_| Shard::new())
            .collect::<Vec<_>>()
            .into_boxed_slice();

        #[cfg(feature = "trace")]
        tracing::debug!(?config, shards = SHARD_COUNT, "ShardedBitmapIndex::new");

        Self {
            shards,
            config,
            #[cfg(feature = "metrics")]
            metrics: IndexMetrics::default(),
        }
    }

    /// The configuration this index was built with.
    #[must_use]
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Number of shards (always 65536).
    #[must_use]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Whether `addr` is a member.
    ///
    /// # Errors
    ///
    /// [`IpListError::LockAcquisition`] if a lock timeout is configured and the
    /// shard stays write-locked for longer.
    pub fn contains(&self, addr: impl Into<u32>) -> Result<bool> {
        let addr = addr.into();

        #[cfg(feature = "metrics")]
        self.metrics.queries_total.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "trace")]
        tracing::trace!(addr = %Ipv4Addr::from(addr), "ShardedBitmapIndex::contains");

        let bitmap = self.read(usize::from(shard_of(addr)))?;
        Ok(bitmap.get(offset_of(addr)))
    }

    /// Whether every address of `range` is a member.
    ///
    /// Evaluated shard by shard; not atomic with respect to concurrent writers.
    ///
    /// # Errors
    ///
    /// [`IpListError::LockAcquisition`] on a lock timeout.
    pub fn contains_range(&self, range: AddressRange) -> Result<bool> {
        #[cfg(feature = "metrics")]
        self.metrics.queries_total.fetch_add(1, Ordering::Relaxed);

        for segment in range.segments() {
            let bitmap = self.read(usize::from(segment.shard))?;
            if bitmap.count_range(segment.low, segment.high) as usize != segment.len() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Number of members within `range`.
    ///
    /// # Errors
    ///
    /// [`IpListError::LockAcquisition`] on a lock timeout.
    pub fn count_range(&self, range: AddressRange) -> Result<u64> {
        let mut total = 0u64;
        for segment in range.segments() {
            let bitmap = self.read(usize::from(segment.shard))?;
            total += u64::from(bitmap.count_range(segment.low, segment.high));
        }
        Ok(total)
    }

    /// Add every address of `range`, returning how many were not yet members.
    ///
    /// # Errors
    ///
    /// [`IpListError::LockAcquisition`] on a lock timeout. Shards before the one
    /// that timed out keep their update.
    pub fn insert(&self, range: AddressRange) -> Result<u64> {
        #[cfg(feature = "metrics")]
        self.metrics.inserts_total.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "trace")]
        tracing::trace!(%range, "ShardedBitmapIndex::insert");

        let mut added = 0u64;
        for segment in range.segments() {
            added += u64::from(self.set_segment(segment)?);
        }
        Ok(added)
    }

    /// Remove every address of `range`, returning how many were members.
    ///
    /// A shard's bitmap is freed as soon as its last member is removed.
    ///
    /// # Errors
    ///
    /// [`IpListError::LockAcquisition`] on a lock timeout. Shards before the one
    /// that timed out keep their update.
    pub fn remove(&self, range: AddressRange) -> Result<u64> {
        #[cfg(feature = "metrics")]
        self.metrics.removes_total.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "trace")]
        tracing::trace!(%range, "ShardedBitmapIndex::remove");

        let mut removed = 0u64;
        for segment in range.segments() {
            removed += u64::from(self.clear_segment(segment)?);
        }
        Ok(removed)
    }

    /// Total number of members, summed shard by shard.
    ///
    /// # Errors
    ///
    /// [`IpListError::LockAcquisition`] on a lock timeout.
    pub fn cardinality(&self) -> Result<u64> {
        let mut total = 0u64;
        for idx in 0..self.shards.len() {
            total += u64::from(self.read(idx)?.live());
        }
        Ok(total)
    }

    /// Fixed shard-table overhead plus one full bitmap per non-empty shard.
    ///
    /// A shard is charged its whole 8 KiB bitmap as soon as it holds a single
    /// member.
    ///
    /// # Errors
    ///
    /// [`IpListError::LockAcquisition`] on a lock timeout.
    pub fn approximate_byte_size(&self) -> Result<u64> {
        let fixed = size_of::<Self>() + self.shards.len() * size_of::<Shard>();
        let allocated = self.allocated_shards()?;
        Ok(fixed as u64 + allocated as u64 * SHARD_BITMAP_BYTES as u64)
    }

    /// Number of shards currently holding a bitmap.
    ///
    /// # Errors
    ///
    /// [`IpListError::LockAcquisition`] on a lock timeout.
    pub fn allocated_shards(&self) -> Result<usize> {
        let mut allocated = 0;
        for idx in 0..self.shards.len() {
            if self.read(idx)?.live() > 0 {
                allocated += 1;
            }
        }
        Ok(allocated)
    }

    /// Remove every member, freeing all shard bitmaps.
    ///
    /// # Errors
    ///
    /// [`IpListError::LockAcquisition`] on a lock timeout. Shards before the one
    /// that timed out stay cleared.
    pub fn clear_all(&self) -> Result<()> {
        #[cfg(feature = "metrics")]
        self.metrics.clears_total.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "trace")]
        tracing::debug!("ShardedBitmapIndex::clear_all");

        for idx in 0..self.shards.len() {
            let mut bitmap = self.write(idx)?;
            if bitmap.live() > 0 {
                bitmap.release();
                self.on_shard_freed(idx);
            }
        }
        Ok(())
    }

    /// Whether the index has no members.
    ///
    /// # Errors
    ///
    /// [`IpListError::LockAcquisition`] on a lock timeout.
    pub fn is_empty(&self) -> Result<bool> {
        for idx in 0..self.shards.len() {
            if self.read(idx)?.live() > 0 {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Per-shard occupancy of every non-empty shard, in shard order.
    ///
    /// # Errors
    ///
    /// [`IpListError::LockAcquisition`] on a lock timeout.
    pub fn shard_stats(&self) -> Result<Vec<ShardStats>> {
        let mut stats = Vec::new();
        for idx in 0..self.shards.len() {
            let live = self.read(idx)?.live();
            if live > 0 {
                stats.push(ShardStats {
                    shard: idx as u16,
                    live,
                    fill_rate: f64::from(live) / crate::core::SHARD_BITS as f64,
                });
            }
        }
        Ok(stats)
    }

    /// Operation counters (requires the `metrics` feature).
    #[cfg(feature = "metrics")]
    #[must_use]
    pub fn metrics(&self) -> &IndexMetrics {
        &self.metrics
    }

    fn set_segment(&self, segment: Segment) -> Result<u32> {
        let idx = usize::from(segment.shard);
        let mut bitmap = self.write(idx)?;
        let was_allocated = bitmap.is_allocated();
        let added = bitmap.set_range(segment.low, segment.high);
        if !was_allocated {
            self.on_shard_allocated(idx);
        }
        Ok(added)
    }

    fn clear_segment(&self, segment: Segment) -> Result<u32> {
        let idx = usize::from(segment.shard);
        let mut bitmap = self.write(idx)?;
        let was_allocated = bitmap.is_allocated();
        let removed = bitmap.clear_range(segment.low, segment.high);
        if was_allocated && !bitmap.is_allocated() {
            self.on_shard_freed(idx);
        }
        Ok(removed)
    }

    fn read(&self, idx: usize) -> Result<RwLockReadGuard<'_, ShardBitmap>> {
        let lock = &self.shards[idx].state;
        match self.config.lock_timeout {
            None => Ok(lock.read()),
            Some(timeout) => lock
                .try_read_for(timeout)
                .ok_or_else(|| self.lock_timed_out(idx, timeout)),
        }
    }

    fn write(&self, idx: usize) -> Result<RwLockWriteGuard<'_, ShardBitmap>> {
        let lock = &self.shards[idx].state;
        match self.config.lock_timeout {
            None => Ok(lock.write()),
            Some(timeout) => lock
                .try_write_for(timeout)
                .ok_or_else(|| self.lock_timed_out(idx, timeout)),
        }
    }

    #[cold]
    fn lock_timed_out(&self, idx: usize, timeout: std::time::Duration) -> IpListError {
        #[cfg(feature = "metrics")]
        self.metrics.lock_timeouts.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "trace")]
        tracing::warn!(shard = idx, ?timeout, "shard lock acquisition timed out");

        IpListError::lock_acquisition(idx as u16, timeout)
    }

    #[inline]
    fn on_shard_allocated(&self, _idx: usize) {
        #[cfg(feature = "metrics")]
        self.metrics.shard_allocations.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "trace")]
        tracing::debug!(shard = _idx, "shard bitmap allocated");
    }

    #[inline]
    fn on_shard_freed(&self, _idx: usize) {
        #[cfg(feature = "metrics")]
        self.metrics.shard_frees.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "trace")]
        tracing::debug!(shard = _idx, "shard bitmap freed");
    }
}

impl Default for ShardedBitmapIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ShardedBitmapIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardedBitmapIndex")
            .field("shards", &self.shards.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AddressSet for ShardedBitmapIndex {
    fn contains(&self, addr: Ipv4Addr) -> Result<bool> {
        ShardedBitmapIndex::contains(self, addr)
    }

    fn insert(&self, range: AddressRange) -> Result<()> {
        ShardedBitmapIndex::insert(self, range).map(|_| ())
    }

    fn remove(&self, range: AddressRange) -> Result<()> {
        ShardedBitmapIndex::remove(self, range).map(|_| ())
    }

    fn cardinality(&self) -> Result<u64> {
        ShardedBitmapIndex::cardinality(self)
    }

    fn approximate_byte_size(&self) -> Result<u64> {
        ShardedBitmapIndex::approximate_byte_size(self)
    }

    fn clear_all(&self) -> Result<()> {
        ShardedBitmapIndex::clear_all(self)
    }

    fn is_empty(&self) -> Result<bool> {
        ShardedBitmapIndex::is_empty(self)
    }
}
