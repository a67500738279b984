//! iplist: a concurrent in-memory IPv4 membership index.
//!
//! iplist stores an arbitrary subset of the 2^32 IPv4 addresses and answers
//! "is this address a member?" under heavy multi-threaded access. Addresses are
//! added and removed as single addresses, inclusive ranges, or CIDR blocks.
//!
//! # How It Works
//!
//! The address space is cut into 65536 shards by the high 16 bits of an
//! address. Each shard owns a 65536-bit bitmap that is allocated on its first
//! member and freed with its last, plus an exact count of its members and its
//! own reader/writer lock:
//!
//! ```text
//!   10.1.2.3  =  0x0a01_0203
//!                ──┬──  ──┬──
//!                shard   bit offset
//!               0x0a01   0x0203
//! ```
//!
//! Range operations are word-aligned, so inserting a `/16` touches 1024 words
//! rather than 65536 bits.
//!
//! # Quick Start
//!
//! ```
//! use iplist::{AddressRange, ShardedBitmapIndex};
//! use std::net::Ipv4Addr;
//!
//! let index = ShardedBitmapIndex::new();
//!
//! index.insert("192.168.0.0/16".parse()?)?;
//! index.insert("10.0.0.1".parse()?)?;
//! index.insert(AddressRange::new(Ipv4Addr::new(172, 16, 0, 0), Ipv4Addr::new(172, 16, 0, 9))?)?;
//!
//! assert!(index.contains(Ipv4Addr::new(192, 168, 10, 20))?);
//! assert!(!index.contains(Ipv4Addr::new(10, 0, 0, 2))?);
//! assert_eq!(index.cardinality()?, 65536 + 1 + 10);
//!
//! index.remove("192.168.0.0/17".parse()?)?;
//! assert_eq!(index.cardinality()?, 32768 + 1 + 10);
//! # Ok::<(), iplist::IpListError>(())
//! ```
//!
//! # Key Syntax
//!
//! | Form              | Example                 | Addresses            |
//! |-------------------|-------------------------|----------------------|
//! | single            | `10.0.0.1`              | 1                    |
//! | inclusive range   | `10.0.0.0-10.0.0.5`     | 6                    |
//! | CIDR, `/0`..`/31` | `10.0.0.0/24`           | `2^(32 - prefix)`    |
//!
//! `/32` is rejected; a single address is written without a prefix. See
//! [`crate::core::parser`] for the complete grammar.
//!
//! # Concurrency
//!
//! All operations take `&self`. Share an index with `Arc`:
//!
//! ```
//! use iplist::ShardedBitmapIndex;
//! use std::sync::Arc;
//!
//! let index = Arc::new(ShardedBitmapIndex::new());
//! let index_clone = Arc::clone(&index);
//! std::thread::spawn(move || {
//!     index_clone.insert("10.0.0.0/8".parse().unwrap()).unwrap();
//! })
//! .join()
//! .unwrap();
//!
//! assert_eq!(index.cardinality().unwrap(), 1 << 24);
//! ```
//!
//! Operations that span several shards lock them one after another and are not
//! atomic as a whole. See [`sync`] for the locking protocol.
//!
//! # Using the Builder
//!
//! ```
//! use iplist::builder::IndexBuilder;
//! use std::time::Duration;
//!
//! let index = IndexBuilder::new()
//!     .lock_timeout(Duration::from_millis(100))
//!     .build()
//!     .unwrap();
//! assert!(index.is_empty().unwrap());
//! ```
//!
//! # Features
//!
//! - `serde` - `Serialize`/`Deserialize` for [`AddressRange`] and
//!   [`builder::IndexConfig`]
//! - `trace` - `tracing` events for operations, shard allocation and lock timeouts
//! - `metrics` - per-index operation counters

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::len_without_is_empty)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc(html_root_url = "https://docs.rs/iplist/0.1.0")]

/// Address ranges, key parsing and the per-shard bitmap
pub mod core;

/// Error types and result aliases
pub mod error;

/// Bit-manipulation helpers
pub mod util;

/// The concurrent sharded index
pub mod sync;

/// Index configuration and builder
pub mod builder;

/// Byte-level facade for a host key-value engine
pub mod adapter;

pub use error::{IpListError, Result};

pub use crate::core::{parse, AddressRange, AddressSet, Segment};

pub use builder::{IndexBuilder, IndexConfig};

pub use sync::{ShardStats, ShardedBitmapIndex};

pub use adapter::KeyValueAdapter;

/// Prelude module for convenient imports.
///
/// # Examples
///
/// ```
/// use iplist::prelude::*;
///
/// let index = ShardedBitmapIndex::new();
/// AddressSet::insert(&index, "10.0.0.0/30".parse().unwrap()).unwrap();
/// assert_eq!(AddressSet::cardinality(&index).unwrap(), 4);
/// ```
pub mod prelude {
    pub use crate::adapter::KeyValueAdapter;
    pub use crate::builder::{IndexBuilder, IndexConfig};
    pub use crate::core::{AddressRange, AddressSet, Segment};
    pub use crate::error::{IpListError, Result};
    pub use crate::sync::{ShardStats, ShardedBitmapIndex};
}
