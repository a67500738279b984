//! Core types and algorithms.
//!
//! # Module Organization
//!
//! ```text
//! core/
//! ├── range.rs     - AddressRange, Segment, shard/offset decomposition
//! ├── parser.rs    - key text -> AddressRange
//! ├── bitmap.rs    - ShardBitmap: lazy 65536-bit bitmap, range set/clear
//! ├── set.rs       - AddressSet trait
//! └── mod.rs       - This file (public API)
//! ```
//!
//! Nothing in `core` locks. [`crate::sync::ShardedBitmapIndex`] owns one
//! [`ShardBitmap`] per shard behind a reader/writer lock and drives the range
//! algorithms segment by segment.
//!
//! # Examples
//!
//! ```
//! use iplist::core::{parse, ShardBitmap};
//!
//! let range = parse(b"10.0.0.0/26").unwrap();
//! let mut bitmap = ShardBitmap::new();
//! for segment in range.segments() {
//!     bitmap.set_range(segment.low, segment.high);
//! }
//! assert_eq!(bitmap.live(), 64);
//! ```

pub mod bitmap;
pub mod parser;
pub mod range;
pub mod set;

pub use bitmap::{ShardBitmap, SHARD_BITMAP_BYTES, WORDS_PER_SHARD};
pub use parser::parse;
pub use range::{offset_of, shard_of, AddressRange, Segment, Segments, SHARD_BITS, SHARD_COUNT};
pub use set::AddressSet;
