//! Internal utility functions and helpers.
//!
//! # Modules
//!
//! - [`bitops`] - Word-level bit manipulation for shard bitmaps

pub mod bitops;

pub use bitops::{align_down, align_up, bit_mask, word_index, WORD_BITS};
