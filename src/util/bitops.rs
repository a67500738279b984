//! Bit manipulation helpers for shard bitmaps.
//!
//! Shard bitmaps are arrays of `u64` words with bits packed little-endian:
//!
//! ```text
//! Word 0: [bit 0][bit 1]...[bit 63]
//! Word 1: [bit 64][bit 65]...[bit 127]
//! ```
//!
//! All helpers here are `const fn` and compile to a handful of instructions.
//! The range algorithms in [`crate::core::bitmap`] are written in terms of them.

#![allow(clippy::cast_possible_truncation)]

/// Number of bits in one bitmap word.
pub const WORD_BITS: usize = u64::BITS as usize;

/// A word with every bit set.
pub const FULL_WORD: u64 = u64::MAX;

/// Get the index of the word containing the given bit.
///
/// # Examples
///
/// ```
/// use iplist::util::bitops::word_index;
///
/// assert_eq!(word_index(0), 0);
/// assert_eq!(word_index(63), 0);
/// assert_eq!(word_index(64), 1);
/// assert_eq!(word_index(65535), 1023);
/// ```
#[inline(always)]
#[must_use]
pub const fn word_index(bit_index: usize) -> usize {
    bit_index >> 6
}

/// Get the bit offset within a word for the given bit index.
///
/// # Examples
///
/// ```
/// use iplist::util::bitops::bit_offset;
///
/// assert_eq!(bit_offset(0), 0);
/// assert_eq!(bit_offset(63), 63);
/// assert_eq!(bit_offset(64), 0);
/// assert_eq!(bit_offset(65), 1);
/// ```
#[inline(always)]
#[must_use]
pub const fn bit_offset(bit_index: usize) -> usize {
    bit_index & (WORD_BITS - 1)
}

/// Create a mask with only the bit for `bit_index` set in its word.
///
/// # Examples
///
/// ```
/// use iplist::util::bitops::bit_mask;
///
/// assert_eq!(bit_mask(0), 0b1);
/// assert_eq!(bit_mask(2), 0b100);
/// assert_eq!(bit_mask(64), 0b1);
/// assert_eq!(bit_mask(127), 1u64 << 63);
/// ```
#[inline(always)]
#[must_use]
pub const fn bit_mask(bit_index: usize) -> u64 {
    1u64 << bit_offset(bit_index)
}

/// Round a bit index up to the next word boundary (identity if aligned).
///
/// # Examples
///
/// ```
/// use iplist::util::bitops::align_up;
///
/// assert_eq!(align_up(0), 0);
/// assert_eq!(align_up(1), 64);
/// assert_eq!(align_up(64), 64);
/// assert_eq!(align_up(65), 128);
/// ```
#[inline(always)]
#[must_use]
pub const fn align_up(bit_index: usize) -> usize {
    (bit_index + WORD_BITS - 1) & !(WORD_BITS - 1)
}

/// Round a bit index down to the word boundary at or below it.
///
/// # Examples
///
/// ```
/// use iplist::util::bitops::align_down;
///
/// assert_eq!(align_down(63), 0);
/// assert_eq!(align_down(64), 64);
/// assert_eq!(align_down(130), 128);
/// ```
#[inline(always)]
#[must_use]
pub const fn align_down(bit_index: usize) -> usize {
    bit_index & !(WORD_BITS - 1)
}

/// Mask covering bit offsets `[from, to)` of a single word.
///
/// Requires `from < to <= 64`.
///
/// # Examples
///
/// ```
/// use iplist::util::bitops::span_mask;
///
/// assert_eq!(span_mask(0, 4), 0b1111);
/// assert_eq!(span_mask(60, 64), 0xF000_0000_0000_0000);
/// assert_eq!(span_mask(0, 64), u64::MAX);
/// ```
#[inline]
#[must_use]
pub const fn span_mask(from: usize, to: usize) -> u64 {
    debug_assert!(from < to && to <= WORD_BITS);
    let width = to - from;
    let low = if width == WORD_BITS {
        FULL_WORD
    } else {
        (1u64 << width) - 1
    };
    low << from
}

/// Count the total number of set bits in a slice of words.
///
/// # Examples
///
/// ```
/// use iplist::util::bitops::count_ones_slice;
///
/// assert_eq!(count_ones_slice(&[0b1010, 0b1111, 0b0001]), 7);
/// assert_eq!(count_ones_slice(&[]), 0);
/// ```
#[inline]
#[must_use]
pub fn count_ones_slice(words: &[u64]) -> usize {
    words.iter().map(|&w| w.count_ones() as usize).sum()
}
