//! Per-shard bitmap with exact live-bit accounting.
//!
//! A [`ShardBitmap`] covers the 65536 offsets of one shard. Its word array is
//! allocated lazily on the first bit set and freed the moment the last bit is
//! cleared, so the invariant
//!
//! ```text
//! words.is_some()  <=>  live > 0
//! ```
//!
//! holds between any two operations. `live` is an exact count of set bits.
//!
//! # Range Algorithms
//!
//! [`ShardBitmap::set_range`] and [`ShardBitmap::clear_range`] avoid a loop over
//! every bit of a long run by splitting `[s, e]` into three zones:
//!
//! ```text
//!        s         h                              l       e
//!        │ leading │      interior (full words)   │ trail │
//! ───────┼─────────┼──────┬──────┬──────┬────────┼───────┼──────
//!        word s/64   word   word   word   ...     word l/64
//! ```
//!
//! - **leading** `[s, h)` with `h = align_up(s)`: one masked word operation
//! - **interior** `[h, l)` with `l = align_down(e + 1)`: whole-word assignment
//!   when the word is known empty (set) or known full (clear), exact popcount
//!   accounting otherwise
//! - **trailing** `[l, e]`: bit by bit
//!
//! Runs shorter than one word are handled bit by bit. Every path counts only
//! bits that actually change state, so the result matches a naive per-bit loop
//! exactly.
//!
//! Clearing stops as soon as `live` reaches zero: an exact count of zero proves
//! nothing is left to clear, and the word array is freed at that point.
//!
//! # Examples
//!
//! ```
//! use iplist::core::bitmap::ShardBitmap;
//!
//! let mut bitmap = ShardBitmap::new();
//! assert!(!bitmap.is_allocated());
//!
//! assert_eq!(bitmap.set_range(10, 1000), 991);
//! assert_eq!(bitmap.set_range(0, 20), 10);
//! assert_eq!(bitmap.live(), 1001);
//!
//! assert_eq!(bitmap.clear_range(0, 1000), 1001);
//! assert!(!bitmap.is_allocated());
//! ```

use super::range::SHARD_BITS;
use crate::error::fatal;
use crate::util::bitops::{
    align_down, align_up, bit_mask, bit_offset, count_ones_slice, span_mask, word_index,
    FULL_WORD, WORD_BITS,
};
use std::fmt;

/// Words in one shard's bitmap.
pub const WORDS_PER_SHARD: usize = SHARD_BITS / WORD_BITS;

/// Heap bytes held by one allocated shard bitmap.
pub const SHARD_BITMAP_BYTES: usize = WORDS_PER_SHARD * std::mem::size_of::<u64>();

/// Lazily allocated 65536-bit bitmap plus its live-bit counter.
///
/// Not synchronized; the owning shard's lock serializes access.
#[derive(Default)]
pub struct ShardBitmap {
    words: Option<Box<[u64]>>,
    live: u32,
}

impl ShardBitmap {
    /// An empty, unallocated bitmap.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            words: None,
            live: 0,
        }
    }

    /// Number of set bits.
    #[inline]
    #[must_use]
    pub const fn live(&self) -> u32 {
        self.live
    }

    /// Whether the word array is currently allocated.
    #[inline]
    #[must_use]
    pub const fn is_allocated(&self) -> bool {
        self.words.is_some()
    }

    /// Raw words, if allocated.
    #[must_use]
    pub fn words(&self) -> Option<&[u64]> {
        self.words.as_deref()
    }

    /// Heap bytes currently held.
    #[must_use]
    pub const fn heap_bytes(&self) -> usize {
        if self.words.is_some() {
            SHARD_BITMAP_BYTES
        } else {
            0
        }
    }

    /// Test a single offset.
    #[inline]
    #[must_use]
    pub fn get(&self, offset: u16) -> bool {
        let bit = usize::from(offset);
        match &self.words {
            Some(words) => words[word_index(bit)] & bit_mask(bit) != 0,
            None => false,
        }
    }

    /// Number of set offsets in `[low, high]`.
    ///
    /// # Panics
    ///
    /// Panics if `low > high`.
    #[must_use]
    pub fn count_range(&self, low: u16, high: u16) -> u32 {
        assert!(low <= high, "count_range: low {} > high {}", low, high);
        let Some(words) = self.words.as_deref() else {
            return 0;
        };

        let (s, e) = (usize::from(low), usize::from(high));
        let (first, last) = (word_index(s), word_index(e));
        if first == last {
            return (words[first] & span_mask(bit_offset(s), bit_offset(e) + 1)).count_ones();
        }

        let leading = words[first] & span_mask(bit_offset(s), WORD_BITS);
        let trailing = words[last] & span_mask(0, bit_offset(e) + 1);
        leading.count_ones()
            + count_ones_slice(&words[first + 1..last]) as u32
            + trailing.count_ones()
    }

    /// Set every offset in `[low, high]`, returning how many bits changed.
    ///
    /// Allocates the word array if this is the first bit set in the shard.
    ///
    /// # Panics
    ///
    /// Panics if `low > high`, or if the counter is found positive without a
    /// word array.
    pub fn set_range(&mut self, low: u16, high: u16) -> u32 {
        assert!(low <= high, "set_range: low {} > high {}", low, high);
        if self.words.is_none() && self.live != 0 {
            fatal(None, format!("live count {} without a bitmap", self.live));
        }

        let (s, e) = (usize::from(low), usize::from(high));
        let before = self.live;
        let words = self
            .words
            .get_or_insert_with(|| vec![0u64; WORDS_PER_SHARD].into_boxed_slice());
        let live = &mut self.live;

        if e - s < WORD_BITS {
            for bit in s..=e {
                *live += set_masked(&mut words[word_index(bit)], bit_mask(bit));
            }
            return *live - before;
        }

        let h = align_up(s);
        let l = align_down(e + 1);

        if s < h {
            let word = &mut words[word_index(s)];
            let mask = span_mask(bit_offset(s), WORD_BITS);
            if *word & mask == 0 {
                *word |= mask;
                *live += (h - s) as u32;
            } else {
                *live += set_masked(word, mask);
            }
        }

        for word in &mut words[word_index(h)..word_index(l)] {
            if *word == 0 {
                *word = FULL_WORD;
                *live += WORD_BITS as u32;
            } else {
                *live += set_masked(word, FULL_WORD);
            }
        }

        for bit in l..=e {
            *live += set_masked(&mut words[word_index(bit)], bit_mask(bit));
        }

        *live - before
    }

    /// Clear every offset in `[low, high]`, returning how many bits changed.
    ///
    /// Frees the word array as soon as the live count reaches zero.
    ///
    /// # Panics
    ///
    /// Panics if `low > high`, or if the live count would underflow.
    pub fn clear_range(&mut self, low: u16, high: u16) -> u32 {
        assert!(low <= high, "clear_range: low {} > high {}", low, high);
        let before = self.live;
        let Some(words) = self.words.as_deref_mut() else {
            if self.live != 0 {
                fatal(None, format!("live count {} without a bitmap", self.live));
            }
            return 0;
        };

        clear_zones(words, &mut self.live, usize::from(low), usize::from(high));

        if self.live == 0 {
            self.words = None;
        }
        before - self.live
    }

    /// Drop the word array and zero the counter, returning the bits released.
    pub fn release(&mut self) -> u32 {
        self.words = None;
        std::mem::take(&mut self.live)
    }

    /// Recount set bits and check them against the live counter.
    ///
    /// # Panics
    ///
    /// Panics if the counter and the word array disagree.
    pub fn assert_consistent(&self) {
        match &self.words {
            Some(words) => {
                let counted = count_ones_slice(words);
                if self.live == 0 || counted != self.live as usize {
                    fatal(
                        None,
                        format!("live count {} but {} bits set", self.live, counted),
                    );
                }
            }
            None if self.live != 0 => {
                fatal(None, format!("live count {} without a bitmap", self.live));
            }
            None => {}
        }
    }
}

impl fmt::Debug for ShardBitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardBitmap")
            .field("allocated", &self.is_allocated())
            .field("live", &self.live)
            .finish()
    }
}

/// OR `mask` into `word`, returning the number of bits that went 0 -> 1.
#[inline]
fn set_masked(word: &mut u64, mask: u64) -> u32 {
    let fresh = mask & !*word;
    *word |= mask;
    fresh.count_ones()
}

/// Clear `mask` in `word`, decrementing `live` by the bits that went 1 -> 0.
///
/// Returns `true` once `live` has reached zero.
#[inline]
fn clear_masked(word: &mut u64, mask: u64, live: &mut u32) -> bool {
    let present = *word & mask;
    if present == 0 {
        return false;
    }
    *word &= !mask;
    let cleared = present.count_ones();
    let left = match live.checked_sub(cleared) {
        Some(left) => left,
        None => fatal(
            None,
            format!("clearing {} bits would underflow live count {}", cleared, live),
        ),
    };
    *live = left;
    *live == 0
}

/// Zone-split clear over `[s, e]`; returns early once `live` hits zero.
fn clear_zones(words: &mut [u64], live: &mut u32, s: usize, e: usize) {
    if e - s < WORD_BITS {
        for bit in s..=e {
            if clear_masked(&mut words[word_index(bit)], bit_mask(bit), live) {
                return;
            }
        }
        return;
    }

    let h = align_up(s);
    let l = align_down(e + 1);

    if s < h {
        let mask = span_mask(bit_offset(s), WORD_BITS);
        if clear_masked(&mut words[word_index(s)], mask, live) {
            return;
        }
    }

    for word in &mut words[word_index(h)..word_index(l)] {
        if clear_masked(word, FULL_WORD, live) {
            return;
        }
    }

    for bit in l..=e {
        if clear_masked(&mut words[word_index(bit)], bit_mask(bit), live) {
            return;
        }
    }
}
