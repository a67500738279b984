//! Inclusive IPv4 address ranges and their decomposition into shard segments.
//!
//! An address is a `u32`. Its high 16 bits select one of the 65536 shards and
//! its low 16 bits select a bit within that shard's bitmap:
//!
//! ```text
//!  31            16 15             0
//! ┌────────────────┬────────────────┐
//! │  shard index   │  shard offset  │
//! └────────────────┴────────────────┘
//! ```
//!
//! A range that crosses shard boundaries is split into [`Segment`]s, each lying
//! entirely inside one shard:
//!
//! ```text
//! (start, end) with shard(start) = a < shard(end) = b
//!
//!   a: [offset(start), 65535]
//!   a+1 .. b-1: [0, 65535]
//!   b: [0, offset(end)]
//! ```
//!
//! # Examples
//!
//! ```
//! use iplist::AddressRange;
//!
//! let range: AddressRange = "10.0.255.250-10.1.0.5".parse().unwrap();
//! let segments: Vec<_> = range.segments().collect();
//!
//! assert_eq!(segments.len(), 2);
//! assert_eq!((segments[0].low, segments[0].high), (65530, 65535));
//! assert_eq!((segments[1].low, segments[1].high), (0, 5));
//! ```

use crate::error::{IpListError, Result};
use std::fmt;
use std::iter::FusedIterator;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Number of shards covering the address space.
pub const SHARD_COUNT: usize = 1 << 16;

/// Number of addresses (bits) held by one shard.
pub const SHARD_BITS: usize = 1 << 16;

/// Highest bit offset inside a shard.
pub const SHARD_MAX_OFFSET: u16 = u16::MAX;

/// Shard index of an address (its high 16 bits).
#[inline(always)]
#[must_use]
pub const fn shard_of(addr: u32) -> u16 {
    (addr >> 16) as u16
}

/// Bit offset of an address within its shard (its low 16 bits).
#[inline(always)]
#[must_use]
pub const fn offset_of(addr: u32) -> u16 {
    (addr & 0xffff) as u16
}

/// An inclusive range of IPv4 addresses.
///
/// Invariant: `start <= end`. A single address has `start == end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressRange {
    start: u32,
    end: u32,
}

impl AddressRange {
    /// The whole IPv4 address space.
    pub const FULL: Self = Self {
        start: 0,
        end: u32::MAX,
    };

    /// Create a range from inclusive bounds.
    ///
    /// # Errors
    ///
    /// Returns [`IpListError::InvertedRange`] if `end < start`.
    pub fn new(start: impl Into<u32>, end: impl Into<u32>) -> Result<Self> {
        let (start, end) = (start.into(), end.into());
        if end < start {
            return Err(IpListError::inverted_range(start, end));
        }
        Ok(Self { start, end })
    }

    /// A range holding exactly one address.
    #[must_use]
    pub fn single(addr: impl Into<u32>) -> Self {
        let addr = addr.into();
        Self {
            start: addr,
            end: addr,
        }
    }

    /// The block `addr/prefix`.
    ///
    /// Host bits of `addr` are ignored. Accepts prefixes `0..=31`, the same
    /// bound as the key grammar.
    ///
    /// # Errors
    ///
    /// Returns [`IpListError::PrefixOutOfRange`] if `prefix > 31`.
    pub fn from_cidr(addr: impl Into<u32>, prefix: u32) -> Result<Self> {
        let addr = addr.into();
        if prefix > 31 {
            let key = format!("{}/{}", Ipv4Addr::from(addr), prefix);
            return Err(IpListError::prefix_out_of_range(key.as_bytes(), prefix));
        }
        Ok(Self::cidr_unchecked(addr, prefix))
    }

    /// `prefix` must be at most 31.
    pub(crate) const fn cidr_unchecked(addr: u32, prefix: u32) -> Self {
        let mask = if prefix == 0 {
            0
        } else {
            u32::MAX << (32 - prefix)
        };
        let network = addr & mask;
        Self {
            start: network,
            end: network | !mask,
        }
    }

    /// First address as an integer.
    #[inline]
    #[must_use]
    pub const fn start(&self) -> u32 {
        self.start
    }

    /// Last address as an integer.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> u32 {
        self.end
    }

    /// First address.
    #[must_use]
    pub fn first(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.start)
    }

    /// Last address.
    #[must_use]
    pub fn last(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.end)
    }

    /// Number of addresses in the range (at least 1, at most 2^32).
    #[inline]
    #[must_use]
    #[allow(clippy::len_without_is_empty)]
    pub const fn len(&self) -> u64 {
        (self.end - self.start) as u64 + 1
    }

    /// Whether the range holds a single address.
    #[inline]
    #[must_use]
    pub const fn is_single(&self) -> bool {
        self.start == self.end
    }

    /// Whether `addr` falls inside the range.
    #[inline]
    #[must_use]
    pub fn contains_addr(&self, addr: impl Into<u32>) -> bool {
        let addr = addr.into();
        self.start <= addr && addr <= self.end
    }

    /// Iterate over the single-shard segments covering this range, in
    /// ascending shard order.
    #[must_use]
    pub fn segments(&self) -> Segments {
        Segments {
            next_shard: shard_of(self.start) as u32,
            last_shard: shard_of(self.end) as u32,
            range: *self,
        }
    }
}

impl From<Ipv4Addr> for AddressRange {
    fn from(addr: Ipv4Addr) -> Self {
        Self::single(addr)
    }
}

impl FromStr for AddressRange {
    type Err = IpListError;

    fn from_str(s: &str) -> Result<Self> {
        super::parser::parse(s.as_bytes())
    }
}

impl fmt::Display for AddressRange {
    /// Canonical key form: `a.b.c.d` or `a.b.c.d-a.b.c.d`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single() {
            write!(f, "{}", self.first())
        } else {
            write!(f, "{}-{}", self.first(), self.last())
        }
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for AddressRange {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for AddressRange {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let text = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// A contiguous run of offsets `[low, high]` inside one shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Segment {
    /// Shard index (high 16 bits of every address in the segment).
    pub shard: u16,
    /// First offset, inclusive.
    pub low: u16,
    /// Last offset, inclusive.
    pub high: u16,
}

impl Segment {
    /// Number of offsets covered.
    #[inline]
    #[must_use]
    #[allow(clippy::len_without_is_empty)]
    pub const fn len(&self) -> usize {
        (self.high - self.low) as usize + 1
    }

    /// Whether the segment spans the whole shard.
    #[inline]
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.low == 0 && self.high == SHARD_MAX_OFFSET
    }
}

/// Iterator over the [`Segment`]s of an [`AddressRange`].
///
/// Created by [`AddressRange::segments`].
#[derive(Debug, Clone)]
pub struct Segments {
    // u32 so that stepping past shard 65535 cannot wrap.
    next_shard: u32,
    last_shard: u32,
    range: AddressRange,
}

impl Iterator for Segments {
    type Item = Segment;

    fn next(&mut self) -> Option<Segment> {
        if self.next_shard > self.last_shard {
            return None;
        }
        let shard = self.next_shard as u16;
        let low = if shard == shard_of(self.range.start) {
            offset_of(self.range.start)
        } else {
            0
        };
        let high = if shard == shard_of(self.range.end) {
            offset_of(self.range.end)
        } else {
            SHARD_MAX_OFFSET
        };
        self.next_shard += 1;
        Some(Segment { shard, low, high })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.last_shard + 1).saturating_sub(self.next_shard) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Segments {}

impl FusedIterator for Segments {}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(a: u8, b: u8, c: u8, d: u8) -> u32 {
        u32::from(Ipv4Addr::new(a, b, c, d))
    }

    #[test]
    fn test_shard_and_offset() {
        let addr = ip(10, 1, 2, 3);
        assert_eq!(shard_of(addr), 0x0a01);
        assert_eq!(offset_of(addr), 0x0203);
        assert_eq!(shard_of(u32::MAX), u16::MAX);
        assert_eq!(offset_of(u32::MAX), u16::MAX);
    }

    #[test]
    fn test_new_rejects_inverted() {
        assert!(AddressRange::new(5u32, 4u32).is_err());
        let range = AddressRange::new(4u32, 4u32).unwrap();
        assert!(range.is_single());
        assert_eq!(range.len(), 1);
    }

    #[test]
    fn test_from_cidr() {
        let range = AddressRange::from_cidr(Ipv4Addr::new(10, 0, 0, 77), 24).unwrap();
        assert_eq!(range.first(), Ipv4Addr::new(10, 0, 0, 0));
        assert_eq!(range.last(), Ipv4Addr::new(10, 0, 0, 255));

        let all = AddressRange::from_cidr(Ipv4Addr::new(1, 2, 3, 4), 0).unwrap();
        assert_eq!(all, AddressRange::FULL);
        assert_eq!(all.len(), 1u64 << 32);

        let pair = AddressRange::from_cidr(Ipv4Addr::new(1, 2, 3, 5), 31).unwrap();
        assert_eq!((pair.start(), pair.end()), (ip(1, 2, 3, 4), ip(1, 2, 3, 5)));

        assert!(AddressRange::from_cidr(Ipv4Addr::new(1, 2, 3, 4), 32).is_err());
    }

    #[test]
    fn test_contains_addr() {
        let range = AddressRange::new(ip(10, 0, 0, 0), ip(10, 0, 0, 5)).unwrap();
        assert!(range.contains_addr(Ipv4Addr::new(10, 0, 0, 0)));
        assert!(range.contains_addr(Ipv4Addr::new(10, 0, 0, 5)));
        assert!(!range.contains_addr(Ipv4Addr::new(10, 0, 0, 6)));
    }

    #[test]
    fn test_display() {
        assert_eq!(AddressRange::single(ip(10, 0, 0, 1)).to_string(), "10.0.0.1");
        let range = AddressRange::new(ip(10, 0, 0, 0), ip(10, 0, 0, 5)).unwrap();
        assert_eq!(range.to_string(), "10.0.0.0-10.0.0.5");
        assert_eq!(range.to_string().parse::<AddressRange>().unwrap(), range);
    }

    #[test]
    fn test_single_shard_segment() {
        let range = AddressRange::new(ip(10, 0, 0, 1), ip(10, 0, 3, 7)).unwrap();
        let segments: Vec<_> = range.segments().collect();
        assert_eq!(
            segments,
            vec![Segment {
                shard: 0x0a00,
                low: 1,
                high: 0x0307,
            }]
        );
    }

    #[test]
    fn test_multi_shard_segments() {
        let range = AddressRange::new(ip(10, 0, 255, 0), ip(10, 3, 0, 9)).unwrap();
        let segments: Vec<_> = range.segments().collect();
        assert_eq!(segments.len(), 4);
        assert_eq!(segments[0], Segment { shard: 0x0a00, low: 0xff00, high: 0xffff });
        assert!(segments[1].is_full());
        assert_eq!(segments[1].shard, 0x0a01);
        assert!(segments[2].is_full());
        assert_eq!(segments[2].shard, 0x0a02);
        assert_eq!(segments[3], Segment { shard: 0x0a03, low: 0, high: 9 });

        let total: u64 = segments.iter().map(|s| s.len() as u64).sum();
        assert_eq!(total, range.len());
    }

    #[test]
    fn test_full_space_segments() {
        let segments = AddressRange::FULL.segments();
        assert_eq!(segments.len(), SHARD_COUNT);
        let last = segments.last().unwrap();
        assert_eq!(last.shard, u16::MAX);
        assert!(last.is_full());
    }

    #[test]
    fn test_segments_top_of_space_terminates() {
        let range = AddressRange::single(u32::MAX);
        let mut segments = range.segments();
        assert_eq!(
            segments.next(),
            Some(Segment { shard: u16::MAX, low: u16::MAX, high: u16::MAX })
        );
        assert_eq!(segments.next(), None);
        assert_eq!(segments.next(), None);
    }
}
