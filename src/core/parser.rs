//! Key parser: turns `a.b.c.d`, `a.b.c.d-a.b.c.d` and `a.b.c.d/p` into an
//! [`AddressRange`].
//!
//! The scan is a single left-to-right pass over the raw bytes. Octets
//! accumulate decimally and are bounds-checked only when consumed (on `.`,
//! `-`, `/` or end of input), so `"2555.0.0.1"` fails with the full
//! accumulated value `2555` rather than at the fourth digit.
//!
//! CIDR prefixes are accepted in `[0, 31]`. A `/32` block is rejected: write
//! the bare address instead.
//!
//! ```
//! use iplist::core::parser::parse;
//!
//! let range = parse(b"192.168.1.0/24").unwrap();
//! assert_eq!(range.len(), 256);
//!
//! assert!(parse(b"192.168.1.0/32").is_err());
//! assert!(parse(b"192.168.1.9-192.168.1.1").is_err());
//! ```

use super::range::AddressRange;
use crate::error::{IpListError, Result};

/// Which address of an explicit range is being scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Start,
    End,
}

/// Accumulator for one dotted-quad address.
#[derive(Debug, Default)]
struct Quad {
    addr: u32,
    octet: u32,
    /// Octets already shifted into `addr`.
    done: u32,
    /// Digits seen for the current octet.
    digits: u32,
}

impl Quad {
    #[inline]
    fn push_digit(&mut self, digit: u8) {
        self.octet = self
            .octet
            .saturating_mul(10)
            .saturating_add(u32::from(digit - b'0'));
        self.digits += 1;
    }

    /// Consume the current octet on a `.` separator.
    fn next_octet(&mut self, key: &[u8], pos: usize) -> Result<()> {
        self.check_octet(key, pos)?;
        if self.done == 3 {
            return Err(IpListError::malformed_key(key, pos, "more than four octets"));
        }
        self.addr = (self.addr << 8) | self.octet;
        self.octet = 0;
        self.digits = 0;
        self.done += 1;
        Ok(())
    }

    /// Consume the fourth octet and return the completed address.
    fn finish(&mut self, key: &[u8], pos: usize) -> Result<u32> {
        self.check_octet(key, pos)?;
        if self.done != 3 {
            return Err(IpListError::malformed_key(key, pos, "expected four octets"));
        }
        Ok((self.addr << 8) | self.octet)
    }

    fn check_octet(&self, key: &[u8], pos: usize) -> Result<()> {
        if self.digits == 0 {
            return Err(IpListError::malformed_key(key, pos, "empty octet"));
        }
        if self.octet >= 256 {
            return Err(IpListError::octet_out_of_range(key, self.octet));
        }
        Ok(())
    }
}

/// Parse a key into an inclusive address range.
///
/// # Errors
///
/// - [`IpListError::EmptyKey`] for an empty key
/// - [`IpListError::MalformedKey`] for any unexpected byte or missing component
/// - [`IpListError::OctetOutOfRange`] if an octet reaches 256
/// - [`IpListError::PrefixOutOfRange`] if a CIDR prefix exceeds 31
/// - [`IpListError::InvertedRange`] if an explicit range ends before it starts
///
/// # Examples
///
/// ```
/// use iplist::core::parser::parse;
/// use std::net::Ipv4Addr;
///
/// let range = parse(b"10.0.0.0-10.0.0.5").unwrap();
/// assert_eq!(range.first(), Ipv4Addr::new(10, 0, 0, 0));
/// assert_eq!(range.last(), Ipv4Addr::new(10, 0, 0, 5));
/// ```
pub fn parse(key: &[u8]) -> Result<AddressRange> {
    if key.is_empty() {
        return Err(IpListError::EmptyKey);
    }

    let mut quad = Quad::default();
    let mut side = Side::Start;
    let mut start = 0u32;

    for (pos, &byte) in key.iter().enumerate() {
        match byte {
            b'0'..=b'9' => quad.push_digit(byte),
            b'.' => quad.next_octet(key, pos)?,
            b'-' if side == Side::Start => {
                start = quad.finish(key, pos)?;
                quad = Quad::default();
                side = Side::End;
            }
            b'/' if side == Side::Start => {
                let addr = quad.finish(key, pos)?;
                let prefix = parse_prefix(key, pos + 1)?;
                return Ok(AddressRange::cidr_unchecked(addr, prefix));
            }
            _ => return Err(IpListError::malformed_key(key, pos, "unexpected byte")),
        }
    }

    let last = quad.finish(key, key.len())?;
    match side {
        Side::Start => Ok(AddressRange::single(last)),
        Side::End => AddressRange::new(start, last),
    }
}

/// Parse the decimal prefix that follows `/`, running to end of input.
fn parse_prefix(key: &[u8], from: usize) -> Result<u32> {
    let digits = &key[from..];
    if digits.is_empty() {
        return Err(IpListError::malformed_key(key, from, "empty prefix"));
    }

    let mut prefix = 0u32;
    for (i, &byte) in digits.iter().enumerate() {
        if !byte.is_ascii_digit() {
            return Err(IpListError::malformed_key(key, from + i, "non-digit in prefix"));
        }
        prefix = prefix
            .saturating_mul(10)
            .saturating_add(u32::from(byte - b'0'));
    }

    if prefix > 31 {
        return Err(IpListError::prefix_out_of_range(key, prefix));
    }
    Ok(prefix)
}
