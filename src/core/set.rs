//! The operation set shared by concurrent address sets.
//!
//! All methods take `&self`: implementors synchronize internally, so an
//! `Arc<impl AddressSet>` can be shared across threads without an outer lock.

use super::range::AddressRange;
use crate::error::Result;
use std::net::Ipv4Addr;

/// A thread-safe membership set over IPv4 addresses.
///
/// Every method is fallible because an implementor may bound how long it
/// waits for internal locks. Range operations are not required to be atomic:
/// a failure part-way through may leave a prefix of the range applied.
pub trait AddressSet: Send + Sync {
    /// Whether `addr` is a member.
    fn contains(&self, addr: Ipv4Addr) -> Result<bool>;

    /// Add every address of `range`.
    fn insert(&self, range: AddressRange) -> Result<()>;

    /// Remove every address of `range`.
    fn remove(&self, range: AddressRange) -> Result<()>;

    /// Number of member addresses.
    fn cardinality(&self) -> Result<u64>;

    /// Approximate heap and inline footprint in bytes.
    fn approximate_byte_size(&self) -> Result<u64>;

    /// Remove every address.
    fn clear_all(&self) -> Result<()>;

    /// Whether the set has no members.
    fn is_empty(&self) -> Result<bool> {
        Ok(self.cardinality()? == 0)
    }

    /// Insert several ranges in order, stopping at the first failure.
    fn insert_batch<I>(&self, ranges: I) -> Result<()>
    where
        I: IntoIterator<Item = AddressRange>,
    {
        for range in ranges {
            self.insert(range)?;
        }
        Ok(())
    }

    /// Query several addresses.
    fn contains_batch<I>(&self, addrs: I) -> Result<Vec<bool>>
    where
        I: IntoIterator<Item = Ipv4Addr>,
    {
        addrs.into_iter().map(|addr| self.contains(addr)).collect()
    }
}
