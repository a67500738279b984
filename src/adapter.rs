//! Byte-oriented facade for a host key-value engine.
//!
//! A key-value engine that hosts the index as a plugin talks in raw byte keys
//! and values. [`KeyValueAdapter`] translates that surface onto a
//! [`ShardedBitmapIndex`]:
//!
//! | Host call       | Index operation                          |
//! |-----------------|------------------------------------------|
//! | `get(key)`      | `contains(first address of key)` -> `1`/`0` |
//! | `put(key, "1")` | `insert(key)`                            |
//! | `out(key)`      | `remove(key)`                            |
//! | `rnum()`        | `cardinality()`                          |
//! | `size()`        | `approximate_byte_size()`                |
//! | `vanish()`      | `clear_all()`                            |
//!
//! The adapter holds no state of its own besides a shared handle to the index,
//! so several adapters (or direct users of the index) may coexist.
//!
//! # Examples
//!
//! ```
//! use iplist::adapter::KeyValueAdapter;
//!
//! let db = KeyValueAdapter::new();
//! db.put(b"10.0.0.0/24", b"1").unwrap();
//!
//! assert_eq!(db.get(b"10.0.0.7").unwrap(), b"1");
//! assert_eq!(db.get(b"10.0.1.7").unwrap(), b"0");
//! assert_eq!(db.rnum().unwrap(), 256);
//!
//! // Only the literal "1" may be stored.
//! assert!(db.put(b"10.0.1.0/24", b"true").is_err());
//! assert_eq!(db.rnum().unwrap(), 256);
//! ```

use crate::core::parse;
use crate::error::{IpListError, Result};
use crate::sync::ShardedBitmapIndex;
use std::sync::Arc;

/// Value reported for a member address, and the only value `put` accepts.
pub const TRUE_VALUE: &[u8] = b"1";

/// Value reported for a non-member address.
pub const FALSE_VALUE: &[u8] = b"0";

/// Host-engine view of a shared [`ShardedBitmapIndex`].
#[derive(Debug, Clone, Default)]
pub struct KeyValueAdapter {
    index: Arc<ShardedBitmapIndex>,
}

impl KeyValueAdapter {
    /// Adapter over a fresh, empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adapter over an existing index.
    #[must_use]
    pub fn from_index(index: Arc<ShardedBitmapIndex>) -> Self {
        Self { index }
    }

    /// The underlying index.
    #[must_use]
    pub fn index(&self) -> &Arc<ShardedBitmapIndex> {
        &self.index
    }

    /// Membership of the key's address as `"1"` or `"0"`.
    ///
    /// A range or CIDR key is answered for its first address only.
    ///
    /// # Errors
    ///
    /// Parse failures of `key`, or a lock timeout.
    pub fn get(&self, key: &[u8]) -> Result<&'static [u8]> {
        let range = parse(key)?;
        let member = self.index.contains(range.start())?;
        Ok(if member { TRUE_VALUE } else { FALSE_VALUE })
    }

    /// Insert the key's range. `value` must be exactly `"1"`.
    ///
    /// # Errors
    ///
    /// [`IpListError::RejectedValue`] for any other value (nothing is
    /// modified), parse failures of `key`, or a lock timeout.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        if value != TRUE_VALUE {
            return Err(IpListError::rejected_value(value.len()));
        }
        let range = parse(key)?;
        self.index.insert(range)?;
        Ok(())
    }

    /// Remove the key's range.
    ///
    /// # Errors
    ///
    /// Parse failures of `key`, or a lock timeout.
    pub fn out(&self, key: &[u8]) -> Result<()> {
        let range = parse(key)?;
        self.index.remove(range)?;
        Ok(())
    }

    /// Number of member addresses.
    ///
    /// # Errors
    ///
    /// Lock timeout.
    pub fn rnum(&self) -> Result<u64> {
        self.index.cardinality()
    }

    /// Approximate memory footprint in bytes.
    ///
    /// # Errors
    ///
    /// Lock timeout.
    pub fn size(&self) -> Result<u64> {
        self.index.approximate_byte_size()
    }

    /// Remove every member.
    ///
    /// # Errors
    ///
    /// Lock timeout.
    pub fn vanish(&self) -> Result<()> {
        self.index.clear_all()
    }
}
