//! Index configuration and builder.
//!
//! The index has a single tunable: how long an operation may wait for a shard
//! lock. By default it waits indefinitely, and lock acquisition cannot fail.
//! With a timeout configured, an operation that cannot take a shard lock in
//! time is declined with [`IpListError::LockAcquisition`].
//!
//! # Examples
//!
//! ## Default Configuration
//!
//! ```
//! use iplist::builder::IndexBuilder;
//!
//! let index = IndexBuilder::new().build().unwrap();
//! assert_eq!(index.config().lock_timeout, None);
//! ```
//!
//! ## Bounded Lock Waits
//!
//! ```
//! use iplist::builder::IndexBuilder;
//! use std::time::Duration;
//!
//! let index = IndexBuilder::new()
//!     .lock_timeout(Duration::from_millis(50))
//!     .build()
//!     .unwrap();
//! assert_eq!(index.config().lock_timeout, Some(Duration::from_millis(50)));
//! ```
//!
//! ## Error Handling
//!
//! ```
//! use iplist::builder::IndexBuilder;
//! use std::time::Duration;
//!
//! let result = IndexBuilder::new().lock_timeout(Duration::ZERO).build();
//! assert!(result.is_err());
//! ```

use crate::error::{IpListError, Result};
use crate::sync::ShardedBitmapIndex;
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Runtime configuration of a [`ShardedBitmapIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct IndexConfig {
    /// Maximum wait for a shard lock. `None` blocks until the lock is free.
    pub lock_timeout: Option<Duration>,
}

impl IndexConfig {
    /// Check the configuration for values the index cannot honor.
    ///
    /// # Errors
    ///
    /// Returns [`IpListError::InvalidConfig`] for a zero lock timeout.
    pub fn validate(&self) -> Result<()> {
        validation::validate_lock_timeout(self.lock_timeout)
    }
}

/// Fluent builder for [`ShardedBitmapIndex`].
#[derive(Debug, Clone, Default)]
pub struct IndexBuilder {
    config: IndexConfig,
}

impl IndexBuilder {
    /// Builder with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    #[must_use]
    pub fn config(mut self, config: IndexConfig) -> Self {
        self.config = config;
        self
    }

    /// Bound how long any operation waits for a shard lock.
    #[must_use]
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.config.lock_timeout = Some(timeout);
        self
    }

    /// Wait indefinitely for shard locks (the default).
    #[must_use]
    pub fn blocking(mut self) -> Self {
        self.config.lock_timeout = None;
        self
    }

    /// Validate the configuration and build an empty index.
    ///
    /// # Errors
    ///
    /// Returns [`IpListError::InvalidConfig`] if the configuration is invalid.
    pub fn build(self) -> Result<ShardedBitmapIndex> {
        self.config.validate()?;
        Ok(ShardedBitmapIndex::with_config(self.config))
    }
}

mod validation {
    use super::*;

    /// A zero timeout would make every contended operation fail.
    #[inline]
    pub fn validate_lock_timeout(timeout: Option<Duration>) -> Result<()> {
        match timeout {
            Some(t) if t.is_zero() => Err(IpListError::invalid_config(
                "lock_timeout must be greater than zero",
            )),
            _ => Ok(()),
        }
    }
}
