//! Error types for iplist operations.
//!
//! Every fallible operation in the crate returns [`Result<T>`], whose error type
//! is [`IpListError`]. The variants fall into three groups:
//!
//! - **Parse failures**: the key text is not a valid address, range or CIDR
//!   block. See [`IpListError::is_parse_failure`].
//! - **Lock acquisition failures**: a shard lock could not be taken within the
//!   configured timeout. Without a timeout, locks never fail.
//! - **Adapter and configuration errors**: a rejected value on the host
//!   adapter's `put`, or an invalid builder setting.
//!
//! [`IpListError::InvariantViolation`] is never returned. It describes structural
//! corruption of a shard (a live counter out of step with its bitmap) and is only
//! ever raised as a panic.
//!
//! # Error Propagation
//!
//! ```
//! use iplist::{AddressRange, Result};
//!
//! fn span(key: &str) -> Result<u64> {
//!     let range: AddressRange = key.parse()?;
//!     Ok(range.len())
//! }
//! # assert_eq!(span("10.0.0.0/24").unwrap(), 256);
//! # assert!(span("10.0.0.0/32").is_err());
//! ```

#![allow(clippy::module_name_repetitions)]

use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

/// Result type alias for iplist operations.
pub type Result<T> = std::result::Result<T, IpListError>;

/// Errors that can occur while parsing keys or operating on the index.
///
/// # Design Notes
/// - `Clone` + `PartialEq` enable testing and error comparison
/// - Parse variants carry the offending key so log lines are self-contained
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IpListError {
    /// The key was empty.
    EmptyKey,

    /// The key contains an unexpected byte or a structurally invalid
    /// component (missing octet, too many octets, empty prefix, ...).
    MalformedKey {
        /// The key as received (lossily decoded if it was not UTF-8).
        key: String,
        /// Byte position where scanning stopped.
        position: usize,
        /// What was wrong at that position.
        reason: &'static str,
    },

    /// An octet accumulated to a value of 256 or more.
    OctetOutOfRange {
        /// The key as received.
        key: String,
        /// The accumulated octet value (saturated at `u32::MAX`).
        value: u32,
    },

    /// A CIDR prefix length greater than 31.
    ///
    /// `/32` is deliberately rejected; a single address is written without a
    /// prefix.
    PrefixOutOfRange {
        /// The key as received.
        key: String,
        /// The prefix length that was parsed.
        prefix: u32,
    },

    /// An explicit range whose end precedes its start.
    InvertedRange {
        /// First address of the range.
        start: Ipv4Addr,
        /// Last address of the range.
        end: Ipv4Addr,
    },

    /// A shard lock could not be acquired within the configured timeout.
    LockAcquisition {
        /// Index of the shard whose lock timed out.
        shard: u16,
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The host adapter received a value other than the single byte `"1"`.
    RejectedValue {
        /// Length of the rejected value in bytes.
        len: usize,
    },

    /// Invalid index configuration.
    InvalidConfig {
        /// Human-readable description of what's invalid.
        message: String,
    },

    /// Internal invariant violated.
    ///
    /// This is raised only as a panic payload. Continuing after a live counter
    /// has diverged from its bitmap would silently lose membership data.
    InvariantViolation {
        /// Shard in which the violation was detected.
        shard: Option<u16>,
        /// Description of the invariant that was violated.
        message: String,
    },
}

impl fmt::Display for IpListError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyKey => write!(f, "Empty address key"),
            Self::MalformedKey {
                key,
                position,
                reason,
            } => {
                write!(
                    f,
                    "Malformed address key {:?} at byte {}: {}",
                    key, position, reason
                )
            }
            Self::OctetOutOfRange { key, value } => {
                write!(
                    f,
                    "Octet value {} in key {:?} is out of range. Must be below 256",
                    value, key
                )
            }
            Self::PrefixOutOfRange { key, prefix } => {
                write!(
                    f,
                    "Prefix length /{} in key {:?} is out of range. Must be in range [0, 31]",
                    prefix, key
                )
            }
            Self::InvertedRange { start, end } => {
                write!(f, "Inverted address range: {} is greater than {}", start, end)
            }
            Self::LockAcquisition { shard, timeout } => {
                write!(
                    f,
                    "Failed to acquire lock on shard {} within {:?}",
                    shard, timeout
                )
            }
            Self::RejectedValue { len } => {
                write!(
                    f,
                    "Rejected value of {} bytes. Only the single byte \"1\" may be stored",
                    len
                )
            }
            Self::InvalidConfig { message } => {
                write!(f, "Invalid index configuration: {}", message)
            }
            Self::InvariantViolation { shard, message } => match shard {
                Some(shard) => write!(
                    f,
                    "Invariant violation in shard {} (this is a bug in iplist): {}",
                    shard, message
                ),
                None => write!(
                    f,
                    "Invariant violation (this is a bug in iplist): {}",
                    message
                ),
            },
        }
    }
}

impl std::error::Error for IpListError {}

impl IpListError {
    /// Create a `MalformedKey` error.
    #[must_use]
    pub fn malformed_key(key: &[u8], position: usize, reason: &'static str) -> Self {
        Self::MalformedKey {
            key: String::from_utf8_lossy(key).into_owned(),
            position,
            reason,
        }
    }

    /// Create an `OctetOutOfRange` error.
    #[must_use]
    pub fn octet_out_of_range(key: &[u8], value: u32) -> Self {
        Self::OctetOutOfRange {
            key: String::from_utf8_lossy(key).into_owned(),
            value,
        }
    }

    /// Create a `PrefixOutOfRange` error.
    #[must_use]
    pub fn prefix_out_of_range(key: &[u8], prefix: u32) -> Self {
        Self::PrefixOutOfRange {
            key: String::from_utf8_lossy(key).into_owned(),
            prefix,
        }
    }

    /// Create an `InvertedRange` error.
    #[must_use]
    pub fn inverted_range(start: u32, end: u32) -> Self {
        Self::InvertedRange {
            start: Ipv4Addr::from(start),
            end: Ipv4Addr::from(end),
        }
    }

    /// Create a `LockAcquisition` error.
    #[must_use]
    pub fn lock_acquisition(shard: u16, timeout: Duration) -> Self {
        Self::LockAcquisition { shard, timeout }
    }

    /// Create a `RejectedValue` error.
    #[must_use]
    pub fn rejected_value(len: usize) -> Self {
        Self::RejectedValue { len }
    }

    /// Create an `InvalidConfig` error.
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an `InvariantViolation` description.
    #[must_use]
    pub fn invariant_violation(shard: Option<u16>, message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            shard,
            message: message.into(),
        }
    }

    /// Whether this error came from parsing a key.
    #[must_use]
    pub fn is_parse_failure(&self) -> bool {
        matches!(
            self,
            Self::EmptyKey
                | Self::MalformedKey { .. }
                | Self::OctetOutOfRange { .. }
                | Self::PrefixOutOfRange { .. }
                | Self::InvertedRange { .. }
        )
    }
}

/// Abort on structural corruption.
///
/// Shard state is only ever mutated under its write lock, so a counter that
/// disagrees with its bitmap cannot be repaired by the caller.
#[cold]
#[track_caller]
pub(crate) fn fatal(shard: Option<u16>, message: impl Into<String>) -> ! {
    panic!("FATAL: {}", IpListError::invariant_violation(shard, message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_malformed_key() {
        let err = IpListError::malformed_key(b"10.0.x.1", 5, "unexpected byte");
        let display = format!("{err}");
        assert!(display.contains("10.0.x.1"));
        assert!(display.contains("byte 5"));
        assert!(display.contains("unexpected byte"));
    }

    #[test]
    fn test_error_display_octet_out_of_range() {
        let err = IpListError::octet_out_of_range(b"999.1.1.1", 999);
        let display = format!("{err}");
        assert!(display.contains("999"));
        assert!(display.contains("below 256"));
    }

    #[test]
    fn test_error_display_prefix_out_of_range() {
        let err = IpListError::prefix_out_of_range(b"10.0.0.0/32", 32);
        let display = format!("{err}");
        assert!(display.contains("/32"));
        assert!(display.contains("[0, 31]"));
    }

    #[test]
    fn test_error_display_inverted_range() {
        let err = IpListError::inverted_range(0x0a00_0005, 0x0a00_0001);
        let display = format!("{err}");
        assert!(display.contains("10.0.0.5"));
        assert!(display.contains("10.0.0.1"));
    }

    #[test]
    fn test_error_display_lock_acquisition() {
        let err = IpListError::lock_acquisition(7, Duration::from_millis(5));
        let display = format!("{err}");
        assert!(display.contains("shard 7"));
        assert!(display.contains("5ms"));
    }

    #[test]
    fn test_error_display_rejected_value() {
        let display = format!("{}", IpListError::rejected_value(4));
        assert!(display.contains("4 bytes"));
    }

    #[test]
    fn test_error_display_invariant_violation() {
        let err = IpListError::invariant_violation(Some(3), "live count underflow");
        let display = format!("{err}");
        assert!(display.contains("shard 3"));
        assert!(display.contains("bug"));
        assert!(display.contains("live count underflow"));
    }

    #[test]
    fn test_is_parse_failure() {
        assert!(IpListError::EmptyKey.is_parse_failure());
        assert!(IpListError::malformed_key(b"x", 0, "unexpected byte").is_parse_failure());
        assert!(IpListError::octet_out_of_range(b"256.0.0.0", 256).is_parse_failure());
        assert!(IpListError::prefix_out_of_range(b"1.2.3.4/40", 40).is_parse_failure());
        assert!(IpListError::inverted_range(2, 1).is_parse_failure());

        assert!(!IpListError::lock_acquisition(0, Duration::from_millis(1)).is_parse_failure());
        assert!(!IpListError::rejected_value(0).is_parse_failure());
        assert!(!IpListError::invalid_config("x").is_parse_failure());
    }

    #[test]
    #[should_panic(expected = "FATAL: Invariant violation in shard 9")]
    fn test_fatal_panics() {
        fatal(Some(9), "live count underflow");
    }

    #[test]
    fn test_error_implements_std_error() {
        let _err: Box<dyn std::error::Error> = Box::new(IpListError::EmptyKey);
    }

    #[test]
    fn test_error_propagation_with_question_mark() {
        fn inner() -> Result<()> {
            Err(IpListError::rejected_value(2))
        }

        fn outer() -> Result<()> {
            inner()?;
            Ok(())
        }

        assert_eq!(outer(), Err(IpListError::RejectedValue { len: 2 }));
    }
}
