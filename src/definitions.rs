//! Pre-defined machine codes and well-known sentinel conditions.
//!
//! # Sentinels
//!
//! A [`Sentinel`] is a well-known failure condition ("resource not found",
//! "operation timeout", ...) that callers match against by identity. Each
//! sentinel determines the category and default code of errors built from it:
//!
//! | Sentinel        | Category       | Code             |
//! |-----------------|----------------|------------------|
//! | `NotFound`      | `not_found`    | `NOT_FOUND`      |
//! | `AlreadyExists` | `conflict`     | `ALREADY_EXISTS` |
//! | `InvalidInput`  | `validation`   | `INVALID_INPUT`  |
//! | `Unauthorized`  | `unauthorized` | `UNAUTHORIZED`   |
//! | `Forbidden`     | `forbidden`    | `FORBIDDEN`      |
//! | `Internal`      | `internal`     | `INTERNAL_ERROR` |
//! | `Timeout`       | `timeout`      | `TIMEOUT`        |
//! | `RateLimit`     | `rate_limit`   | `RATE_LIMIT`     |
//! | `External`      | `external`     | `EXTERNAL_ERROR` |
//!
//! Sentinels are ordinary `std::error::Error` values, so they can sit
//! anywhere in a `source()` chain and be recovered by [`Sentinel::classify`].

use crate::ErrorCategory;
use std::error::Error;
use std::fmt;

// -----------------------------------------------------------------------------
// Machine codes
// -----------------------------------------------------------------------------

/// Default code for `not_found` errors.
pub const CODE_NOT_FOUND: &str = "NOT_FOUND";
/// Default code for `conflict` errors.
pub const CODE_ALREADY_EXISTS: &str = "ALREADY_EXISTS";
/// Default code for `validation` errors.
pub const CODE_INVALID_INPUT: &str = "INVALID_INPUT";
/// Default code for `unauthorized` errors.
pub const CODE_UNAUTHORIZED: &str = "UNAUTHORIZED";
/// Default code for `forbidden` errors.
pub const CODE_FORBIDDEN: &str = "FORBIDDEN";
/// Default code for `timeout` errors.
pub const CODE_TIMEOUT: &str = "TIMEOUT";
/// Default code for `rate_limit` errors.
pub const CODE_RATE_LIMIT: &str = "RATE_LIMIT";
/// Default code for `external` errors.
pub const CODE_EXTERNAL_ERROR: &str = "EXTERNAL_ERROR";
/// Default code for `internal` errors.
pub const CODE_INTERNAL_ERROR: &str = "INTERNAL_ERROR";

// -----------------------------------------------------------------------------
// Client-facing replacement messages (production mode)
// -----------------------------------------------------------------------------

/// Replaces the message of `internal` errors in client renders.
pub const GENERIC_INTERNAL_MESSAGE: &str = "An internal error occurred";

/// Replaces the message of `external` errors in client renders.
pub const GENERIC_EXTERNAL_MESSAGE: &str = "A service is temporarily unavailable";

/// Metadata keys that survive client rendering in production mode.
/// Everything else is dropped from the client payload.
pub const CLIENT_SAFE_METADATA_KEYS: [&str; 4] =
    ["user_id", "request_id", "trace_id", "correlation_id"];

// ============================================================================
// Sentinel Conditions
// ============================================================================

/// Well-known failure condition used for identity-based matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sentinel {
    /// A requested resource was not found.
    NotFound,
    /// A resource already exists.
    AlreadyExists,
    /// Input data was invalid.
    InvalidInput,
    /// Authentication failed.
    Unauthorized,
    /// Authorization failed.
    Forbidden,
    /// Internal failure.
    Internal,
    /// An operation timed out.
    Timeout,
    /// A rate limit was exceeded.
    RateLimit,
    /// An external service failed.
    External,
}

impl Sentinel {
    /// Canonical message, also the sentinel's `Display` output.
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotFound => "resource not found",
            Self::AlreadyExists => "resource already exists",
            Self::InvalidInput => "invalid input",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::Internal => "internal error",
            Self::Timeout => "operation timeout",
            Self::RateLimit => "rate limit exceeded",
            Self::External => "external service error",
        }
    }

    /// Category assigned to errors built from this sentinel.
    pub const fn category(self) -> ErrorCategory {
        match self {
            Self::NotFound => ErrorCategory::NotFound,
            Self::AlreadyExists => ErrorCategory::Conflict,
            Self::InvalidInput => ErrorCategory::Validation,
            Self::Unauthorized => ErrorCategory::Unauthorized,
            Self::Forbidden => ErrorCategory::Forbidden,
            Self::Internal => ErrorCategory::Internal,
            Self::Timeout => ErrorCategory::Timeout,
            Self::RateLimit => ErrorCategory::RateLimit,
            Self::External => ErrorCategory::External,
        }
    }

    /// Machine code assigned to errors built from this sentinel.
    pub const fn code(self) -> &'static str {
        self.category().default_code()
    }

    /// Find the first sentinel in an error chain.
    ///
    /// Walks `err` and its `source()` chain; links that are [`CustomError`]s
    /// contribute the sentinel they were built from. Returns `None` when
    /// nothing in the chain is recognized.
    ///
    /// [`CustomError`]: crate::CustomError
    pub fn classify(err: &(dyn Error + 'static)) -> Option<Sentinel> {
        let mut current = Some(err);
        while let Some(link) = current {
            if let Some(sentinel) = link.downcast_ref::<Sentinel>() {
                return Some(*sentinel);
            }
            if let Some(sentinel) = link
                .downcast_ref::<crate::CustomError>()
                .and_then(crate::CustomError::sentinel)
            {
                return Some(sentinel);
            }
            current = link.source();
        }
        None
    }
}

impl fmt::Display for Sentinel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl Error for Sentinel {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn sentinel_table() {
        assert_eq!(Sentinel::NotFound.category(), ErrorCategory::NotFound);
        assert_eq!(Sentinel::AlreadyExists.category(), ErrorCategory::Conflict);
        assert_eq!(Sentinel::AlreadyExists.code(), CODE_ALREADY_EXISTS);
        assert_eq!(Sentinel::InvalidInput.code(), CODE_INVALID_INPUT);
        assert_eq!(Sentinel::Internal.code(), CODE_INTERNAL_ERROR);
        assert_eq!(Sentinel::Timeout.to_string(), "operation timeout");
    }

    #[derive(Debug)]
    struct Layer(Sentinel);

    impl fmt::Display for Layer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("layer")
        }
    }

    impl Error for Layer {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn classify_finds_sentinel_behind_foreign_wrapper() {
        let wrapped = Layer(Sentinel::RateLimit);
        assert_eq!(Sentinel::classify(&wrapped), Some(Sentinel::RateLimit));
    }

    #[test]
    fn classify_unrecognized_chain() {
        let plain = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert_eq!(Sentinel::classify(&plain), None);
    }

    #[test]
    fn allow_list_is_exactly_four_keys() {
        assert_eq!(
            CLIENT_SAFE_METADATA_KEYS,
            ["user_id", "request_id", "trace_id", "correlation_id"]
        );
    }
}
