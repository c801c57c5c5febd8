//! Error category table - the closed classification every error carries.
//!
//! Each category maps to exactly one HTTP status and one default machine code.
//! The table is pure constant data: no state, no allocation, no locks.
//!
//! # Category Table
//!
//! | Category       | HTTP | Default code      |
//! |----------------|------|-------------------|
//! | `validation`   | 400  | `INVALID_INPUT`   |
//! | `unauthorized` | 401  | `UNAUTHORIZED`    |
//! | `forbidden`    | 403  | `FORBIDDEN`       |
//! | `not_found`    | 404  | `NOT_FOUND`       |
//! | `timeout`      | 408  | `TIMEOUT`         |
//! | `conflict`     | 409  | `ALREADY_EXISTS`  |
//! | `rate_limit`   | 429  | `RATE_LIMIT`      |
//! | `internal`     | 500  | `INTERNAL_ERROR`  |
//! | `external`     | 502  | `EXTERNAL_ERROR`  |
//!
//! # Closed Set
//!
//! `ErrorCategory` is a plain enum, so a value outside the table cannot exist
//! in typed code. Category *names* arriving from the outside (headers, stored
//! JSON, other services) are plain strings; [`http_status_for_name`] maps any
//! unknown name to the internal bucket.
//!
//! # Example
//!
//! ```rust
//! use contextual_errors::ErrorCategory;
//!
//! assert_eq!(ErrorCategory::NotFound.http_status(), 404);
//! assert_eq!(ErrorCategory::Conflict.default_code(), "ALREADY_EXISTS");
//! assert_eq!("rate_limit".parse::<ErrorCategory>().unwrap(), ErrorCategory::RateLimit);
//! ```

use crate::definitions;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// HTTP Status Constants
// ============================================================================

/// HTTP status codes used by the category table.
pub mod status {
    pub const BAD_REQUEST: u16 = 400;
    pub const UNAUTHORIZED: u16 = 401;
    pub const FORBIDDEN: u16 = 403;
    pub const NOT_FOUND: u16 = 404;
    pub const REQUEST_TIMEOUT: u16 = 408;
    pub const CONFLICT: u16 = 409;
    pub const TOO_MANY_REQUESTS: u16 = 429;
    pub const INTERNAL_SERVER_ERROR: u16 = 500;
    pub const BAD_GATEWAY: u16 = 502;
}

// ============================================================================
// Error Category
// ============================================================================

/// Semantic classification of an error.
///
/// # Copy Semantics
///
/// Small fieldless enum; copied freely. Assigned once at construction and
/// never changed on the error afterwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Input validation failures (400)
    Validation,
    /// Resource not found (404)
    NotFound,
    /// Resource conflicts (409)
    Conflict,
    /// Authentication failures (401)
    Unauthorized,
    /// Authorization failures (403)
    Forbidden,
    /// Internal failures (500). Unclassified errors land here.
    #[default]
    Internal,
    /// Operation timeouts (408)
    Timeout,
    /// Rate limiting (429)
    RateLimit,
    /// Upstream / external service failures (502)
    External,
}

impl ErrorCategory {
    /// Every category, in table order.
    pub const ALL: [ErrorCategory; 9] = [
        Self::Validation,
        Self::NotFound,
        Self::Conflict,
        Self::Unauthorized,
        Self::Forbidden,
        Self::Internal,
        Self::Timeout,
        Self::RateLimit,
        Self::External,
    ];

    /// Wire name of the category (`"not_found"`, `"rate_limit"`, ...).
    /// Zero-allocation - returns static string.
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::Internal => "internal",
            Self::Timeout => "timeout",
            Self::RateLimit => "rate_limit",
            Self::External => "external",
        }
    }

    /// HTTP status for this category.
    #[inline]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::Validation => status::BAD_REQUEST,
            Self::Unauthorized => status::UNAUTHORIZED,
            Self::Forbidden => status::FORBIDDEN,
            Self::NotFound => status::NOT_FOUND,
            Self::Timeout => status::REQUEST_TIMEOUT,
            Self::Conflict => status::CONFLICT,
            Self::RateLimit => status::TOO_MANY_REQUESTS,
            Self::External => status::BAD_GATEWAY,
            Self::Internal => status::INTERNAL_SERVER_ERROR,
        }
    }

    /// Default machine code for errors of this category.
    #[inline]
    pub const fn default_code(self) -> &'static str {
        match self {
            Self::NotFound => definitions::CODE_NOT_FOUND,
            Self::Conflict => definitions::CODE_ALREADY_EXISTS,
            Self::Validation => definitions::CODE_INVALID_INPUT,
            Self::Unauthorized => definitions::CODE_UNAUTHORIZED,
            Self::Forbidden => definitions::CODE_FORBIDDEN,
            Self::Timeout => definitions::CODE_TIMEOUT,
            Self::RateLimit => definitions::CODE_RATE_LIMIT,
            Self::External => definitions::CODE_EXTERNAL_ERROR,
            Self::Internal => definitions::CODE_INTERNAL_ERROR,
        }
    }

    /// Look up a category by wire name. Exact, case-sensitive match.
    #[inline]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP status for a category given by name.
///
/// Names outside the closed set map to 500, the internal bucket.
#[inline]
pub fn http_status_for_name(name: &str) -> u16 {
    ErrorCategory::from_name(name)
        .unwrap_or_default()
        .http_status()
}

// ============================================================================
// Parsing
// ============================================================================

/// Error returned when a string is not one of the nine category names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCategoryError {
    value: String,
}

impl ParseCategoryError {
    /// The rejected input.
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for ParseCategoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown error category '{}'", self.value)
    }
}

impl std::error::Error for ParseCategoryError {}

impl FromStr for ErrorCategory {
    type Err = ParseCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| ParseCategoryError {
            value: s.to_owned(),
        })
    }
}
