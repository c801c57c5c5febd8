//! Call-site sugar: canned constructors, an owned builder, and `custom_error!`.
//!
//! Everything here produces an ordinary [`CustomError`] through the same
//! construction path as the core constructors: same timestamp rule, same stack
//! capture, same sentinel table.
//!
//! # Canned Constructors
//!
//! | Constructor      | Sentinel        | Message shape                                   |
//! |------------------|-----------------|-------------------------------------------------|
//! | `validation`     | `InvalidInput`  | caller's message                                |
//! | `not_found`      | `NotFound`      | `{resource} with id '{id}' not found`           |
//! | `unauthorized`   | `Unauthorized`  | `authentication required: {reason}`             |
//! | `forbidden`      | `Forbidden`     | `access denied: cannot {action} {resource}`     |
//! | `conflict`       | `AlreadyExists` | `{resource} with {field} '{value}' already exists` |
//! | `internal`       | `Internal`      | `internal error in {component}`                 |
//! | `external`       | `External`      | `external service '{service}' error`            |
//! | `timeout`        | `Timeout`       | `{operation} operation timed out`               |
//! | `rate_limit`     | `RateLimit`     | `rate limit exceeded: {limit} per {window}`     |
//!
//! Empty optional arguments shorten the message and skip the matching
//! metadata entry. Each constructor also records `error_type` metadata.
//!
//! # Builder
//!
//! ```rust
//! use contextual_errors::{ErrorBuilder, Sentinel};
//!
//! let err = ErrorBuilder::new(Sentinel::Forbidden)
//!     .message("cannot delete invoice")
//!     .metadata("user_id", "usr_9")
//!     .request_id("req-11")
//!     .build();
//!
//! assert_eq!(err.to_http_status(), 403);
//! assert_eq!(err.request_id().as_deref(), Some("req-11"));
//! ```
//!
//! # Macro
//!
//! ```rust
//! use contextual_errors::{custom_error, ErrorCategory, Sentinel};
//!
//! let id = 42;
//! let a = custom_error!(Sentinel::NotFound, "order {} not found", id);
//! let b = custom_error!(category = ErrorCategory::Timeout, code = "SLOW_DB", "query took {}ms", 900);
//!
//! assert_eq!(a.message(), "order 42 not found");
//! assert_eq!(b.code(), "SLOW_DB");
//! ```

use crate::config::{self, Config};
use crate::context::keys;
use crate::models::{BoxError, Cause, Parts};
use crate::{CustomError, ErrorCategory, Sentinel};
use std::borrow::Cow;
use std::error::Error;
use std::sync::Arc;
use zeroize::Zeroize;

// ============================================================================
// Canned Constructors
// ============================================================================

impl CustomError {
    /// Invalid input on `field`.
    #[inline(never)]
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        let err = Self::construct(
            &config::config(),
            Parts::from_sentinel(Sentinel::InvalidInput, None, message.into()),
        );
        err.with_metadata(keys::FIELD, field)
            .with_metadata(keys::ERROR_TYPE, "validation");
        err
    }

    /// Missing `resource`, optionally identified by `id`.
    #[inline(never)]
    pub fn not_found(resource: &str, id: &str) -> Self {
        let message = if id.is_empty() {
            format!("{resource} not found")
        } else {
            format!("{resource} with id '{id}' not found")
        };
        let err = Self::construct(
            &config::config(),
            Parts::from_sentinel(Sentinel::NotFound, None, message),
        );
        err.with_metadata(keys::RESOURCE, resource)
            .with_metadata(keys::ERROR_TYPE, "not_found");
        if !id.is_empty() {
            err.with_metadata(keys::RESOURCE_ID, id);
        }
        err
    }

    /// Authentication failure with an optional reason.
    #[inline(never)]
    pub fn unauthorized(reason: &str) -> Self {
        let message = if reason.is_empty() {
            "authentication required".to_owned()
        } else {
            format!("authentication required: {reason}")
        };
        let err = Self::construct(
            &config::config(),
            Parts::from_sentinel(Sentinel::Unauthorized, None, message),
        );
        err.with_metadata(keys::ERROR_TYPE, "unauthorized");
        if !reason.is_empty() {
            err.with_metadata(keys::REASON, reason);
        }
        err
    }

    /// Authorization failure for `action` on `resource`.
    #[inline(never)]
    pub fn forbidden(action: &str, resource: &str) -> Self {
        let message = if action.is_empty() || resource.is_empty() {
            "access denied".to_owned()
        } else {
            format!("access denied: cannot {action} {resource}")
        };
        let err = Self::construct(
            &config::config(),
            Parts::from_sentinel(Sentinel::Forbidden, None, message),
        );
        err.with_metadata(keys::ERROR_TYPE, "forbidden");
        if !action.is_empty() {
            err.with_metadata(keys::ACTION, action);
        }
        if !resource.is_empty() {
            err.with_metadata(keys::RESOURCE, resource);
        }
        err
    }

    /// `resource` already exists with `field` = `value`.
    #[inline(never)]
    pub fn conflict(resource: &str, field: &str, value: &str) -> Self {
        let message = if field.is_empty() || value.is_empty() {
            format!("{resource} already exists")
        } else {
            format!("{resource} with {field} '{value}' already exists")
        };
        let err = Self::construct(
            &config::config(),
            Parts::from_sentinel(Sentinel::AlreadyExists, None, message),
        );
        err.with_metadata(keys::RESOURCE, resource)
            .with_metadata(keys::ERROR_TYPE, "conflict");
        if !field.is_empty() {
            err.with_metadata(keys::CONFLICT_FIELD, field);
        }
        if !value.is_empty() {
            err.with_metadata(keys::CONFLICT_VALUE, value);
        }
        err
    }

    /// Internal failure in `component`.
    #[inline(never)]
    pub fn internal(component: &str, wrapped: Option<BoxError>) -> Self {
        let message = if component.is_empty() {
            "internal server error".to_owned()
        } else {
            format!("internal error in {component}")
        };
        let err = Self::construct(
            &config::config(),
            Parts::from_sentinel(Sentinel::Internal, wrapped.map(Cause::from), message),
        );
        err.with_metadata(keys::ERROR_TYPE, "internal");
        if !component.is_empty() {
            err.with_metadata(keys::COMPONENT, component);
        }
        err
    }

    /// Failure of an upstream `service` during `operation`.
    #[inline(never)]
    pub fn external(service: &str, operation: &str, wrapped: Option<BoxError>) -> Self {
        let message = if service.is_empty() {
            "external service error".to_owned()
        } else {
            format!("external service '{service}' error")
        };
        let err = Self::construct(
            &config::config(),
            Parts::from_sentinel(Sentinel::External, wrapped.map(Cause::from), message),
        );
        err.with_metadata(keys::ERROR_TYPE, "external");
        if !service.is_empty() {
            err.with_metadata(keys::SERVICE, service);
        }
        if !operation.is_empty() {
            err.with_metadata(keys::OPERATION, operation);
        }
        err
    }

    /// `operation` ran out of time.
    #[inline(never)]
    pub fn timeout(operation: &str, wrapped: Option<BoxError>) -> Self {
        let message = if operation.is_empty() {
            "operation timed out".to_owned()
        } else {
            format!("{operation} operation timed out")
        };
        let err = Self::construct(
            &config::config(),
            Parts::from_sentinel(Sentinel::Timeout, wrapped.map(Cause::from), message),
        );
        err.with_metadata(keys::ERROR_TYPE, "timeout");
        if !operation.is_empty() {
            err.with_metadata(keys::OPERATION, operation);
        }
        err
    }

    /// Rate limit of `limit` per `window` exceeded.
    #[inline(never)]
    pub fn rate_limit(limit: &str, window: &str) -> Self {
        let message = if limit.is_empty() || window.is_empty() {
            "rate limit exceeded".to_owned()
        } else {
            format!("rate limit exceeded: {limit} per {window}")
        };
        let err = Self::construct(
            &config::config(),
            Parts::from_sentinel(Sentinel::RateLimit, None, message),
        );
        err.with_metadata(keys::ERROR_TYPE, "rate_limit");
        if !limit.is_empty() {
            err.with_metadata(keys::LIMIT, limit);
        }
        if !window.is_empty() {
            err.with_metadata(keys::WINDOW, window);
        }
        err
    }
}

// ============================================================================
// Error Builder
// ============================================================================

/// Owned builder collecting everything before a single [`build`](Self::build).
///
/// Category, code, message, cause, sentinel and timestamp are fixed when
/// `build` runs; metadata and request id are applied to the built error.
/// Values held by an unused builder are zeroized on drop.
pub struct ErrorBuilder {
    category: ErrorCategory,
    code: Cow<'static, str>,
    sentinel: Option<Sentinel>,
    message: Option<String>,
    wrapped: Option<Cause>,
    metadata: Vec<(String, String)>,
    request_id: Option<String>,
    config: Option<Config>,
}

impl ErrorBuilder {
    /// Start from a sentinel; category and code follow the sentinel table.
    pub fn new(sentinel: Sentinel) -> Self {
        Self {
            category: sentinel.category(),
            code: Cow::Borrowed(sentinel.code()),
            sentinel: Some(sentinel),
            message: None,
            wrapped: None,
            metadata: Vec::new(),
            request_id: None,
            config: None,
        }
    }

    /// Start from an explicit category and code.
    pub fn with_category(category: ErrorCategory, code: impl Into<Cow<'static, str>>) -> Self {
        Self {
            category,
            code: code.into(),
            sentinel: None,
            message: None,
            wrapped: None,
            metadata: Vec::new(),
            request_id: None,
            config: None,
        }
    }

    /// Message. Defaults to the sentinel's canonical message, or the code.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Direct cause.
    pub fn wrapped<E>(mut self, err: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        self.wrapped = Some(Arc::new(err));
        self
    }

    /// Direct cause, already boxed.
    pub fn wrapped_boxed(mut self, err: BoxError) -> Self {
        self.wrapped = Some(Cause::from(err));
        self
    }

    /// Metadata entry; later entries overwrite earlier ones with the same key.
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }

    /// Correlation id.
    pub fn request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Build under `config` instead of the effective configuration.
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Construct the error.
    #[inline(never)]
    pub fn build(mut self) -> CustomError {
        let message = self.message.take().unwrap_or_else(|| match self.sentinel {
            Some(sentinel) => sentinel.message().to_owned(),
            None => self.code.to_string(),
        });
        let config = self.config.unwrap_or_else(config::config);

        let err = CustomError::construct(
            &config,
            Parts {
                category: self.category,
                code: std::mem::take(&mut self.code),
                message,
                wrapped: self.wrapped.take(),
                sentinel: self.sentinel,
            },
        );

        for (key, value) in std::mem::take(&mut self.metadata) {
            err.with_metadata(key, value);
        }
        if let Some(id) = self.request_id.take() {
            err.with_request_id(id);
        }
        err
    }
}

impl Drop for ErrorBuilder {
    fn drop(&mut self) {
        for (_, value) in self.metadata.iter_mut() {
            value.zeroize();
        }
        if let Some(id) = self.request_id.as_mut() {
            id.zeroize();
        }
    }
}

// ============================================================================
// Macro
// ============================================================================

/// Build a [`CustomError`] with a formatted message.
///
/// - `custom_error!(sentinel, "fmt", args..)`
/// - `custom_error!(category = cat, code = "CODE", "fmt", args..)`
#[macro_export]
macro_rules! custom_error {
    (category = $category:expr, code = $code:expr, $($arg:tt)+) => {
        $crate::CustomError::from_category($category, $code, ::std::format!($($arg)+))
    };
    ($sentinel:expr, $($arg:tt)+) => {
        $crate::CustomError::from_sentinel($sentinel, ::std::option::Option::None, ::std::format!($($arg)+))
    };
}
