//! # Contextual Errors
//!
//! Categorized, metadata-carrying errors for service code.
//!
//! ## Design Philosophy
//!
//! 1. **Every error has a category** that fixes its HTTP status
//! 2. **Well-known conditions are sentinels** matched by identity through any chain
//! 3. **Context is attached after construction** (metadata, request id)
//! 4. **Operators get everything, clients get what is safe**
//! 5. **Stack capture is bounded and configurable**
//!
//! ## Two Audiences
//!
//! - Operators read [`CustomError::detailed_error`], [`CustomError::to_json`],
//!   structured `tracing` events and [`InternalLog`]: full message, all
//!   metadata, wrapped cause, stack frames.
//! - Untrusted clients read [`CustomError::to_client_json`]. With
//!   `production_mode` on, `internal` and `external` messages are replaced
//!   and metadata is cut to the identity keys in
//!   [`CLIENT_SAFE_METADATA_KEYS`].
//!
//! ## Quick Start
//!
//! ```rust
//! use contextual_errors::{CustomError, ErrorChainExt, Result, Sentinel};
//!
//! fn load_user(id: &str) -> Result<()> {
//!     let err = CustomError::not_found("user", id);
//!     err.with_request_id("req-42").with_metadata("tenant_id", "acme");
//!     Err(err)
//! }
//!
//! let err = load_user("usr_1").unwrap_err();
//! assert_eq!(err.to_http_status(), 404);
//! assert!(err.has_sentinel(Sentinel::NotFound));
//! assert_eq!(err.message(), "user with id 'usr_1' not found");
//! ```
//!
//! ## Wrapping Foreign Errors
//!
//! ```rust
//! use contextual_errors::{CustomError, ErrorCategory, ErrorChainExt};
//! use std::io;
//!
//! let io_err = io::Error::other("connection reset");
//! let err = CustomError::wrap(io_err, ErrorCategory::External, "PAYMENTS_DOWN", "charge failed");
//!
//! assert_eq!(err.to_string(), "charge failed: connection reset");
//! assert!(err.find_cause::<io::Error>().is_some());
//! assert_eq!(err.to_http_status(), 502);
//! ```
//!
//! ## Configuration
//!
//! Stack capture and production filtering are controlled by [`Config`],
//! installed process-wide with [`config::set_config`], read from the
//! environment with [`Config::from_env`], or scoped with
//! [`config::with_config`].
//!
//! ## Features
//!
//! - `tokio`: task-local configuration scopes via `config::scope_config`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chain;
pub mod codes;
pub mod config;
pub mod context;
pub mod convenience;
pub mod definitions;
pub mod logging;
pub mod models;
pub mod response;
pub mod stack;

pub use chain::{
    Chain, ErrorChainExt, category_of, code_of, find_custom_error, has_stack_trace, is_category, is_code,
    metadata_of,
};
pub use codes::*;
pub use config::{Config, ConfigError};
pub use context::keys;
pub use convenience::*;
pub use definitions::*;
pub use logging::*;
pub use models::*;
pub use response::*;
pub use stack::{StackFrame, StackTrace};

/// Type alias for Results using our error type.
pub type Result<T> = std::result::Result<T, CustomError>;
