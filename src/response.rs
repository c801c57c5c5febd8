//! Wire renders: HTTP status, JSON envelope, and client-safe filtering.
//!
//! # Envelope
//!
//! ```json
//! {
//!   "error": {
//!     "category": "not_found",
//!     "code": "NOT_FOUND",
//!     "message": "user not found",
//!     "timestamp": "2024-05-01T12:00:00Z",
//!     "metadata": { "user_id": "usr_1" },
//!     "request_id": "req-7"
//!   }
//! }
//! ```
//!
//! `metadata` is omitted when empty, `request_id` when unset.
//!
//! # Two Render Paths
//!
//! - [`CustomError::to_json`]: full render for operators. Never filtered.
//! - [`CustomError::to_client_json`]: render for untrusted consumers. With
//!   `production_mode` on, `internal` and `external` messages are replaced by
//!   fixed generic strings and metadata is cut down to the four identity keys
//!   in [`CLIENT_SAFE_METADATA_KEYS`]. With it off, identical to the full
//!   render.
//!
//! Filtering happens only in the output; the error itself is never modified.

use crate::config::{self, Config};
use crate::definitions::{CLIENT_SAFE_METADATA_KEYS, GENERIC_EXTERNAL_MESSAGE, GENERIC_INTERNAL_MESSAGE};
use crate::{CustomError, ErrorCategory};
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Wire Types
// ============================================================================

/// Top-level JSON envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error body.
    pub error: ErrorBody,
}

/// Body of the JSON envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Category wire name.
    pub category: ErrorCategory,
    /// Machine code.
    pub code: String,
    /// Message, possibly replaced by a generic string in client renders.
    pub message: String,
    /// RFC 3339 creation time, second precision, `Z` suffix.
    pub timestamp: String,
    /// Metadata, sorted by key. Omitted when empty.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    /// Correlation id. Omitted when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ErrorResponse {
    /// HTTP status for the body's category.
    #[inline]
    pub fn http_status(&self) -> u16 {
        self.error.category.http_status()
    }
}

// ============================================================================
// Renders
// ============================================================================

impl CustomError {
    /// HTTP status for this error's category.
    #[inline]
    pub fn to_http_status(&self) -> u16 {
        self.category().http_status()
    }

    /// RFC 3339 creation time used by every render.
    pub(crate) fn timestamp_rfc3339(&self) -> String {
        self.timestamp().to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    /// Full, unfiltered envelope.
    pub fn to_json(&self) -> ErrorResponse {
        self.render(|_| true, self.message().to_owned())
    }

    /// Full envelope as a `serde_json::Value`.
    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::to_value(self.to_json()).unwrap_or(serde_json::Value::Null)
    }

    /// Full envelope as a JSON string.
    ///
    /// # Errors
    ///
    /// Propagates `serde_json` serialization failures.
    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.to_json())
    }

    /// Message for untrusted consumers under the effective configuration.
    pub fn client_safe_message(&self) -> String {
        self.client_safe_message_with(&config::config())
    }

    /// Message for untrusted consumers under `config`.
    pub fn client_safe_message_with(&self, config: &Config) -> String {
        if !config.production_mode {
            return self.message().to_owned();
        }
        match self.category() {
            ErrorCategory::Internal => GENERIC_INTERNAL_MESSAGE.to_owned(),
            ErrorCategory::External => GENERIC_EXTERNAL_MESSAGE.to_owned(),
            _ => self.message().to_owned(),
        }
    }

    /// Envelope for untrusted consumers under the effective configuration.
    pub fn to_client_json(&self) -> ErrorResponse {
        self.to_client_json_with(&config::config())
    }

    /// Envelope for untrusted consumers under `config`.
    pub fn to_client_json_with(&self, config: &Config) -> ErrorResponse {
        let message = self.client_safe_message_with(config);
        if config.production_mode {
            self.render(|key| CLIENT_SAFE_METADATA_KEYS.contains(&key), message)
        } else {
            self.render(|_| true, message)
        }
    }

    /// Client envelope as a JSON string.
    ///
    /// # Errors
    ///
    /// Propagates `serde_json` serialization failures.
    pub fn to_client_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.to_client_json())
    }

    fn render(&self, keep: impl Fn(&str) -> bool, message: String) -> ErrorResponse {
        let (metadata, request_id) = self.inspect_state(|request_id, metadata, _| {
            let kept = metadata
                .iter()
                .filter(|&(key, _)| keep(key))
                .map(|(key, value)| (key.to_owned(), value.to_owned()))
                .collect::<BTreeMap<_, _>>();
            (kept, request_id.map(str::to_owned))
        });

        ErrorResponse {
            error: ErrorBody {
                category: self.category(),
                code: self.code().to_owned(),
                message,
                timestamp: self.timestamp_rfc3339(),
                metadata,
                request_id,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Sentinel;

    const DEV: Config = Config {
        stack_trace_enabled: false,
        max_stack_depth: 10,
        production_mode: false,
    };

    const PROD: Config = Config {
        stack_trace_enabled: false,
        max_stack_depth: 10,
        production_mode: true,
    };

    fn with_six_keys(category: ErrorCategory, message: &str) -> CustomError {
        let err = CustomError::from_category_with_config(&DEV, category, category.default_code(), message.to_owned());
        for key in ["user_id", "request_id", "trace_id", "correlation_id", "password", "api_key"] {
            err.with_metadata(key, format!("{key}-value"));
        }
        err
    }

    #[test]
    fn http_status_follows_category() {
        let err = CustomError::from_sentinel_with_config(&DEV, Sentinel::RateLimit, None, "slow down");
        assert_eq!(err.to_http_status(), 429);
        assert_eq!(err.to_json().http_status(), 429);
    }

    #[test]
    fn production_keeps_exactly_the_allow_list() {
        let err = with_six_keys(ErrorCategory::Validation, "bad input");
        let body = err.to_client_json_with(&PROD).error;
        let keys: Vec<_> = body.metadata.keys().map(String::as_str).collect();
        assert_eq!(keys, ["correlation_id", "request_id", "trace_id", "user_id"]);

        // The live error is untouched.
        assert_eq!(err.get_all_metadata().len(), 6);
        assert_eq!(err.to_json().error.metadata.len(), 6);
    }

    #[test]
    fn development_passes_everything_through() {
        let err = with_six_keys(ErrorCategory::Internal, "db password is X");
        let client = err.to_client_json_with(&DEV);
        assert_eq!(client, err.to_json());
        assert_eq!(client.error.metadata.len(), 6);
        assert_eq!(client.error.message, "db password is X");
    }

    #[test]
    fn production_message_substitution() {
        let internal = with_six_keys(ErrorCategory::Internal, "db password is X");
        assert_eq!(internal.client_safe_message_with(&PROD), "An internal error occurred");

        let external = with_six_keys(ErrorCategory::External, "stripe key rejected");
        assert_eq!(external.client_safe_message_with(&PROD), "A service is temporarily unavailable");

        let validation = with_six_keys(ErrorCategory::Validation, "email is malformed");
        assert_eq!(validation.client_safe_message_with(&PROD), "email is malformed");

        assert_eq!(internal.message(), "db password is X");
    }

    #[test]
    fn json_omits_empty_fields() {
        let err = CustomError::from_category_with_config(&DEV, ErrorCategory::Conflict, "TAKEN", "name taken");
        let value = serde_json::to_value(err.to_json()).unwrap();
        let body = value["error"].as_object().unwrap();
        assert_eq!(body["category"], "conflict");
        assert_eq!(body["code"], "TAKEN");
        assert!(!body.contains_key("metadata"));
        assert!(!body.contains_key("request_id"));

        err.with_request_id("req-3").with_metadata("user_id", "u");
        let value = err.to_json_value();
        assert_eq!(value["error"]["request_id"], "req-3");
        assert_eq!(value["error"]["metadata"]["user_id"], "u");
    }

    #[test]
    fn timestamp_is_rfc3339_utc() {
        let err = CustomError::from_category_with_config(&DEV, ErrorCategory::Internal, "X", "x");
        let ts = err.to_json().error.timestamp;
        assert!(ts.ends_with('Z'), "{ts}");
        let parsed = chrono::DateTime::parse_from_rfc3339(&ts).unwrap();
        assert_eq!(parsed.timestamp(), err.timestamp().timestamp());
    }

    #[test]
    fn json_string_round_trips_through_wire_types() {
        let err = with_six_keys(ErrorCategory::NotFound, "missing");
        let text = err.to_json_string().unwrap();
        let back: ErrorResponse = serde_json::from_str(&text).unwrap();
        assert_eq!(back, err.to_json());
    }
}
