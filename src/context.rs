//! Metadata store and well-known metadata keys.
//!
//! Every [`CustomError`] carries a string→string metadata map used for
//! diagnostic context (`user_id`, `operation`, `retry_count`, ...).
//!
//! # Allocation
//!
//! The map does not exist until the first write. An error that never receives
//! metadata pays for one `Option` and nothing else. Callers cannot tell
//! "never allocated" from "allocated but empty": both read as no entries.
//!
//! # Copy-on-Read
//!
//! The store never hands out references to its map. [`CustomError::get_metadata`]
//! clones one value, [`CustomError::get_all_metadata`] clones the whole map.
//! Mutating an exported map never reaches back into the error.
//!
//! # Security
//!
//! Values are zeroized when overwritten and when the store is dropped, the
//! same treatment the crate gives request ids. Keys are left alone; they are
//! schema, not data.
//!
//! # Typed Accessors
//!
//! A handful of keys hold numbers or durations. They are still stored as
//! strings (the wire format is string→string), but typed helpers do the
//! formatting and parsing:
//!
//! ```rust
//! use contextual_errors::{CustomError, ErrorCategory};
//! use std::time::Duration;
//!
//! let err = CustomError::from_category(ErrorCategory::External, "UPSTREAM", "upstream failed");
//! err.with_retry_count(3).with_duration(Duration::from_millis(250));
//!
//! assert_eq!(err.retry_count(), Some(3));
//! assert_eq!(err.get_metadata("duration").as_deref(), Some("0.25s"));
//! assert_eq!(err.duration(), Some(Duration::from_millis(250)));
//! ```

use crate::CustomError;
use std::collections::HashMap;
use std::time::Duration;
use zeroize::Zeroize;

// ============================================================================
// Well-known Keys
// ============================================================================

/// Metadata key names shared across services.
///
/// Using the constants keeps key spelling consistent between producers and
/// the log pipeline. Only the four identity keys in
/// [`CLIENT_SAFE_METADATA_KEYS`](crate::definitions::CLIENT_SAFE_METADATA_KEYS)
/// survive production client renders.
pub mod keys {
    #![allow(missing_docs)]

    // Identity
    pub const USER_ID: &str = "user_id";
    pub const REQUEST_ID: &str = "request_id";
    pub const SESSION_ID: &str = "session_id";
    pub const TRACE_ID: &str = "trace_id";
    pub const SPAN_ID: &str = "span_id";
    pub const CORRELATION_ID: &str = "correlation_id";

    // Operation context
    pub const OPERATION: &str = "operation";
    pub const COMPONENT: &str = "component";
    pub const SERVICE: &str = "service";
    pub const ENDPOINT: &str = "endpoint";
    pub const METHOD: &str = "method";

    // Resource identification
    pub const RESOURCE: &str = "resource";
    pub const RESOURCE_ID: &str = "resource_id";
    pub const FIELD: &str = "field";
    pub const ENTITY: &str = "entity";

    // Error context
    pub const ERROR_TYPE: &str = "error_type";
    pub const FAILURE_POINT: &str = "failure_point";
    pub const RETRY_COUNT: &str = "retry_count";
    pub const ATTEMPT: &str = "attempt";
    pub const REASON: &str = "reason";

    // Conflicts and limits
    pub const CONFLICT_FIELD: &str = "conflict_field";
    pub const CONFLICT_VALUE: &str = "conflict_value";
    pub const ACTION: &str = "action";
    pub const LIMIT: &str = "limit";
    pub const WINDOW: &str = "window";

    // External service context
    pub const EXTERNAL_SERVICE: &str = "external_service";
    pub const URL: &str = "url";
    pub const STATUS_CODE: &str = "status_code";
    pub const RESPONSE_TIME: &str = "response_time";

    // Security context
    pub const PERMISSION: &str = "permission";
    pub const ROLE: &str = "role";
    pub const SCOPE: &str = "scope";
    pub const IP_ADDRESS: &str = "ip_address";
    pub const USER_AGENT: &str = "user_agent";

    // Performance
    pub const DURATION: &str = "duration";

    // Tenancy
    pub const TENANT_ID: &str = "tenant_id";
    pub const ORGANIZATION_ID: &str = "organization_id";
    pub const ACCOUNT_ID: &str = "account_id";
    pub const PROJECT_ID: &str = "project_id";
}

// ============================================================================
// Metadata Store
// ============================================================================

/// Lazily allocated metadata map. Lives inside the error's lock.
#[derive(Default)]
pub(crate) struct MetadataStore {
    map: Option<HashMap<String, String>>,
}

impl MetadataStore {
    #[inline]
    pub(crate) const fn new() -> Self {
        Self { map: None }
    }

    /// Insert or overwrite. Allocates the map on first use.
    pub(crate) fn insert(&mut self, key: String, value: String) {
        let map = self.map.get_or_insert_with(HashMap::new);
        if let Some(mut previous) = map.insert(key, value) {
            previous.zeroize();
        }
    }

    #[inline]
    pub(crate) fn get(&self, key: &str) -> Option<String> {
        self.map.as_ref()?.get(key).cloned()
    }

    /// Fresh copy of every entry; empty when never allocated.
    pub(crate) fn snapshot(&self) -> HashMap<String, String> {
        self.map.clone().unwrap_or_default()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.map.as_ref().is_none_or(HashMap::is_empty)
    }

    #[inline]
    pub(crate) fn is_allocated(&self) -> bool {
        self.map.is_some()
    }

    /// Borrowing iterator for renders that already hold the lock.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map
            .iter()
            .flat_map(|map| map.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }
}

impl Zeroize for MetadataStore {
    fn zeroize(&mut self) {
        if let Some(map) = self.map.as_mut() {
            for value in map.values_mut() {
                value.zeroize();
            }
            map.clear();
        }
    }
}

impl Drop for MetadataStore {
    fn drop(&mut self) {
        self.zeroize();
    }
}

// ============================================================================
// Typed Accessors
// ============================================================================

impl CustomError {
    /// Record how many retries preceded this failure.
    pub fn with_retry_count(&self, count: u32) -> &Self {
        self.with_metadata(keys::RETRY_COUNT, count.to_string())
    }

    /// Retry count, if present and numeric.
    pub fn retry_count(&self) -> Option<u32> {
        self.get_metadata(keys::RETRY_COUNT)?.parse().ok()
    }

    /// Record an upstream HTTP status code.
    pub fn with_status_code(&self, status: u16) -> &Self {
        self.with_metadata(keys::STATUS_CODE, status.to_string())
    }

    /// Upstream HTTP status code, if present and numeric.
    pub fn status_code(&self) -> Option<u16> {
        self.get_metadata(keys::STATUS_CODE)?.parse().ok()
    }

    /// Record an elapsed duration, stored as fractional seconds (`"1.5s"`).
    pub fn with_duration(&self, duration: Duration) -> &Self {
        self.with_metadata(keys::DURATION, format_duration(duration))
    }

    /// Elapsed duration, if present and well-formed.
    pub fn duration(&self) -> Option<Duration> {
        parse_duration(&self.get_metadata(keys::DURATION)?)
    }
}

fn format_duration(duration: Duration) -> String {
    format!("{}s", duration.as_secs_f64())
}

fn parse_duration(raw: &str) -> Option<Duration> {
    let secs: f64 = raw.strip_suffix('s')?.parse().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::ErrorCategory;

    fn quiet_error() -> CustomError {
        let config = Config {
            stack_trace_enabled: false,
            ..Config::DEFAULT
        };
        CustomError::from_category_with_config(&config, ErrorCategory::Internal, "X", "boom")
    }

    #[test]
    fn store_is_lazy() {
        let mut store = MetadataStore::new();
        assert!(!store.is_allocated());
        assert!(store.is_empty());
        assert_eq!(store.get("anything"), None);
        assert!(store.snapshot().is_empty());

        store.insert("k".into(), "v".into());
        assert!(store.is_allocated());
        assert_eq!(store.get("k").as_deref(), Some("v"));
    }

    #[test]
    fn store_overwrites() {
        let mut store = MetadataStore::new();
        store.insert("k".into(), "first".into());
        store.insert("k".into(), "second".into());
        assert_eq!(store.get("k").as_deref(), Some("second"));
        assert_eq!(store.iter().count(), 1);
    }

    #[test]
    fn zeroize_clears_entries() {
        let mut store = MetadataStore::new();
        store.insert("secret".into(), "hunter2".into());
        store.zeroize();
        assert!(store.is_empty());
        assert_eq!(store.get("secret"), None);
    }

    #[test]
    fn typed_numbers() {
        let err = quiet_error();
        assert_eq!(err.retry_count(), None);

        err.with_retry_count(4).with_status_code(503);
        assert_eq!(err.retry_count(), Some(4));
        assert_eq!(err.status_code(), Some(503));
        assert_eq!(err.get_metadata(keys::STATUS_CODE).as_deref(), Some("503"));

        err.with_metadata(keys::RETRY_COUNT, "many");
        assert_eq!(err.retry_count(), None);
    }

    #[test]
    fn typed_duration() {
        let err = quiet_error();
        err.with_duration(Duration::from_millis(1500));
        assert_eq!(err.get_metadata(keys::DURATION).as_deref(), Some("1.5s"));
        assert_eq!(err.duration(), Some(Duration::from_millis(1500)));

        err.with_metadata(keys::DURATION, "soon");
        assert_eq!(err.duration(), None);
        err.with_metadata(keys::DURATION, "-1s");
        assert_eq!(err.duration(), None);
    }
}
