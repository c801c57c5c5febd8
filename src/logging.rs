//! Structured log output for errors.
//!
//! Three shapes, from richest to leanest:
//!
//! - [`CustomError::to_log_fields`]: flat, ordered field map for JSON logs
//! - [`CustomError::log`] / [`CustomError::log_error`]: one `tracing` event on
//!   target `contextual_errors` carrying those fields
//! - [`InternalLog`]: borrowed single-line `key='value'` record for plain
//!   text sinks, written without building intermediate strings
//!
//! # Field Set
//!
//! | Field                | Present when          |
//! |----------------------|-----------------------|
//! | `error_category`     | always                |
//! | `error_code`         | always                |
//! | `error_message`      | always                |
//! | `timestamp`          | always (RFC 3339)     |
//! | `request_id`         | request id set        |
//! | `meta_{key}`         | one per metadata key  |
//! | `wrapped_error`      | error has a cause     |
//! | `has_stack_trace`    | frames captured       |
//! | `stack_depth`        | frames captured       |
//! | `top_frame_function` | frames captured       |
//! | `top_frame_file`     | frames captured       |
//! | `top_frame_line`     | frames captured       |
//!
//! These are full, unfiltered values. Log sinks are operator-facing; use the
//! client renders for anything leaving the trust boundary.

use crate::stack::StackFrame;
use crate::{CustomError, ErrorCategory};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;

/// Maximum length for any individual value in `InternalLog` output
const MAX_FIELD_OUTPUT_LEN: usize = 1024;

/// Truncation indicator appended to truncated values
const TRUNCATION_INDICATOR: &str = "...[TRUNCATED]";

/// Flat, key-ordered structured log fields.
pub type LogFields = BTreeMap<String, Value>;

// ============================================================================
// Log Level
// ============================================================================

/// Severity for [`CustomError::log`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    /// Diagnostic detail.
    Debug,
    /// Expected, handled failures.
    Info,
    /// Degraded but recovered.
    Warn,
    /// Request failed.
    Error,
}

impl LogLevel {
    /// Lowercase name.
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

// ============================================================================
// Structured Fields & Tracing
// ============================================================================

// `tracing` needs the level at the call site as a constant.
macro_rules! emit {
    ($level:expr, $category:expr, $code:expr, $request_id:expr, $short:expr, $fields:expr, $message:expr) => {
        tracing::event!(
            target: "contextual_errors",
            $level,
            error.category = $category,
            error.code = $code,
            error.request_id = $request_id,
            error.short = %$short,
            error.fields = %$fields,
            "{}",
            $message
        )
    };
}

impl CustomError {
    /// Flat field map for structured logging.
    pub fn to_log_fields(&self) -> LogFields {
        let mut fields = LogFields::new();
        fields.insert("error_category".into(), self.category().as_str().into());
        fields.insert("error_code".into(), self.code().into());
        fields.insert("error_message".into(), self.message().into());
        fields.insert("timestamp".into(), self.timestamp_rfc3339().into());

        self.inspect_state(|request_id, metadata, frames| {
            if let Some(id) = request_id {
                fields.insert("request_id".into(), id.into());
            }
            for (key, value) in metadata.iter() {
                fields.insert(format!("meta_{key}"), value.into());
            }
            if let Some(top) = frames.first() {
                fields.insert("has_stack_trace".into(), true.into());
                fields.insert("stack_depth".into(), frames.len().into());
                fields.insert("top_frame_function".into(), top.function.as_str().into());
                fields.insert("top_frame_file".into(), top.file.as_str().into());
                fields.insert("top_frame_line".into(), top.line.into());
            }
        });

        if let Some(wrapped) = self.wrapped() {
            fields.insert("wrapped_error".into(), wrapped.to_string().into());
        }

        fields
    }

    /// Emit one `tracing` event at `level` with `message` and this error's fields.
    pub fn log(&self, level: LogLevel, message: &str) {
        let fields = Value::Object(self.to_log_fields().into_iter().collect());
        let request_id = self.request_id().unwrap_or_default();
        let short = self.short_error();
        let category = self.category().as_str();
        let code = self.code();

        match level {
            LogLevel::Debug => emit!(tracing::Level::DEBUG, category, code, request_id.as_str(), short, fields, message),
            LogLevel::Info => emit!(tracing::Level::INFO, category, code, request_id.as_str(), short, fields, message),
            LogLevel::Warn => emit!(tracing::Level::WARN, category, code, request_id.as_str(), short, fields, message),
            LogLevel::Error => emit!(tracing::Level::ERROR, category, code, request_id.as_str(), short, fields, message),
        }
    }

    /// Emit this error at `Error` level, using its own message.
    pub fn log_error(&self) {
        self.log(LogLevel::Error, self.message());
    }

    /// Borrow a single-line log view. The view lives only inside `f`.
    ///
    /// ```rust
    /// use contextual_errors::{CustomError, ErrorCategory};
    ///
    /// let err = CustomError::from_category(ErrorCategory::Timeout, "DB_SLOW", "query timed out");
    /// err.with_metadata("operation", "load_user");
    ///
    /// let line = err.with_internal_log(|log| {
    ///     let mut buffer = String::new();
    ///     log.write_to(&mut buffer).map(|_| buffer)
    /// }).unwrap();
    /// assert!(line.starts_with("[timeout/DB_SLOW] message='query timed out'"));
    /// assert!(line.contains("operation='load_user'"));
    /// ```
    pub fn with_internal_log<R>(&self, f: impl FnOnce(&InternalLog<'_>) -> R) -> R {
        self.inspect_state(|request_id, metadata, frames| {
            let mut entries: Vec<(&str, &str)> = metadata.iter().collect();
            entries.sort_unstable();
            let log = InternalLog {
                category: self.category(),
                code: self.code(),
                message: self.message(),
                request_id,
                wrapped: self.wrapped().map(|e| e as &(dyn Error + 'static)),
                metadata: &entries,
                stack: frames,
            };
            f(&log)
        })
    }
}

// ============================================================================
// Internal Log View
// ============================================================================

/// Borrowed log record tied to the error (and its lock) that produced it.
#[derive(Debug)]
pub struct InternalLog<'a> {
    /// Error category.
    pub category: ErrorCategory,
    /// Machine code.
    pub code: &'a str,
    /// Full, unfiltered message.
    pub message: &'a str,
    /// Correlation id, if set.
    pub request_id: Option<&'a str>,
    /// Direct cause.
    pub wrapped: Option<&'a (dyn Error + 'static)>,
    /// Metadata, sorted by key.
    pub metadata: &'a [(&'a str, &'a str)],
    /// Captured frames, innermost first.
    pub stack: &'a [StackFrame],
}

impl<'a> InternalLog<'a> {
    /// Write `[category/code] message='..' request_id='..' wrapped='..'
    /// key='value'... stack_depth=N top_frame='fn@file:line'` on one line.
    ///
    /// Every value is cut at 1024 bytes on a character boundary and marked
    /// with `...[TRUNCATED]`.
    pub fn write_to(&self, f: &mut impl fmt::Write) -> fmt::Result {
        write!(
            f,
            "[{}/{}] message='{}'",
            self.category,
            truncate_with_indicator(self.code),
            truncate_with_indicator(self.message)
        )?;

        if let Some(id) = self.request_id {
            write!(f, " request_id='{}'", truncate_with_indicator(id))?;
        }

        if let Some(wrapped) = self.wrapped {
            let rendered = wrapped.to_string();
            write!(f, " wrapped='{}'", truncate_with_indicator(&rendered))?;
        }

        for (key, value) in self.metadata {
            write!(
                f,
                " {}='{}'",
                truncate_with_indicator(key),
                truncate_with_indicator(value)
            )?;
        }

        if let Some(top) = self.stack.first() {
            write!(
                f,
                " stack_depth={} top_frame='{}@{}:{}'",
                self.stack.len(),
                truncate_with_indicator(&top.function),
                truncate_with_indicator(&top.file),
                top.line
            )?;
        }

        Ok(())
    }
}

/// Cut `s` to at most `MAX_FIELD_OUTPUT_LEN` bytes, indicator included.
/// Borrows when no cut is needed.
fn truncate_with_indicator(s: &str) -> Cow<'_, str> {
    if s.len() <= MAX_FIELD_OUTPUT_LEN {
        return Cow::Borrowed(s);
    }

    let max_content_len = MAX_FIELD_OUTPUT_LEN.saturating_sub(TRUNCATION_INDICATOR.len());

    let mut idx = max_content_len;
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }

    if idx == 0 {
        return Cow::Borrowed(TRUNCATION_INDICATOR);
    }

    let mut result = String::with_capacity(idx + TRUNCATION_INDICATOR.len());
    result.push_str(&s[..idx]);
    result.push_str(TRUNCATION_INDICATOR);
    Cow::Owned(result)
}
