//! The error value: category, code, message, cause, and mutable context.
//!
//! # Architecture
//!
//! A [`CustomError`] splits into two halves:
//!
//! - **Write-once identity**: category, code, message, wrapped cause, sentinel
//!   and creation timestamp. Fixed at construction, read without locking.
//! - **Mutable context**: metadata, request id and stack trace. Guarded by a
//!   single `RwLock` owned by the instance, so several holders of one
//!   `Arc<CustomError>` can enrich it concurrently.
//!
//! Errors never contend with each other: there is no global lock on the hot
//! path. Configuration is read once per constructor call.
//!
//! # Construction
//!
//! Every public constructor funnels into one non-inlined `construct`, which
//! stamps the UTC timestamp and captures the stack under the configuration
//! in force at that instant. Changing the configuration later never adds or
//! removes a trace on an existing error.
//!
//! # Lock Poisoning
//!
//! A panic while holding the state lock cannot leave the state half-written
//! (every critical section is a single assignment or copy), so poisoned guards
//! are recovered rather than propagated.
//!
//! # Example
//!
//! ```rust
//! use contextual_errors::{CustomError, Sentinel};
//!
//! let err = CustomError::from_sentinel(Sentinel::NotFound, None, "user not found");
//! err.with_metadata("user_id", "usr_1").with_request_id("req-7");
//!
//! assert_eq!(err.to_http_status(), 404);
//! assert_eq!(err.short_error(), "[req-7] not_found (NOT_FOUND): user not found");
//! ```

use crate::config::{self, Config};
use crate::context::MetadataStore;
use crate::stack::{self, StackFrame, StackTrace};
use crate::{ErrorCategory, Sentinel};
use chrono::{DateTime, Utc};
use std::borrow::Cow;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use zeroize::Zeroize;

/// Owned, thread-safe error accepted as a cause by constructors.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Shared handle to a wrapped cause.
pub type Cause = Arc<dyn Error + Send + Sync + 'static>;

/// Frames between `construct` and the user: `construct` itself plus the
/// public entry point that called it.
const LIBRARY_FRAMES: usize = 2;

// ============================================================================
// Guarded State
// ============================================================================

struct State {
    metadata: MetadataStore,
    request_id: Option<String>,
    stack_trace: StackTrace,
    stack_trace_cleared: bool,
}

impl Drop for State {
    fn drop(&mut self) {
        if let Some(id) = self.request_id.as_mut() {
            id.zeroize();
        }
    }
}

/// Construction inputs after the entry point has resolved category and code.
pub(crate) struct Parts {
    pub(crate) category: ErrorCategory,
    pub(crate) code: Cow<'static, str>,
    pub(crate) message: String,
    pub(crate) wrapped: Option<Cause>,
    pub(crate) sentinel: Option<Sentinel>,
}

impl Parts {
    pub(crate) fn from_sentinel(sentinel: Sentinel, wrapped: Option<Cause>, message: String) -> Self {
        Self {
            category: sentinel.category(),
            code: Cow::Borrowed(sentinel.code()),
            message,
            wrapped,
            sentinel: Some(sentinel),
        }
    }
}

// ============================================================================
// Custom Error
// ============================================================================

/// Categorized error carrying metadata, a request id and a captured stack.
///
/// Mutators take `&self` and return `&Self`, so calls chain and work through
/// shared references:
///
/// ```rust
/// use contextual_errors::{CustomError, ErrorCategory};
/// use std::sync::Arc;
///
/// let err = Arc::new(CustomError::from_category(ErrorCategory::Validation, "BAD_EMAIL", "email is malformed"));
/// let worker = {
///     let err = Arc::clone(&err);
///     std::thread::spawn(move || {
///         err.with_metadata("field", "email");
///     })
/// };
/// worker.join().unwrap();
/// assert_eq!(err.get_metadata("field").as_deref(), Some("email"));
/// ```
pub struct CustomError {
    category: ErrorCategory,
    code: Cow<'static, str>,
    message: String,
    wrapped: Option<Cause>,
    sentinel: Option<Sentinel>,
    timestamp: DateTime<Utc>,
    state: RwLock<State>,
}

impl CustomError {
    // ------------------------------------------------------------------------
    // Constructors
    // ------------------------------------------------------------------------

    /// Build an error from a well-known sentinel.
    ///
    /// Category and code come from the sentinel table. The stack is captured
    /// under the effective configuration.
    #[inline(never)]
    pub fn from_sentinel(sentinel: Sentinel, wrapped: Option<BoxError>, message: impl Into<String>) -> Self {
        Self::construct(
            &config::config(),
            Parts::from_sentinel(sentinel, wrapped.map(Cause::from), message.into()),
        )
    }

    /// [`from_sentinel`](Self::from_sentinel) with an explicit configuration.
    #[inline(never)]
    pub fn from_sentinel_with_config(
        config: &Config,
        sentinel: Sentinel,
        wrapped: Option<BoxError>,
        message: impl Into<String>,
    ) -> Self {
        Self::construct(
            config,
            Parts::from_sentinel(sentinel, wrapped.map(Cause::from), message.into()),
        )
    }

    /// Build an error with an explicit category and code, no sentinel.
    #[inline(never)]
    pub fn from_category(
        category: ErrorCategory,
        code: impl Into<Cow<'static, str>>,
        message: impl Into<String>,
    ) -> Self {
        Self::construct(
            &config::config(),
            Parts {
                category,
                code: code.into(),
                message: message.into(),
                wrapped: None,
                sentinel: None,
            },
        )
    }

    /// [`from_category`](Self::from_category) with an explicit configuration.
    #[inline(never)]
    pub fn from_category_with_config(
        config: &Config,
        category: ErrorCategory,
        code: impl Into<Cow<'static, str>>,
        message: impl Into<String>,
    ) -> Self {
        Self::construct(
            config,
            Parts {
                category,
                code: code.into(),
                message: message.into(),
                wrapped: None,
                sentinel: None,
            },
        )
    }

    /// Wrap any error under a caller-chosen category and code.
    ///
    /// The category of `err` is never inherited, even when `err` is itself a
    /// `CustomError`.
    #[inline(never)]
    pub fn wrap<E>(
        err: E,
        category: ErrorCategory,
        code: impl Into<Cow<'static, str>>,
        message: impl Into<String>,
    ) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Self::construct(
            &config::config(),
            Parts {
                category,
                code: code.into(),
                message: message.into(),
                wrapped: Some(Arc::new(err)),
                sentinel: None,
            },
        )
    }

    /// Wrap any error, classifying it by the sentinels in its chain.
    ///
    /// A chain without a recognized sentinel is treated as internal.
    #[inline(never)]
    pub fn from_error<E>(err: E, message: impl Into<String>) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        let sentinel = Sentinel::classify(&err).unwrap_or(Sentinel::Internal);
        Self::construct(
            &config::config(),
            Parts::from_sentinel(sentinel, Some(Arc::new(err)), message.into()),
        )
    }

    /// Single construction path. Callers must be public entry points invoked
    /// directly by user code, so that `LIBRARY_FRAMES` stays accurate.
    #[inline(never)]
    pub(crate) fn construct(config: &Config, parts: Parts) -> Self {
        let stack_trace = stack::capture_with(config, LIBRARY_FRAMES);

        let err = Self {
            category: parts.category,
            code: parts.code,
            message: parts.message,
            wrapped: parts.wrapped,
            sentinel: parts.sentinel,
            timestamp: Utc::now(),
            state: RwLock::new(State {
                metadata: MetadataStore::new(),
                request_id: None,
                stack_trace,
                stack_trace_cleared: false,
            }),
        };

        tracing::trace!(
            target: "contextual_errors",
            category = err.category.as_str(),
            code = %err.code,
            "error constructed"
        );

        err
    }

    // ------------------------------------------------------------------------
    // Lock helpers
    // ------------------------------------------------------------------------

    #[inline]
    fn read_state(&self) -> RwLockReadGuard<'_, State> {
        match self.state.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[inline]
    fn write_state(&self) -> RwLockWriteGuard<'_, State> {
        match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    // ------------------------------------------------------------------------
    // Write-once identity
    // ------------------------------------------------------------------------

    /// Classification fixed at construction.
    #[inline]
    pub const fn category(&self) -> ErrorCategory {
        self.category
    }

    /// Machine-readable code.
    #[inline]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Human-readable message as given at construction.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Sentinel this error was built from, if any.
    #[inline]
    pub const fn sentinel(&self) -> Option<Sentinel> {
        self.sentinel
    }

    /// Creation time (UTC).
    #[inline]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Direct cause, if any. Same value as `source()`, with thread-safety bounds.
    #[inline]
    pub fn wrapped(&self) -> Option<&(dyn Error + Send + Sync + 'static)> {
        self.wrapped.as_deref()
    }

    /// Shared handle to the direct cause.
    #[inline]
    pub fn wrapped_shared(&self) -> Option<Cause> {
        self.wrapped.clone()
    }

    // ------------------------------------------------------------------------
    // Metadata
    // ------------------------------------------------------------------------

    /// Insert or overwrite a metadata entry.
    pub fn with_metadata(&self, key: impl Into<String>, value: impl Into<String>) -> &Self {
        self.write_state().metadata.insert(key.into(), value.into());
        self
    }

    /// Copy of one metadata value.
    pub fn get_metadata(&self, key: &str) -> Option<String> {
        self.read_state().metadata.get(key)
    }

    /// Copy of all metadata. Empty when nothing was ever written.
    pub fn get_all_metadata(&self) -> HashMap<String, String> {
        self.read_state().metadata.snapshot()
    }

    /// True when at least one metadata entry exists.
    pub fn has_metadata(&self) -> bool {
        !self.read_state().metadata.is_empty()
    }

    // ------------------------------------------------------------------------
    // Request id
    // ------------------------------------------------------------------------

    /// Set the correlation id. Last write wins; an empty id clears it.
    pub fn with_request_id(&self, request_id: impl Into<String>) -> &Self {
        let request_id = request_id.into();
        let mut state = self.write_state();
        if let Some(previous) = state.request_id.as_mut() {
            previous.zeroize();
        }
        state.request_id = (!request_id.is_empty()).then_some(request_id);
        self
    }

    /// Current correlation id.
    pub fn request_id(&self) -> Option<String> {
        self.read_state().request_id.clone()
    }

    // ------------------------------------------------------------------------
    // Stack trace
    // ------------------------------------------------------------------------

    /// Copy of the captured frames, innermost first.
    pub fn get_stack_trace(&self) -> Vec<StackFrame> {
        self.read_state().stack_trace.to_vec()
    }

    /// Frames rendered two lines each; `""` when there is no trace.
    pub fn get_stack_trace_string(&self) -> String {
        stack::format_frames(&self.read_state().stack_trace)
    }

    /// True when frames are stored.
    pub fn has_stack_trace(&self) -> bool {
        !self.read_state().stack_trace.is_empty()
    }

    /// True after [`clear_stack_trace`](Self::clear_stack_trace) until the
    /// next [`with_stack_trace`](Self::with_stack_trace).
    pub fn is_stack_trace_cleared(&self) -> bool {
        self.read_state().stack_trace_cleared
    }

    /// Drop every frame whose function name contains any of `patterns`.
    pub fn filter_stack_trace<S: AsRef<str>>(&self, patterns: &[S]) -> &Self {
        stack::remove_matching(&mut self.write_state().stack_trace, patterns);
        self
    }

    /// Replace the trace with a copy of `frames`.
    pub fn with_stack_trace(&self, frames: &[StackFrame]) -> &Self {
        let mut state = self.write_state();
        state.stack_trace = frames.iter().cloned().collect();
        state.stack_trace_cleared = false;
        self
    }

    /// Remove the trace and mark it as explicitly cleared.
    pub fn clear_stack_trace(&self) -> &Self {
        let mut state = self.write_state();
        state.stack_trace = StackTrace::new();
        state.stack_trace_cleared = true;
        self
    }

    // ------------------------------------------------------------------------
    // Renders
    // ------------------------------------------------------------------------

    /// Multi-line operator-facing render.
    ///
    /// ```text
    /// Error: user not found
    /// Category: not_found, Code: NOT_FOUND
    /// RequestID: req-7
    /// Metadata:
    ///   user_id: usr_1
    /// Wrapped: connection refused
    /// Stack Trace:
    ///   app::handlers::load_user
    ///     src/handlers.rs:42
    /// ```
    ///
    /// Metadata lines are sorted by key.
    pub fn detailed_error(&self) -> String {
        use fmt::Write;

        let state = self.read_state();
        let mut out = String::with_capacity(128);

        // Writing into a String cannot fail.
        let _ = writeln!(out, "Error: {}", self.message);
        let _ = writeln!(out, "Category: {}, Code: {}", self.category, self.code);

        if let Some(id) = &state.request_id {
            let _ = writeln!(out, "RequestID: {}", id);
        }

        if !state.metadata.is_empty() {
            let mut entries: Vec<_> = state.metadata.iter().collect();
            entries.sort_unstable();
            out.push_str("Metadata:\n");
            for (key, value) in entries {
                let _ = writeln!(out, "  {}: {}", key, value);
            }
        }

        if let Some(wrapped) = &self.wrapped {
            let _ = writeln!(out, "Wrapped: {}", wrapped);
        }

        if !state.stack_trace.is_empty() {
            out.push_str("Stack Trace:\n");
            out.push_str(&stack::format_frames(&state.stack_trace));
        }

        out
    }

    /// One-line render for log lines. Never includes metadata.
    ///
    /// Line breaks inside the request id, code or message are written as the
    /// escapes `\n` and `\r`, so the result is always a single line.
    pub fn short_error(&self) -> String {
        let state = self.read_state();
        let code = single_line(&self.code);
        let message = single_line(&self.message);
        match &state.request_id {
            Some(id) => format!("[{}] {} ({}): {}", single_line(id), self.category, code, message),
            None => format!("{} ({}): {}", self.category, code, message),
        }
    }

    /// Run `f` with the mutable context locked for reading.
    pub(crate) fn inspect_state<R>(
        &self,
        f: impl FnOnce(Option<&str>, &MetadataStore, &[StackFrame]) -> R,
    ) -> R {
        let state = self.read_state();
        f(state.request_id.as_deref(), &state.metadata, &state.stack_trace)
    }
}

fn single_line(text: &str) -> Cow<'_, str> {
    if !text.contains(['\n', '\r']) {
        return Cow::Borrowed(text);
    }
    Cow::Owned(text.replace('\n', "\\n").replace('\r', "\\r"))
}

impl fmt::Display for CustomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.wrapped {
            Some(wrapped) => write!(f, "{}: {}", self.message, wrapped),
            None => f.write_str(&self.message),
        }
    }
}

impl fmt::Debug for CustomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read_state();
        f.debug_struct("CustomError")
            .field("category", &self.category)
            .field("code", &self.code)
            .field("message", &self.message)
            .field("sentinel", &self.sentinel)
            .field("request_id", &state.request_id)
            .field("metadata_keys", &state.metadata.iter().count())
            .field("stack_depth", &state.stack_trace.len())
            .field("wrapped", &self.wrapped)
            .finish()
    }
}

impl Error for CustomError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.wrapped
            .as_deref()
            .map(|err| err as &(dyn Error + 'static))
    }
}

impl From<Sentinel> for CustomError {
    /// Error carrying the sentinel's canonical message.
    #[inline(never)]
    fn from(sentinel: Sentinel) -> Self {
        Self::construct(
            &config::config(),
            Parts::from_sentinel(sentinel, None, sentinel.message().to_owned()),
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
