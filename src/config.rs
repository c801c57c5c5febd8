//! Configuration consulted at error construction and render time.
//!
//! Three knobs control the library:
//!
//! - `stack_trace_enabled`: capture a stack when an error is constructed
//! - `max_stack_depth`: bound on captured frames (0 selects the default of 10)
//! - `production_mode`: filter client renders (see [`CustomError::to_client_json`])
//!
//! # Resolution Order
//!
//! [`config()`] returns the *effective* configuration for the caller:
//!
//! 1. the task-local scope installed by [`scope_config`] (feature `tokio`)
//! 2. the thread-local scope installed by [`with_config`]
//! 3. the process-wide value set by [`set_config`]
//!
//! Every read hands out a copy. Holding a stale `Config` across a later
//! [`set_config`] is well-defined: the holder keeps seeing the old settings
//! until it reads again.
//!
//! Code that prefers explicit dependency passing can ignore the ambient value
//! entirely and call the `*_with_config` constructors and `*_with` renderers.
//!
//! # Example
//!
//! ```rust
//! use contextual_errors::config::{self, Config};
//!
//! let prod = Config::production();
//! let mode = config::with_config(prod, || config::config().production_mode);
//! assert!(mode);
//! ```
//!
//! [`CustomError::to_client_json`]: crate::CustomError::to_client_json

use std::cell::Cell;
use std::fmt;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Default number of frames captured when no depth is configured.
pub const DEFAULT_STACK_DEPTH: usize = 10;

/// Hard ceiling on captured frames regardless of configuration.
pub const STACK_DEPTH_CEILING: usize = 64;

/// Environment variable toggling stack capture.
pub const ENV_ENABLE_STACK_TRACE: &str = "CTXERR_ENABLE_STACK_TRACE";
/// Environment variable holding the maximum stack depth.
pub const ENV_MAX_STACK_DEPTH: &str = "CTXERR_MAX_STACK_DEPTH";
/// Environment variable toggling production mode.
pub const ENV_PRODUCTION_MODE: &str = "CTXERR_PRODUCTION_MODE";

// ============================================================================
// Config Value
// ============================================================================

/// Snapshot of library settings. Plain `Copy` data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Capture a stack trace when an error is constructed.
    pub stack_trace_enabled: bool,
    /// Maximum number of frames to capture; 0 selects [`DEFAULT_STACK_DEPTH`].
    pub max_stack_depth: usize,
    /// Filter messages and metadata in client-facing renders.
    pub production_mode: bool,
}

impl Config {
    /// Stack capture on, depth 10, production mode off.
    pub const DEFAULT: Config = Config {
        stack_trace_enabled: true,
        max_stack_depth: DEFAULT_STACK_DEPTH,
        production_mode: false,
    };

    /// Development settings: full detail everywhere.
    #[inline]
    pub const fn development() -> Self {
        Self::DEFAULT
    }

    /// Production settings: no stack capture, filtered client renders.
    #[inline]
    pub const fn production() -> Self {
        Self {
            stack_trace_enabled: false,
            max_stack_depth: DEFAULT_STACK_DEPTH,
            production_mode: true,
        }
    }

    /// Number of frames the stack capturer may record under this config.
    #[inline]
    pub const fn effective_stack_depth(&self) -> usize {
        let depth = if self.max_stack_depth == 0 {
            DEFAULT_STACK_DEPTH
        } else {
            self.max_stack_depth
        };
        if depth > STACK_DEPTH_CEILING {
            STACK_DEPTH_CEILING
        } else {
            depth
        }
    }

    /// Load settings from the process environment.
    ///
    /// Unset variables keep their [`Config::DEFAULT`] value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary key lookup.
    ///
    /// Same rules as [`Config::from_env`]; useful for layered configuration
    /// sources and for tests.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a present value cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::DEFAULT;

        if let Some(raw) = lookup(ENV_ENABLE_STACK_TRACE) {
            config.stack_trace_enabled = parse_bool(ENV_ENABLE_STACK_TRACE, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MAX_STACK_DEPTH) {
            let depth: i64 = raw.trim().parse().map_err(|_| ConfigError::InvalidDepth {
                var: ENV_MAX_STACK_DEPTH,
                value: raw.clone(),
            })?;
            // Non-positive depths mean "use the default".
            config.max_stack_depth = usize::try_from(depth.max(0)).unwrap_or(usize::MAX);
        }
        if let Some(raw) = lookup(ENV_PRODUCTION_MODE) {
            config.production_mode = parse_bool(ENV_PRODUCTION_MODE, &raw)?;
        }

        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::DEFAULT
    }
}

fn parse_bool(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            var,
            value: raw.to_owned(),
        }),
    }
}

// ============================================================================
// Config Errors
// ============================================================================

/// Failure to parse a configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Value is not a recognized boolean spelling.
    InvalidBool { var: &'static str, value: String },
    /// Value is not an integer.
    InvalidDepth { var: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidBool { var, value } => {
                write!(f, "{} must be a boolean, got '{}'", var, value)
            }
            Self::InvalidDepth { var, value } => {
                write!(f, "{} must be an integer, got '{}'", var, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Process-wide Value
// ============================================================================

static GLOBAL_CONFIG: RwLock<Config> = RwLock::new(Config::DEFAULT);

#[inline]
fn read_global() -> RwLockReadGuard<'static, Config> {
    match GLOBAL_CONFIG.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[inline]
fn write_global() -> RwLockWriteGuard<'static, Config> {
    match GLOBAL_CONFIG.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Replace the process-wide configuration wholesale.
pub fn set_config(config: Config) {
    *write_global() = config;
    tracing::debug!(
        target: "contextual_errors",
        stack_trace_enabled = config.stack_trace_enabled,
        max_stack_depth = config.max_stack_depth,
        production_mode = config.production_mode,
        "error configuration replaced"
    );
}

/// Copy of the process-wide configuration, ignoring any scoped override.
pub fn global_config() -> Config {
    *read_global()
}

// ============================================================================
// Scoped Overrides
// ============================================================================

// Per-thread override installed by `with_config`. Never shared across threads.
thread_local! {
    static SCOPED_CONFIG: Cell<Option<Config>> = const { Cell::new(None) };
}

#[cfg(feature = "tokio")]
tokio::task_local! {
    static TASK_CONFIG: Config;
}

/// Restores the previous thread-local override, also during unwinding.
struct ScopeGuard {
    previous: Option<Config>,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        SCOPED_CONFIG.with(|slot| slot.set(self.previous));
    }
}

/// Effective configuration for the calling thread or task.
pub fn config() -> Config {
    #[cfg(feature = "tokio")]
    if let Ok(config) = TASK_CONFIG.try_with(|c| *c) {
        return config;
    }

    if let Some(config) = SCOPED_CONFIG.with(Cell::get) {
        return config;
    }

    global_config()
}

/// Run `f` with `config` as the effective configuration on this thread.
///
/// Scopes nest; the previous override is restored when `f` returns or
/// unwinds. Other threads are unaffected.
pub fn with_config<F, R>(config: Config, f: F) -> R
where
    F: FnOnce() -> R,
{
    let previous = SCOPED_CONFIG.with(|slot| slot.replace(Some(config)));
    let _guard = ScopeGuard { previous };
    f()
}

/// Run `future` with `config` as the effective configuration for the task.
///
/// Unlike [`with_config`], the override follows the future across worker
/// threads of a multi-threaded runtime.
#[cfg(feature = "tokio")]
pub async fn scope_config<F>(config: Config, future: F) -> F::Output
where
    F: std::future::Future,
{
    TASK_CONFIG.scope(config, future).await
}
