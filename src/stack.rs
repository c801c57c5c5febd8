//! Bounded call-stack capture.
//!
//! Errors record where they were constructed as a short list of
//! `(function, file, line)` frames, innermost first.
//!
//! # Capture Rules
//!
//! - Disabled in the active [`Config`]: returns immediately, no stack walk.
//! - Otherwise walks outward from the caller, discarding `skip` frames, and
//!   records at most [`Config::effective_stack_depth`] frames.
//! - `From`/`Into` and `?` glue left directly above the caller is dropped,
//!   so conversions still start the trace at the converting function.
//! - The walk ends early at the first frame that is runtime noise (process
//!   entry point or test harness) or that cannot be resolved to a file and
//!   line. This is best effort, never an error.
//!
//! Frames come from `std::backtrace::Backtrace`; resolution needs debug info
//! in the binary, so release builds without it simply produce shorter (or
//! empty) traces.
//!
//! # Storage
//!
//! [`StackTrace`] keeps up to [`DEFAULT_STACK_DEPTH`] frames inline, matching
//! the default depth, so the common case does not allocate a second buffer.

use crate::config::{self, Config, DEFAULT_STACK_DEPTH};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;

/// Frame sequence stored on an error, innermost frame first.
pub type StackTrace = SmallVec<[StackFrame; DEFAULT_STACK_DEPTH]>;

/// Function name fragments marking the process entry point.
pub const ENTRY_POINT_PATTERNS: [&str; 2] = ["__rust_begin_short_backtrace", "std::rt::lang_start"];

/// Function name fragments marking the libtest harness.
pub const TEST_HARNESS_PATTERNS: [&str; 2] = ["test::run_test", "test::__rust_begin_short_backtrace"];

/// Frames belonging to the backtrace machinery and to this module's own
/// capture functions. Always discarded before `skip` is applied.
const CAPTURE_MACHINERY: [&str; 3] = [
    "std::backtrace",
    "<std::backtrace",
    concat!(module_path!(), "::capture"),
];

/// Conversion glue that `.into()` and `?` place between a `From` impl and
/// its caller. Dropped when it directly follows the skipped frames.
const CONVERSION_GLUE: [&str; 2] = ["core::convert::", "core::ops::try_trait::FromResidual"];

// ============================================================================
// Stack Frame
// ============================================================================

/// One resolved call-stack frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StackFrame {
    /// Fully qualified function name.
    pub function: String,
    /// Source file path as recorded in debug info.
    pub file: String,
    /// 1-based line number.
    pub line: u32,
}

impl StackFrame {
    /// Build a frame by hand (tests, replayed traces).
    pub fn new(function: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        Self {
            function: function.into(),
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for StackFrame {
    /// Two-line form used by detailed renders: function, then indented `file:line`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "  {}\n    {}:{}", self.function, self.file, self.line)
    }
}

// ============================================================================
// Capture
// ============================================================================

/// Capture the caller's stack using the effective configuration.
///
/// `skip` counts frames to drop *above* the caller of this function: 0 makes
/// the caller the first recorded frame.
#[inline(never)]
pub fn capture(skip: usize) -> StackTrace {
    capture_with(&config::config(), skip)
}

/// Capture the caller's stack using an explicit configuration.
#[inline(never)]
pub fn capture_with(config: &Config, skip: usize) -> StackTrace {
    if !config.stack_trace_enabled {
        return StackTrace::new();
    }

    let backtrace = Backtrace::force_capture();
    if backtrace.status() != BacktraceStatus::Captured {
        return StackTrace::new();
    }

    let rendered = backtrace.to_string();
    collect_frames(&rendered, skip, config.effective_stack_depth())
}

/// Turn a rendered backtrace into bounded frames.
fn collect_frames(rendered: &str, skip: usize, max_depth: usize) -> StackTrace {
    let mut frames = StackTrace::new();

    let walk = parse_rendered(rendered)
        .into_iter()
        .skip_while(|raw| is_capture_machinery(raw.function))
        .skip(skip)
        .skip_while(|raw| is_conversion_glue(raw.function));

    for raw in walk {
        if frames.len() >= max_depth || is_runtime_noise(raw.function) {
            break;
        }
        let Some((file, line)) = raw.location else {
            break;
        };
        if line == 0 || raw.function == "<unknown>" {
            break;
        }
        frames.push(StackFrame::new(raw.function, file, line));
    }

    frames
}

#[inline]
fn is_capture_machinery(function: &str) -> bool {
    CAPTURE_MACHINERY.iter().any(|p| function.starts_with(p))
}

#[inline]
fn is_conversion_glue(function: &str) -> bool {
    CONVERSION_GLUE.iter().any(|p| function.contains(p))
}

#[inline]
fn is_runtime_noise(function: &str) -> bool {
    ENTRY_POINT_PATTERNS
        .iter()
        .chain(TEST_HARNESS_PATTERNS.iter())
        .any(|p| function.contains(p))
}

// ============================================================================
// Backtrace Text Parsing
// ============================================================================

struct RawFrame<'a> {
    function: &'a str,
    location: Option<(&'a str, u32)>,
}

/// Parse std's rendering:
///
/// ```text
///    3: my_crate::handler
///              at ./src/handler.rs:42:9
///       my_crate::inlined_helper
///              at ./src/helper.rs:7:5
/// ```
fn parse_rendered(rendered: &str) -> Vec<RawFrame<'_>> {
    let mut frames: Vec<RawFrame<'_>> = Vec::new();

    for line in rendered.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("note:") {
            continue;
        }
        if let Some(location) = trimmed.strip_prefix("at ") {
            if let Some(last) = frames.last_mut() {
                if last.location.is_none() {
                    last.location = parse_location(location);
                }
            }
            continue;
        }
        frames.push(RawFrame {
            function: strip_frame_prefix(trimmed),
            location: None,
        });
    }

    frames
}

/// Drop the `N: ` index and an optional `0x... - ` address.
fn strip_frame_prefix(line: &str) -> &str {
    let line = match line.split_once(": ") {
        Some((index, rest)) if !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()) => rest,
        _ => line,
    };
    match line.split_once(" - ") {
        Some((address, rest)) if address.starts_with("0x") => rest,
        _ => line,
    }
}

/// `file:line:col` or `file:line`. Paths may themselves contain `:`.
fn parse_location(location: &str) -> Option<(&str, u32)> {
    let (head, last) = split_numeric_suffix(location)?;
    match split_numeric_suffix(head) {
        Some((file, line)) => Some((file, line)),
        None => Some((head, last)),
    }
}

fn split_numeric_suffix(s: &str) -> Option<(&str, u32)> {
    let (head, tail) = s.rsplit_once(':')?;
    let number = tail.parse().ok()?;
    Some((head, number))
}

// ============================================================================
// Rendering & Filtering
// ============================================================================

/// Render frames one per two lines, each followed by a newline.
/// Empty input renders as the empty string.
pub fn format_frames(frames: &[StackFrame]) -> String {
    let mut out = String::new();
    for frame in frames {
        out.push_str(&frame.to_string());
        out.push('\n');
    }
    out
}

/// Remove every frame whose function contains any of `patterns`.
pub(crate) fn remove_matching<S: AsRef<str>>(frames: &mut StackTrace, patterns: &[S]) {
    if patterns.is_empty() {
        return;
    }
    frames.retain(|frame| {
        !patterns
            .iter()
            .any(|p| frame.function.contains(p.as_ref()))
    });
}
