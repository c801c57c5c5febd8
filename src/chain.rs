//! Error-chain traversal over `std::error::Error::source`.
//!
//! [`CustomError`] exposes its cause through `source()`, so any tool that
//! walks standard chains already sees through it. This module adds the
//! matching operations on top:
//!
//! - [`ErrorChainExt::chain`]: iterate an error and all of its causes
//! - [`ErrorChainExt::find_cause`]: first link of a concrete type
//! - [`ErrorChainExt::is_caused_by`]: equality match at any depth
//! - [`ErrorChainExt::has_sentinel`]: sentinel match at any depth, including
//!   sentinels carried by `CustomError` links
//!
//! The free functions (`category_of`, `code_of`, ...) read the *first*
//! `CustomError` in a chain and fall back to the internal bucket when the
//! chain contains none.
//!
//! # Example
//!
//! ```rust
//! use contextual_errors::{CustomError, ErrorCategory, ErrorChainExt, Sentinel};
//!
//! let storage = CustomError::from_sentinel(Sentinel::Timeout, None, "query timed out");
//! let service = CustomError::wrap(storage, ErrorCategory::Internal, "LOAD_FAILED", "load failed");
//!
//! assert!(service.has_sentinel(Sentinel::Timeout));
//! assert!(!service.has_sentinel(Sentinel::NotFound));
//! assert_eq!(service.chain().count(), 2);
//! ```

use crate::definitions::CODE_INTERNAL_ERROR;
use crate::{CustomError, ErrorCategory, Sentinel};
use std::any::Any;
use std::error::Error;

// ============================================================================
// Chain Iterator
// ============================================================================

/// Iterator over an error and its `source()` chain, outermost first.
#[derive(Clone)]
pub struct Chain<'a> {
    next: Option<&'a (dyn Error + 'static)>,
}

impl<'a> Chain<'a> {
    /// Start a chain at `err`.
    #[inline]
    pub fn new(err: &'a (dyn Error + 'static)) -> Self {
        Self { next: Some(err) }
    }
}

impl<'a> Iterator for Chain<'a> {
    type Item = &'a (dyn Error + 'static);

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.source();
        Some(current)
    }
}

// ============================================================================
// Extension Trait
// ============================================================================

/// Chain inspection for any error, sized or trait object.
pub trait ErrorChainExt {
    /// View as a `'static` trait object.
    fn as_dyn_error(&self) -> &(dyn Error + 'static);

    /// This error followed by each `source()`.
    fn chain(&self) -> Chain<'_> {
        Chain::new(self.as_dyn_error())
    }

    /// Innermost cause (the error itself when it has no source).
    fn root_cause(&self) -> &(dyn Error + 'static) {
        let mut root = self.as_dyn_error();
        while let Some(next) = root.source() {
            root = next;
        }
        root
    }

    /// First link of type `T`.
    fn find_cause<T: Error + 'static>(&self) -> Option<&T> {
        self.chain().find_map(|link| link.downcast_ref::<T>())
    }

    /// True when any link equals `target`.
    ///
    /// `CustomError` links also match through the sentinel they were built
    /// from, so `is_caused_by(&Sentinel::NotFound)` sees a not-found error
    /// even when no bare `Sentinel` value sits in the chain.
    fn is_caused_by<T>(&self, target: &T) -> bool
    where
        T: Error + PartialEq + 'static,
    {
        self.chain().any(|link| {
            if link.downcast_ref::<T>() == Some(target) {
                return true;
            }
            link.downcast_ref::<CustomError>()
                .and_then(CustomError::sentinel)
                .is_some_and(|s| (&s as &dyn Any).downcast_ref::<T>() == Some(target))
        })
    }

    /// True when `sentinel` appears anywhere in the chain.
    fn has_sentinel(&self, sentinel: Sentinel) -> bool {
        self.is_caused_by(&sentinel)
    }
}

impl<E: Error + 'static> ErrorChainExt for E {
    #[inline]
    fn as_dyn_error(&self) -> &(dyn Error + 'static) {
        self
    }
}

impl ErrorChainExt for dyn Error + 'static {
    #[inline]
    fn as_dyn_error(&self) -> &(dyn Error + 'static) {
        self
    }
}

impl ErrorChainExt for dyn Error + Send + 'static {
    #[inline]
    fn as_dyn_error(&self) -> &(dyn Error + 'static) {
        self
    }
}

impl ErrorChainExt for dyn Error + Send + Sync + 'static {
    #[inline]
    fn as_dyn_error(&self) -> &(dyn Error + 'static) {
        self
    }
}

// ============================================================================
// Inspection Helpers
// ============================================================================

/// First `CustomError` in the chain.
pub fn find_custom_error<'a>(err: &'a (dyn Error + 'static)) -> Option<&'a CustomError> {
    Chain::new(err).find_map(|link| link.downcast_ref::<CustomError>())
}

/// Category of the first `CustomError` in the chain, else internal.
pub fn category_of(err: &(dyn Error + 'static)) -> ErrorCategory {
    find_custom_error(err).map_or(ErrorCategory::Internal, CustomError::category)
}

/// Code of the first `CustomError` in the chain, else `INTERNAL_ERROR`.
pub fn code_of<'a>(err: &'a (dyn Error + 'static)) -> &'a str {
    find_custom_error(err).map_or(CODE_INTERNAL_ERROR, CustomError::code)
}

/// Metadata value from the first `CustomError` in the chain.
pub fn metadata_of(err: &(dyn Error + 'static), key: &str) -> Option<String> {
    find_custom_error(err)?.get_metadata(key)
}

/// True when the first `CustomError` in the chain has `category`.
pub fn is_category(err: &(dyn Error + 'static), category: ErrorCategory) -> bool {
    find_custom_error(err).is_some_and(|e| e.category() == category)
}

/// True when the first `CustomError` in the chain has `code`.
pub fn is_code(err: &(dyn Error + 'static), code: &str) -> bool {
    find_custom_error(err).is_some_and(|e| e.code() == code)
}

/// True when the first `CustomError` in the chain holds stack frames.
pub fn has_stack_trace(err: &(dyn Error + 'static)) -> bool {
    find_custom_error(err).is_some_and(CustomError::has_stack_trace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{self, Config};
    use std::fmt;
    use std::io;

    #[derive(Debug, PartialEq)]
    struct Refused(&'static str);

    impl fmt::Display for Refused {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "connection refused by {}", self.0)
        }
    }

    impl Error for Refused {}

    /// Foreign wrapper that is not a CustomError.
    #[derive(Debug)]
    struct Context {
        source: Box<dyn Error + Send + Sync>,
    }

    impl fmt::Display for Context {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("context")
        }
    }

    impl Error for Context {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(self.source.as_ref())
        }
    }

    fn quiet<R>(f: impl FnOnce() -> R) -> R {
        config::with_config(
            Config {
                stack_trace_enabled: false,
                ..Config::DEFAULT
            },
            f,
        )
    }

    fn three_levels() -> CustomError {
        quiet(|| {
            let inner = CustomError::from_sentinel(Sentinel::NotFound, Some(Box::new(Refused("db"))), "row missing");
            let middle = Context { source: Box::new(inner) };
            CustomError::wrap(middle, ErrorCategory::Internal, "HANDLER", "handler failed")
        })
    }

    #[test]
    fn chain_walks_mixed_links() {
        let err = three_levels();
        let rendered: Vec<_> = err.chain().map(|e| e.to_string()).collect();
        assert_eq!(rendered.len(), 4);
        assert_eq!(rendered[3], "connection refused by db");
        assert_eq!(err.root_cause().to_string(), "connection refused by db");
    }

    #[test]
    fn sentinel_and_plain_cause_match_at_depth() {
        let err = three_levels();
        assert!(err.has_sentinel(Sentinel::NotFound));
        assert!(err.is_caused_by(&Refused("db")));
        assert!(!err.is_caused_by(&Refused("cache")));
        assert!(!err.has_sentinel(Sentinel::Forbidden));
    }

    #[test]
    fn bare_sentinel_in_chain_matches() {
        let err = quiet(|| CustomError::wrap(Sentinel::RateLimit, ErrorCategory::External, "UPSTREAM", "upstream"));
        assert!(err.has_sentinel(Sentinel::RateLimit));
        assert_eq!(err.find_cause::<Sentinel>(), Some(&Sentinel::RateLimit));
    }

    #[test]
    fn works_on_trait_objects() {
        let boxed: Box<dyn Error + Send + Sync> = Box::new(three_levels());
        assert!(boxed.has_sentinel(Sentinel::NotFound));
        assert!(boxed.find_cause::<Context>().is_some());
    }

    #[test]
    fn helpers_read_first_custom_error() {
        let err = three_levels();
        assert_eq!(category_of(&err), ErrorCategory::Internal);
        assert_eq!(code_of(&err), "HANDLER");
        assert!(is_category(&err, ErrorCategory::Internal));
        assert!(is_code(&err, "HANDLER"));
        assert!(!has_stack_trace(&err));

        let wrapper = Context { source: Box::new(three_levels()) };
        assert_eq!(code_of(&wrapper), "HANDLER");
    }

    #[test]
    fn helpers_default_for_foreign_errors() {
        let plain = io::Error::other("boom");
        assert_eq!(category_of(&plain), ErrorCategory::Internal);
        assert_eq!(code_of(&plain), "INTERNAL_ERROR");
        assert_eq!(metadata_of(&plain, "user_id"), None);
        assert!(!is_category(&plain, ErrorCategory::Internal));
    }

    fn code_from_boxed<'a>(err: &'a (dyn Error + Send + Sync + 'static)) -> &'a str {
        code_of(err)
    }

    #[test]
    fn code_borrows_from_the_chain() {
        let boxed: Box<dyn Error + Send + Sync> = Box::new(Context { source: Box::new(three_levels()) });
        let code = code_from_boxed(&*boxed);
        assert_eq!(code, "HANDLER");
    }

    #[test]
    fn metadata_of_reads_through_wrappers() {
        let err = three_levels();
        err.with_metadata("user_id", "usr_1");
        let wrapper = Context { source: Box::new(err) };
        assert_eq!(metadata_of(&wrapper, "user_id").as_deref(), Some("usr_1"));
    }
}
