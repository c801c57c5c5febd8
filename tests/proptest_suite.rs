//! Property-based tests for contextual_errors
//!
//! These tests use proptest to generate random inputs and verify invariants hold.

use contextual_errors::{
    CLIENT_SAFE_METADATA_KEYS, Config, CustomError, ErrorCategory, GENERIC_EXTERNAL_MESSAGE,
    GENERIC_INTERNAL_MESSAGE, http_status_for_name,
};
use proptest::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

const QUIET: Config = Config {
    stack_trace_enabled: false,
    max_stack_depth: 10,
    production_mode: false,
};

const PROD: Config = Config {
    stack_trace_enabled: false,
    max_stack_depth: 10,
    production_mode: true,
};

fn any_category() -> impl Strategy<Value = ErrorCategory> {
    (0..ErrorCategory::ALL.len()).prop_map(|i| ErrorCategory::ALL[i])
}

fn quiet_error(category: ErrorCategory, message: &str) -> CustomError {
    CustomError::from_category_with_config(&QUIET, category, category.default_code(), message.to_owned())
}

#[derive(Debug)]
struct Plain(String);

impl fmt::Display for Plain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for Plain {}

// ============================================================================
// CATEGORY PROPERTIES
// ============================================================================

proptest! {
    /// Wire names round-trip and agree with the status table
    #[test]
    fn category_names_round_trip(category in any_category()) {
        prop_assert_eq!(ErrorCategory::from_name(category.as_str()), Some(category));
        prop_assert_eq!(http_status_for_name(category.as_str()), category.http_status());
        prop_assert_eq!(category.as_str().parse::<ErrorCategory>().ok(), Some(category));
    }

    /// Unknown names fall into the internal bucket
    #[test]
    fn unknown_names_map_to_500(name in "[A-Za-z_]{0,16}") {
        prop_assume!(ErrorCategory::from_name(&name).is_none());
        prop_assert_eq!(http_status_for_name(&name), 500);
    }

    /// An error's HTTP status is its category's status
    #[test]
    fn error_status_follows_category(category in any_category(), message in "\\PC{0,64}") {
        let err = quiet_error(category, &message);
        prop_assert_eq!(err.to_http_status(), category.http_status());
        prop_assert_eq!(err.to_json().http_status(), category.http_status());
    }
}

// ============================================================================
// DISPLAY PROPERTIES
// ============================================================================

proptest! {
    /// Display is the message, or `message: cause` when wrapped
    #[test]
    fn display_shape(message in "\\PC{0,100}", cause in proptest::option::of("\\PC{0,100}")) {
        let err = match &cause {
            Some(text) => CustomError::wrap(Plain(text.clone()), ErrorCategory::Internal, "WRAPPED", message.clone()),
            None => quiet_error(ErrorCategory::Internal, &message),
        };
        let expected = match cause {
            Some(text) => format!("{message}: {text}"),
            None => message.clone(),
        };
        prop_assert_eq!(err.to_string(), expected);
        prop_assert_eq!(err.message(), message.as_str());
    }
}

// ============================================================================
// METADATA PROPERTIES
// ============================================================================

proptest! {
    /// The store behaves like a map: last write wins
    #[test]
    fn metadata_last_write_wins(
        writes in prop::collection::vec(("[a-e]", "\\PC{0,40}"), 0..30)
    ) {
        let err = quiet_error(ErrorCategory::Validation, "bad");
        let mut model = HashMap::new();
        for (key, value) in &writes {
            err.with_metadata(key.clone(), value.clone());
            model.insert(key.clone(), value.clone());
        }

        prop_assert_eq!(err.has_metadata(), !model.is_empty());
        prop_assert_eq!(err.get_all_metadata(), model.clone());
        for (key, value) in &model {
            prop_assert_eq!(err.get_metadata(key), Some(value.clone()));
        }
    }

    /// Exported maps are copies
    #[test]
    fn exported_metadata_is_detached(key in "[a-z]{1,8}", value in "\\PC{0,20}") {
        let err = quiet_error(ErrorCategory::Validation, "bad");
        err.with_metadata(key.clone(), value.clone());

        let mut exported = err.get_all_metadata();
        exported.insert(key.clone(), "changed".to_owned());
        exported.insert("extra".to_owned(), "x".to_owned());

        prop_assert_eq!(err.get_metadata(&key), Some(value));
        prop_assert_eq!(err.get_all_metadata().len(), 1);
    }

    /// Any non-empty request id is stored verbatim; empty clears it
    #[test]
    fn request_id_round_trip(id in "\\PC{0,64}") {
        let err = quiet_error(ErrorCategory::Timeout, "slow");
        err.with_request_id("previous");
        err.with_request_id(id.clone());
        if id.is_empty() {
            prop_assert_eq!(err.request_id(), None);
        } else {
            prop_assert_eq!(err.request_id(), Some(id));
        }
    }
}

// ============================================================================
// CLIENT FILTERING PROPERTIES
// ============================================================================

proptest! {
    /// Production client renders keep exactly the allow-listed keys
    #[test]
    fn production_metadata_is_allow_listed(
        category in any_category(),
        keys in prop::collection::btree_set(
            prop_oneof![
                "[a-z_]{1,12}".prop_map(String::from),
                (0..CLIENT_SAFE_METADATA_KEYS.len()).prop_map(|i| CLIENT_SAFE_METADATA_KEYS[i].to_owned()),
            ],
            0..12,
        )
    ) {
        let err = quiet_error(category, "message");
        for key in &keys {
            err.with_metadata(key.clone(), format!("{key}-value"));
        }

        let client = err.to_client_json_with(&PROD).error.metadata;
        let expected: BTreeMap<String, String> = keys
            .iter()
            .filter(|k| CLIENT_SAFE_METADATA_KEYS.contains(&k.as_str()))
            .map(|k| (k.clone(), format!("{k}-value")))
            .collect();
        prop_assert_eq!(client, expected);

        // Development and full renders see everything.
        prop_assert_eq!(err.to_client_json_with(&QUIET), err.to_json());
        prop_assert_eq!(err.to_json().error.metadata.len(), keys.len());
        prop_assert_eq!(err.get_all_metadata().len(), keys.len());
    }

    /// Only internal and external messages are replaced in production
    #[test]
    fn production_message_substitution(category in any_category(), message in "\\PC{0,80}") {
        let err = quiet_error(category, &message);
        let safe = err.client_safe_message_with(&PROD);
        match category {
            ErrorCategory::Internal => prop_assert_eq!(safe.as_str(), GENERIC_INTERNAL_MESSAGE),
            ErrorCategory::External => prop_assert_eq!(safe.as_str(), GENERIC_EXTERNAL_MESSAGE),
            _ => prop_assert_eq!(safe.as_str(), message.as_str()),
        }
        prop_assert_eq!(err.client_safe_message_with(&QUIET), message.clone());
        prop_assert_eq!(err.message(), message.as_str());
    }
}

// ============================================================================
// STACK PROPERTIES
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Captured depth never exceeds the configured bound
    #[test]
    fn stack_depth_is_bounded(depth in 0usize..200) {
        let config = Config { stack_trace_enabled: true, max_stack_depth: depth, production_mode: false };
        let err = CustomError::from_category_with_config(&config, ErrorCategory::Internal, "X", "x");
        let bound = config.effective_stack_depth();
        prop_assert!(bound >= 1 && bound <= 64);
        prop_assert!(err.get_stack_trace().len() <= bound);
    }

    /// Disabled capture records nothing
    #[test]
    fn disabled_capture_is_empty(depth in 0usize..200) {
        let config = Config { stack_trace_enabled: false, max_stack_depth: depth, production_mode: false };
        let err = CustomError::from_category_with_config(&config, ErrorCategory::Internal, "X", "x");
        prop_assert!(!err.has_stack_trace());
        prop_assert_eq!(err.get_stack_trace_string(), "");
    }
}

// ============================================================================
// LOGGING PROPERTIES
// ============================================================================

proptest! {
    /// Single-line log output is valid UTF-8 and bounded per field
    #[test]
    fn internal_log_is_bounded(message in "\\PC{0,5000}") {
        let err = quiet_error(ErrorCategory::Internal, &message);
        let line = err
            .with_internal_log(|log| {
                let mut buffer = String::new();
                log.write_to(&mut buffer).map(|_| buffer)
            })
            .unwrap();

        prop_assert!(std::str::from_utf8(line.as_bytes()).is_ok());
        // category + code + 1024-byte message + framing
        prop_assert!(line.len() < 1024 + 64);
        if message.len() <= 1024 {
            prop_assert!(line.contains(&message));
        } else {
            prop_assert!(line.ends_with("...[TRUNCATED]'"));
        }
    }

    /// Structured log fields mirror the error
    #[test]
    fn log_fields_mirror_error(
        category in any_category(),
        entries in prop::collection::btree_map("[a-z]{1,6}", "[a-z0-9]{0,6}", 0..8)
    ) {
        let err = quiet_error(category, "message");
        for (key, value) in &entries {
            err.with_metadata(key.clone(), value.clone());
        }

        let fields = err.to_log_fields();
        prop_assert_eq!(fields["error_category"].as_str(), Some(category.as_str()));
        prop_assert_eq!(fields["error_code"].as_str(), Some(category.default_code()));
        prop_assert!(!fields.contains_key("has_stack_trace"));

        let meta = fields.keys().filter(|k| k.starts_with("meta_")).count();
        prop_assert_eq!(meta, entries.len());
        for (key, value) in &entries {
            prop_assert_eq!(fields[&format!("meta_{key}")].as_str(), Some(value.as_str()));
        }
    }
}

// ============================================================================
// SHORT RENDER PROPERTIES
// ============================================================================

proptest! {
    /// Short render is one line and never mentions metadata keys
    #[test]
    fn short_error_is_single_line(
        category in any_category(),
        message in "[A-Ya-y0-9 .,\n\r]{0,80}",
        request_id in proptest::option::of("[a-z0-9-]{1,16}"),
        keys in prop::collection::vec("zz[a-z]{4,8}", 0..6),
    ) {
        let err = quiet_error(category, &message);
        if let Some(id) = &request_id {
            err.with_request_id(id.clone());
        }
        for key in &keys {
            err.with_metadata(key.clone(), "value");
        }

        let short = err.short_error();
        prop_assert!(!short.contains('\n'));
        prop_assert!(!short.contains('\r'));
        for key in &keys {
            prop_assert!(!short.contains(key.as_str()));
        }
        prop_assert_eq!(short.starts_with('['), request_id.is_some());
    }
}
