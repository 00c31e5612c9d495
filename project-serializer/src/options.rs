//! Option Defaulting Resolver.
//!
//! Stored project options are sparse key/value rows; absence is meaningful.
//! Effective values come out of a layered strategy: stored override first,
//! then a legacy repair rule where one exists, then a versioned well-known
//! default selected by the project's option epoch.

use serde_json::{Map as JsonMap, Value as JsonValue, json};
use std::collections::HashMap;
use tracing::warn;

/// Epoch marker stored alongside a project's options. Projects created
/// before epochs existed have no marker and read as the oldest epoch, so
/// introducing a new default generation never changes their behavior.
pub const OPTION_EPOCH_KEY: &str = "sentry:option-epoch";

/// Epoch assumed when no marker is stored.
pub const DEFAULT_EPOCH: u64 = 1;

/// Epoch stamped onto newly created projects.
pub const LATEST_EPOCH: u64 = 7;

/// Stored custom symbol source configuration (a JSON string).
pub const SYMBOL_SOURCES_KEY: &str = "sentry:symbol_sources";

/// Keys that may be disclosed through the raw-option expansion and the
/// detailed serializer. Anything not listed here never leaves the store.
pub const OPTION_KEYS: &[&str] = &[
    "sentry:origins",
    "sentry:resolve_age",
    "sentry:scrub_data",
    "sentry:scrub_defaults",
    "sentry:safe_fields",
    "sentry:sensitive_fields",
    "sentry:store_crash_reports",
    "sentry:csp_ignored_sources_defaults",
    "sentry:csp_ignored_sources",
    "sentry:default_environment",
    "sentry:reprocessing_active",
    "sentry:blacklisted_ips",
    "sentry:releases",
    "sentry:error_messages",
    "sentry:scrape_javascript",
    "sentry:token",
    "sentry:token_header",
    "sentry:verify_ssl",
    "sentry:scrub_ip_address",
    "sentry:grouping_config",
    "sentry:grouping_enhancements",
    "sentry:grouping_enhancements_base",
    "sentry:secondary_grouping_config",
    "sentry:secondary_grouping_expiry",
    "sentry:grouping_auto_update",
    "sentry:fingerprinting_rules",
    "sentry:relay_pii_config",
    "sentry:builtin_symbol_sources",
    "sentry:dynamic_sampling_biases",
    "sentry:symbol_sources",
    "sentry:replay_rage_click_issues",
    "sentry:feedback_user_report_notifications",
    "sentry:feedback_ai_spam_detection",
    "sentry:option-epoch",
    "mail:subject_prefix",
    "mail:subject_template",
    "digests:mail:minimum_delay",
    "digests:mail:maximum_delay",
    "filters:blacklisted_ips",
    "filters:react-hydration-errors",
    "filters:chunk-load-error",
    "filters:releases",
    "filters:error_messages",
    "feedback:branding",
    "quotas:spike-protection-disabled",
];

/// Raw stored options for one project.
pub type RawOptions = HashMap<String, JsonValue>;

/// Python-style truthiness, which is what the original defaulting rules are
/// written against: null, false, 0, "" and empty containers are all falsy.
fn truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        JsonValue::String(s) => !s.is_empty(),
        JsonValue::Array(a) => !a.is_empty(),
        JsonValue::Object(o) => !o.is_empty(),
    }
}

/// Truthiness of a stored option with a per-key default for absence.
pub fn bool_value(raw: &RawOptions, key: &str, default: bool) -> bool {
    raw.get(key).map(truthy).unwrap_or(default)
}

/// A stored list of strings, when one is stored.
pub fn string_list(raw: &RawOptions, key: &str) -> Option<Vec<String>> {
    match raw.get(key) {
        Some(JsonValue::Array(items)) => Some(
            items
                .iter()
                .filter_map(|item| item.as_str().map(String::from))
                .collect(),
        ),
        _ => None,
    }
}

/// Joins a stored list option into one newline-separated string. Absent,
/// null or empty lists serialize to the empty string, never null.
fn joined_lines(raw: &RawOptions, key: &str) -> String {
    match raw.get(key) {
        Some(JsonValue::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str())
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

/// The stored value equals the string `"1"`, defaulting to enabled.
fn flag_is_string_one(raw: &RawOptions, key: &str) -> bool {
    match raw.get(key) {
        None => true,
        Some(JsonValue::String(s)) => s == "1",
        Some(_) => false,
    }
}

/// Formats the fixed filter/option key set of the response payload.
///
/// Output keys and defaulting rules are part of the API contract; the
/// function is pure and idempotent over the same raw options.
pub fn format_options(raw: &RawOptions) -> JsonMap<String, JsonValue> {
    let mut formatted = JsonMap::new();
    formatted.insert(
        "sentry:csp_ignored_sources_defaults".into(),
        json!(bool_value(raw, "sentry:csp_ignored_sources_defaults", true)),
    );
    formatted.insert(
        "sentry:csp_ignored_sources".into(),
        json!(joined_lines(raw, "sentry:csp_ignored_sources")),
    );
    formatted.insert(
        "sentry:reprocessing_active".into(),
        json!(bool_value(raw, "sentry:reprocessing_active", false)),
    );
    formatted.insert(
        "filters:blacklisted_ips".into(),
        json!(joined_lines(raw, "sentry:blacklisted_ips")),
    );
    // This flag was defaulted to a string but was written as a boolean for a
    // while due to an implementation error. To bring it back to a string we
    // repair on read: either the string "1" or the boolean true means
    // enabled, and absent means enabled.
    let hydration = match raw.get("filters:react-hydration-errors") {
        None => true,
        Some(JsonValue::String(s)) => s == "1",
        Some(JsonValue::Bool(b)) => *b,
        Some(_) => false,
    };
    formatted.insert("filters:react-hydration-errors".into(), json!(hydration));
    formatted.insert(
        "filters:chunk-load-error".into(),
        json!(flag_is_string_one(raw, "filters:chunk-load-error")),
    );
    formatted.insert(
        "filters:releases".into(),
        json!(joined_lines(raw, "sentry:releases")),
    );
    formatted.insert(
        "filters:error_messages".into(),
        json!(joined_lines(raw, "sentry:error_messages")),
    );
    formatted.insert(
        "feedback:branding".into(),
        json!(flag_is_string_one(raw, "feedback:branding")),
    );
    formatted.insert(
        "sentry:feedback_user_report_notifications".into(),
        json!(bool_value(raw, "sentry:feedback_user_report_notifications", false)),
    );
    formatted.insert(
        "sentry:feedback_ai_spam_detection".into(),
        json!(bool_value(raw, "sentry:feedback_ai_spam_detection", false)),
    );
    formatted.insert(
        "sentry:replay_rage_click_issues".into(),
        raw.get("sentry:replay_rage_click_issues")
            .cloned()
            .unwrap_or(JsonValue::Null),
    );
    formatted.insert(
        "quotas:spike-protection-disabled".into(),
        raw.get("quotas:spike-protection-disabled")
            .cloned()
            .unwrap_or(JsonValue::Null),
    );
    formatted
}

/// Default generations per well-known key, as `(epoch, value)` pairs in
/// ascending epoch order. A project at epoch E reads the newest generation
/// whose epoch is <= E.
fn epoch_generations(key: &str) -> Vec<(u64, JsonValue)> {
    match key {
        "sentry:grouping_config" => vec![
            (1, json!("legacy:2019-03-12")),
            (3, json!("newstyle:2019-10-29")),
            (5, json!("newstyle:2023-01-11")),
        ],
        "sentry:grouping_enhancements" => vec![(1, json!(""))],
        "sentry:grouping_enhancements_base" => vec![
            (1, json!("legacy:2019-03-12")),
            (4, json!("common:2019-03-23")),
        ],
        "sentry:secondary_grouping_expiry" => vec![(1, json!(0))],
        "sentry:secondary_grouping_config" => vec![(1, JsonValue::Null)],
        "sentry:grouping_auto_update" => vec![(1, json!(false)), (7, json!(true))],
        "sentry:fingerprinting_rules" => vec![(1, json!(""))],
        "sentry:builtin_symbol_sources" => vec![
            (1, json!(["ios"])),
            (2, json!(["ios", "microsoft"])),
            (6, json!(["ios", "microsoft", "android"])),
        ],
        "sentry:dynamic_sampling_biases" => vec![(
            1,
            json!([
                {"id": "boostEnvironments", "active": true},
                {"id": "ignoreHealthChecks", "active": true},
                {"id": "boostLatestRelease", "active": true},
            ]),
        )],
        _ => Vec::new(),
    }
}

/// The project's option epoch, read from the stored marker or the oldest
/// epoch when none is stored.
pub fn project_epoch(raw: &RawOptions) -> u64 {
    raw.get(OPTION_EPOCH_KEY)
        .and_then(JsonValue::as_u64)
        .unwrap_or(DEFAULT_EPOCH)
}

/// Well-known default for `key` as seen from `epoch`.
pub fn get_well_known_default(key: &str, epoch: u64) -> JsonValue {
    epoch_generations(key)
        .into_iter()
        .take_while(|(generation_epoch, _)| *generation_epoch <= epoch)
        .last()
        .map(|(_, value)| value)
        .unwrap_or(JsonValue::Null)
}

/// Effective value for a well-known key: a stored override always wins over
/// the computed default.
pub fn get_value_with_default(raw: &RawOptions, key: &str) -> JsonValue {
    match raw.get(key) {
        Some(value) if !value.is_null() => value.clone(),
        _ => get_well_known_default(key, project_epoch(raw)),
    }
}

/// Fields of a custom symbol source that must never be disclosed.
const SECRET_SOURCE_FIELDS: &[&str] = &["password", "secret_key", "private_key"];

/// Parses the stored custom symbol source configuration, redacts secret
/// fields, and re-serializes it.
///
/// Sources stored on a project should be valid, but if they are not we do
/// not abort serialization over one derived field: the value degrades to an
/// empty-list serialization and response construction proceeds.
pub fn redacted_symbol_sources(raw: &RawOptions) -> String {
    let Some(stored) = raw.get(SYMBOL_SOURCES_KEY).and_then(JsonValue::as_str) else {
        return "[]".to_string();
    };

    let parsed: Vec<JsonMap<String, JsonValue>> = match serde_json::from_str(stored) {
        Ok(sources) => sources,
        Err(error) => {
            warn!(%error, "stored symbol sources failed to parse; omitting them");
            return "[]".to_string();
        }
    };

    let redacted: Vec<JsonValue> = parsed
        .into_iter()
        .map(|mut source| {
            for field in SECRET_SOURCE_FIELDS {
                if source.contains_key(*field) {
                    source.insert(field.to_string(), json!({"hidden-secret": true}));
                }
            }
            JsonValue::Object(source)
        })
        .collect();

    serde_json::to_string(&redacted).unwrap_or_else(|_| "[]".to_string())
}
