//! Ordered field extraction strategies for loosely-typed payloads.
//!
//! Providers disagree on where they put the job id (`jobId`, `job_id`,
//! `id`) or the result location (`resultUrl`, `metadata.fileUrl`, an
//! array of results, inline base64 ...). Each place to look is a
//! [`FieldStrategy`]; a field is resolved by trying an ordered list of
//! strategies and taking the first non-empty string. Supporting a new
//! provider quirk is a one-line addition to the relevant list.

use serde_json::Value;

use crate::provider::MediaType;
use crate::types::JsonMap;

/// Keys checked, in order, for a job identifier in a submission response.
pub const JOB_ID_STRATEGIES: &[FieldStrategy] = &[
    FieldStrategy::Key("jobId"),
    FieldStrategy::Key("job_id"),
    FieldStrategy::Key("id"),
];

/// Keys checked, in order, for a raw status in a submission response.
pub const STATUS_STRATEGIES: &[FieldStrategy] =
    &[FieldStrategy::Key("status"), FieldStrategy::Key("state")];

/// Where a synchronous (no job id) submission response may carry its result.
pub const IMMEDIATE_RESULT_STRATEGIES: &[FieldStrategy] = &[
    FieldStrategy::Key("dataUrl"),
    FieldStrategy::FirstInArray("dataUrls"),
    FieldStrategy::Key("image"),
    FieldStrategy::InlineBase64 {
        data: "imageBase64",
        mime: "mimeType",
    },
    FieldStrategy::Key("resultUrl"),
];

const IMAGE_JOB_RESULT_STRATEGIES: &[FieldStrategy] = &[
    FieldStrategy::Key("resultUrl"),
    FieldStrategy::Nested("metadata", "fileUrl"),
    FieldStrategy::Nested("metadata", "r2FileUrl"),
    FieldStrategy::Nested("metadata", "url"),
    FieldStrategy::Nested("metadata", "imageUrl"),
    FieldStrategy::NestedEntries("metadata", "results"),
];

const VIDEO_JOB_RESULT_STRATEGIES: &[FieldStrategy] = &[
    FieldStrategy::Key("resultUrl"),
    FieldStrategy::Nested("metadata", "fileUrl"),
    FieldStrategy::Nested("metadata", "r2FileUrl"),
    FieldStrategy::Nested("metadata", "url"),
    FieldStrategy::Nested("metadata", "videoUrl"),
    FieldStrategy::NestedEntries("metadata", "results"),
];

/// Keys checked inside object entries of a results array.
const ENTRY_URL_KEYS: &[&str] = &["url", "fileUrl"];

/// Mime type assumed for inline base64 payloads that omit one.
const DEFAULT_INLINE_MIME: &str = "image/png";

/// Result URL strategies for a completed job of the given medium.
pub fn job_result_strategies(media_type: MediaType) -> &'static [FieldStrategy] {
    match media_type {
        MediaType::Image => IMAGE_JOB_RESULT_STRATEGIES,
        MediaType::Video => VIDEO_JOB_RESULT_STRATEGIES,
    }
}

/// A single place to look for a string value in an untyped object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldStrategy {
    /// `map[key]` as a string.
    Key(&'static str),
    /// `map[parent][key]` as a string.
    Nested(&'static str, &'static str),
    /// `map[key][0]` as a string.
    FirstInArray(&'static str),
    /// First usable entry of the array `map[parent][key]`: either a
    /// string or an object carrying `url` / `fileUrl`.
    NestedEntries(&'static str, &'static str),
    /// `data:{map[mime]};base64,{map[data]}`.
    InlineBase64 {
        data: &'static str,
        mime: &'static str,
    },
}

impl FieldStrategy {
    pub fn extract(&self, map: &JsonMap) -> Option<String> {
        match *self {
            FieldStrategy::Key(key) => string_at(map, key),
            FieldStrategy::Nested(parent, key) => {
                map.get(parent)?.as_object().and_then(|m| string_at(m, key))
            }
            FieldStrategy::FirstInArray(key) => {
                non_empty(map.get(key)?.as_array()?.first()?)
            }
            FieldStrategy::NestedEntries(parent, key) => map
                .get(parent)?
                .as_object()?
                .get(key)?
                .as_array()?
                .iter()
                .find_map(entry_url),
            FieldStrategy::InlineBase64 { data, mime } => {
                let data = string_at(map, data)?;
                let mime = string_at(map, mime).unwrap_or_else(|| DEFAULT_INLINE_MIME.to_string());
                Some(format!("data:{mime};base64,{data}"))
            }
        }
    }
}

/// Apply `strategies` in order and return the first hit.
pub fn first_match(strategies: &[FieldStrategy], map: &JsonMap) -> Option<String> {
    strategies.iter().find_map(|s| s.extract(map))
}

/// Coerce a progress value that may be a number or a string such as
/// `"12"` / `"42.5%"` into a percentage clamped to `0..=100`.
pub fn coerce_progress(value: &Value) -> Option<f64> {
    let raw = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok()?,
        _ => return None,
    };
    raw.is_finite().then(|| raw.clamp(0.0, 100.0))
}

fn string_at(map: &JsonMap, key: &str) -> Option<String> {
    non_empty(map.get(key)?)
}

fn non_empty(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn entry_url(entry: &Value) -> Option<String> {
    match entry {
        Value::String(_) => non_empty(entry),
        Value::Object(obj) => ENTRY_URL_KEYS.iter().find_map(|k| string_at(obj, k)),
        _ => None,
    }
}
