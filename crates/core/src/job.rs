//! Wire shapes for job submission and status responses.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::extract::{
    coerce_progress, first_match, FieldStrategy, JOB_ID_STRATEGIES, STATUS_STRATEGIES,
};
use crate::status::{normalize_job_status, NormalizedStatus};
use crate::types::JsonMap;

/// Where a status document may carry its progress, in priority order.
const PROGRESS_METADATA_KEYS: &[&str] = &["progress", "percentComplete"];

/// Where a status document may carry a human-readable stage.
const STAGE_STRATEGIES: &[FieldStrategy] = &[
    FieldStrategy::Nested("metadata", "stage"),
    FieldStrategy::Nested("metadata", "status"),
    FieldStrategy::Nested("metadata", "state"),
];

/// Normalized view of a submission response.
///
/// `job_id == None` means the provider answered synchronously and the
/// result (if any) lives in `payload`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderJobResponse {
    pub job_id: Option<String>,
    pub status: NormalizedStatus,
    pub raw_status: Option<String>,
    /// The full response body, untouched.
    pub payload: JsonMap,
}

impl ProviderJobResponse {
    /// Sniff the job id and status out of a loosely-shaped response body.
    pub fn from_payload(payload: JsonMap) -> Self {
        let job_id = first_match(JOB_ID_STRATEGIES, &payload);
        let raw_status = first_match(STATUS_STRATEGIES, &payload);
        let status = normalize_job_status(raw_status.as_deref());
        Self {
            job_id,
            status,
            raw_status,
            payload,
        }
    }
}

/// Raw status document returned by `GET /api/jobs/{id}`.
///
/// The document belongs to the remote service, so scalar fields are read
/// leniently: numbers become strings and any other type is dropped. A
/// non-string `status` is kept as its JSON text so it normalizes as an
/// unrecognized status rather than as a missing one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusPayload {
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(
        default,
        deserialize_with = "present_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub status: Option<String>,
    /// Either a number or a percent string such as `"12"` / `"12%"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<Value>,
    /// Usually a string; some backends send an object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub result_url: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_object",
        skip_serializing_if = "Option::is_none"
    )]
    pub metadata: Option<JsonMap>,
    /// Top-level fields this client does not model.
    #[serde(flatten)]
    pub extra: JsonMap,
}

impl JobStatusPayload {
    /// The job's error message, if it carries a non-empty one.
    pub fn error_message(&self) -> Option<String> {
        match self.error.as_ref()? {
            Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
            Value::Object(obj) => obj
                .get("message")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Progress from `progress`, then `metadata.progress`, then
    /// `metadata.percentComplete`.
    pub fn progress_percent(&self) -> Option<f64> {
        if let Some(p) = self.progress.as_ref().and_then(coerce_progress) {
            return Some(p);
        }
        let metadata = self.metadata.as_ref()?;
        PROGRESS_METADATA_KEYS
            .iter()
            .find_map(|k| metadata.get(*k).and_then(coerce_progress))
    }

    /// Object view of the document, used by result URL strategies.
    pub fn to_map(&self) -> JsonMap {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => JsonMap::new(),
        }
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn present_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

fn lenient_object<'de, D>(deserializer: D) -> Result<Option<JsonMap>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Object(map)) => Some(map),
        _ => None,
    })
}

/// One normalized observation of a job, produced per poll.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobStatusSnapshot {
    pub job: JobStatusPayload,
    pub status: NormalizedStatus,
    /// Percentage in `0..=100`.
    pub progress: Option<f64>,
    pub stage: Option<String>,
}

impl JobStatusSnapshot {
    pub fn from_job(job: JobStatusPayload) -> Self {
        let status = normalize_job_status(job.status.as_deref());
        let progress = job.progress_percent();
        let stage = first_match(STAGE_STRATEGIES, &job.to_map());
        Self {
            job,
            status,
            progress,
            stage,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn payload(value: Value) -> JobStatusPayload {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn response_with_job_id() {
        let body = json!({"job_id": "job-123", "state": "QUEUED"});
        let Value::Object(map) = body else { unreachable!() };
        let response = ProviderJobResponse::from_payload(map);
        assert_eq!(response.job_id.as_deref(), Some("job-123"));
        assert_eq!(response.raw_status.as_deref(), Some("QUEUED"));
        assert_eq!(response.status, NormalizedStatus::Queued);
        assert_eq!(response.payload["job_id"], "job-123");
    }

    #[test]
    fn synchronous_response_keeps_payload() {
        let body = json!({"dataUrl": "https://cdn/immediate.png"});
        let Value::Object(map) = body else { unreachable!() };
        let response = ProviderJobResponse::from_payload(map);
        assert!(response.job_id.is_none());
        assert_eq!(response.status, NormalizedStatus::Queued);
        assert_eq!(response.payload["dataUrl"], "https://cdn/immediate.png");
    }

    #[test]
    fn snapshot_reads_percent_string() {
        let snapshot = JobStatusSnapshot::from_job(payload(json!({
            "status": "PROCESSING",
            "progress": "12",
        })));
        assert_eq!(snapshot.status, NormalizedStatus::Processing);
        assert_eq!(snapshot.progress, Some(12.0));
        assert!(!snapshot.is_terminal());
    }

    #[test]
    fn snapshot_progress_falls_back_to_metadata() {
        let snapshot = JobStatusSnapshot::from_job(payload(json!({
            "status": "running",
            "progress": "n/a",
            "metadata": {"percentComplete": "64%"},
        })));
        assert_eq!(snapshot.progress, Some(64.0));
    }

    #[test]
    fn snapshot_stage_priority() {
        let snapshot = JobStatusSnapshot::from_job(payload(json!({
            "status": "running",
            "metadata": {"state": "warming", "stage": "upscaling"},
        })));
        assert_eq!(snapshot.stage.as_deref(), Some("upscaling"));

        let snapshot = JobStatusSnapshot::from_job(payload(json!({
            "status": "running",
            "metadata": {"state": "warming"},
        })));
        assert_eq!(snapshot.stage.as_deref(), Some("warming"));
    }

    #[test]
    fn error_message_variants() {
        assert_eq!(
            payload(json!({"error": "  nsfw filter "})).error_message().as_deref(),
            Some("nsfw filter")
        );
        assert_eq!(payload(json!({"error": ""})).error_message(), None);
        assert_eq!(
            payload(json!({"error": {"message": "quota"}})).error_message().as_deref(),
            Some("quota")
        );
        assert_eq!(payload(json!({})).error_message(), None);
    }

    #[test]
    fn loosely_typed_fields_do_not_fail_decoding() {
        let job: JobStatusPayload = serde_json::from_str(
            r#"{"id": 42, "status": "COMPLETED", "resultUrl": "https://cdn/x.png"}"#,
        )
        .unwrap();
        assert_eq!(job.id.as_deref(), Some("42"));
        assert_eq!(job.result_url.as_deref(), Some("https://cdn/x.png"));
        assert_eq!(
            JobStatusSnapshot::from_job(job).status,
            NormalizedStatus::Completed
        );

        let job = payload(json!({
            "id": "job-5",
            "status": {"code": 3},
            "resultUrl": null,
            "metadata": "none",
        }));
        assert_eq!(job.status.as_deref(), Some(r#"{"code":3}"#));
        assert_eq!(job.result_url, None);
        assert_eq!(job.metadata, None);
        assert_eq!(JobStatusSnapshot::from_job(job).status, NormalizedStatus::Failed);
    }

    #[test]
    fn unknown_top_level_fields_are_kept() {
        let job = payload(json!({"status": "done", "outputUrl": "https://cdn/o.png"}));
        assert_eq!(job.extra["outputUrl"], "https://cdn/o.png");
        assert_eq!(job.to_map()["outputUrl"], "https://cdn/o.png");
    }
}
