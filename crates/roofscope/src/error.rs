use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;

/// Sentinel shown when a failure carries nothing renderable.
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Maximum length for serialized failure payloads to prevent log flooding
/// and unreadable UI errors.
const MAX_DESCRIBED_LENGTH: usize = 200;

/// Session-level failure classes surfaced to the UI layer.
#[derive(Error, Debug, Clone)]
pub enum AnalysisError {
    /// Network/HTTP-layer failure on a transport call.
    #[error("Request failed: {0}")]
    Request(String),

    /// The backend pipeline or one of its stages reported failure.
    #[error("Analysis pipeline failed: {0}")]
    Pipeline(String),

    /// A polling or waiting loop exhausted its attempt budget.
    #[error("Timed out waiting for analysis: {0}")]
    Timeout(String),

    /// The run was superseded by a reset or an explicit cancellation.
    /// Never stored as the session error; callers discard the run instead.
    #[error("Analysis run was cancelled")]
    Cancelled,

    /// A failure whose shape could not be classified.
    #[error("{}", UNKNOWN_ERROR)]
    Unknown,
}

impl AnalysisError {
    /// The bare, display-ready message without the variant prefix.
    pub fn message(&self) -> String {
        match self {
            AnalysisError::Request(message)
            | AnalysisError::Pipeline(message)
            | AnalysisError::Timeout(message) => message.clone(),
            AnalysisError::Cancelled => "Analysis run was cancelled".to_string(),
            AnalysisError::Unknown => UNKNOWN_ERROR.to_string(),
        }
    }
}

impl From<crate::api::ApiError> for AnalysisError {
    fn from(error: crate::api::ApiError) -> Self {
        match error {
            crate::api::ApiError::Request(message) => AnalysisError::Request(message),
            // Recovered by the upload fallback; surfacing one means both paths failed.
            crate::api::ApiError::UploadBlocked(message) => AnalysisError::Request(message),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Turns an arbitrary failure payload into a displayable string.
///
/// Total over any JSON value: plain strings pass through, conventional
/// `message` fields win, the pipeline-engine `{Error, Cause}` shape prefers
/// `Error` and falls back to `Cause`, and anything else gets a bounded
/// serialization or the [`UNKNOWN_ERROR`] sentinel. Never returns an empty
/// string and never panics.
pub fn describe_failure(value: &Value) -> String {
    match value {
        Value::Null => UNKNOWN_ERROR.to_string(),
        Value::String(text) => nonempty_or_unknown(text),
        Value::Object(map) => {
            if let Some(message) = map.get("message").and_then(Value::as_str) {
                if !message.trim().is_empty() {
                    return message.to_string();
                }
            }
            if let Some(message) = map.get("Error").and_then(Value::as_str) {
                if !message.trim().is_empty() {
                    return message.to_string();
                }
            }
            if let Some(message) = map.get("Cause").and_then(Value::as_str) {
                if !message.trim().is_empty() {
                    return message.to_string();
                }
            }
            bounded_serialization(value)
        }
        _ => bounded_serialization(value),
    }
}

fn nonempty_or_unknown(text: &str) -> String {
    if text.trim().is_empty() {
        UNKNOWN_ERROR.to_string()
    } else {
        text.to_string()
    }
}

fn bounded_serialization(value: &Value) -> String {
    match serde_json::to_string(value) {
        Ok(serialized) if serialized == "null" || serialized.trim().is_empty() => {
            UNKNOWN_ERROR.to_string()
        }
        Ok(serialized) => {
            if serialized.chars().count() > MAX_DESCRIBED_LENGTH {
                let truncated: String = serialized.chars().take(MAX_DESCRIBED_LENGTH).collect();
                format!("{}...", truncated)
            } else {
                serialized
            }
        }
        Err(_) => UNKNOWN_ERROR.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_describe_plain_string() {
        assert_eq!(describe_failure(&json!("disk full")), "disk full");
    }

    #[test]
    fn test_describe_empty_string_is_unknown() {
        assert_eq!(describe_failure(&json!("   ")), UNKNOWN_ERROR);
    }

    #[test]
    fn test_describe_null_is_unknown() {
        assert_eq!(describe_failure(&Value::Null), UNKNOWN_ERROR);
    }

    #[test]
    fn test_describe_message_field() {
        assert_eq!(
            describe_failure(&json!({"message": "bad request"})),
            "bad request"
        );
    }

    #[test]
    fn test_describe_pipeline_engine_shape_prefers_error() {
        let value = json!({"Error": "States.TaskFailed", "Cause": "worker died"});
        assert_eq!(describe_failure(&value), "States.TaskFailed");
    }

    #[test]
    fn test_describe_pipeline_engine_shape_falls_back_to_cause() {
        let value = json!({"Cause": "worker died"});
        assert_eq!(describe_failure(&value), "worker died");
    }

    #[test]
    fn test_describe_opaque_object_is_serialized() {
        let value = json!({"code": 42});
        assert_eq!(describe_failure(&value), r#"{"code":42}"#);
    }

    #[test]
    fn test_describe_large_payload_is_truncated() {
        let value = json!({"detail": "x".repeat(500)});
        let described = describe_failure(&value);
        assert_eq!(described.chars().count(), 203);
        assert!(described.ends_with("..."));
    }

    #[test]
    fn test_describe_non_object_values() {
        assert_eq!(describe_failure(&json!(42)), "42");
        assert_eq!(describe_failure(&json!([1, 2])), "[1,2]");
        assert_eq!(describe_failure(&json!(true)), "true");
    }

    #[test]
    fn test_message_strips_variant_prefix() {
        assert_eq!(AnalysisError::Request("boom".to_string()).message(), "boom");
        assert_eq!(AnalysisError::Unknown.message(), UNKNOWN_ERROR);
    }

    #[test]
    fn test_api_error_conversion() {
        let error: AnalysisError =
            crate::api::ApiError::Request("gateway timeout".to_string()).into();
        assert!(matches!(error, AnalysisError::Request(_)));
        assert_eq!(error.message(), "gateway timeout");
    }
}
