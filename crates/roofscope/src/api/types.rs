//! Wire types for the analysis backend.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Overall status of a photo's analysis, as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ExecutionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Unknown,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Processing => "processing",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Unknown => "unknown",
        }
    }
}

impl From<String> for ExecutionStatus {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => ExecutionStatus::Pending,
            "processing" => ExecutionStatus::Processing,
            "completed" => ExecutionStatus::Completed,
            "failed" => ExecutionStatus::Failed,
            other => {
                log::warn!("Unknown execution status '{}'", other);
                ExecutionStatus::Unknown
            }
        }
    }
}

impl From<ExecutionStatus> for String {
    fn from(status: ExecutionStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Response to an upload-slot request: a presigned URL plus the identifiers
/// the rest of the workflow keys on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSlot {
    pub photo_id: String,
    pub upload_url: String,
    pub s3_key: String,
    /// Presigned URL lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Response to the inline (through-the-API) upload fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InlineUpload {
    pub photo_id: String,
    pub s3_key: String,
}

/// Acknowledgement that a workflow execution was started.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStarted {
    pub photo_id: String,
    #[serde(default)]
    pub execution_arn: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    /// Absent on 202-style responses; treated as processing.
    #[serde(default)]
    pub workflow_status: Option<ExecutionStatus>,
}

/// A single damage detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "type")]
    pub kind: String,
    pub category: String,
    pub confidence: f64,
    /// Bounding box as `[x1, y1, x2, y2]`.
    #[serde(default)]
    pub bbox: Option<Vec<i64>>,
    #[serde(default)]
    pub severity: Option<String>,
}

/// A detected repair material estimate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    #[serde(rename = "type")]
    pub kind: String,
    pub count: u32,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    pub confidence: f64,
}

/// Full photo metadata, the backend-authoritative view of one analysis run.
///
/// Per-stage sub-results stay loosely typed: their shape varies by model
/// version and the client only passes them through to the result view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoMetadata {
    pub photo_id: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub s3_key: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    pub status: ExecutionStatus,
    #[serde(default)]
    pub workflow_status: Option<ExecutionStatus>,
    #[serde(default)]
    pub detections: Vec<Detection>,
    #[serde(default)]
    pub materials: Vec<Material>,
    #[serde(default)]
    pub processing_time_ms: Option<u64>,
    #[serde(default)]
    pub ai_provider: Option<String>,
    #[serde(default)]
    pub agent1_results: Option<Value>,
    #[serde(default)]
    pub agent2_results: Option<Value>,
    #[serde(default)]
    pub agent3_results: Option<Value>,
    #[serde(default)]
    pub single_agent_results: Option<Value>,
    #[serde(default)]
    pub overlay_url: Option<String>,
    #[serde(default)]
    pub report_url: Option<String>,
    #[serde(default)]
    pub single_agent_overlay_url: Option<String>,
    #[serde(default)]
    pub single_agent_report_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl PhotoMetadata {
    /// The status polling decisions key on. The workflow field is written by
    /// the orchestrator and wins over the upload record's status when both
    /// are present.
    pub fn effective_status(&self) -> ExecutionStatus {
        self.workflow_status.unwrap_or(self.status)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.effective_status(),
            ExecutionStatus::Completed | ExecutionStatus::Failed
        )
    }
}
