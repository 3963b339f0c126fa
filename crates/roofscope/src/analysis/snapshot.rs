use serde::Serialize;

use crate::api::PhotoMetadata;
use crate::status::StageStatus;

/// Read-only view of the controller state for a UI layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSnapshot {
    pub uploading: bool,
    pub analyzing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PhotoMetadata>,
    /// Analysis-stage error, exactly one at a time per session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Upload-stage error in the confirmation-gated flow.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_error: Option<String>,
    pub background_analysis_complete: bool,
    pub stages: Vec<StageStatus>,
}
