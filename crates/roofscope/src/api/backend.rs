use async_trait::async_trait;

use super::error::Result;
use super::types::{InlineUpload, PhotoMetadata, UploadSlot, WorkflowStarted};

/// The backend operations the analysis controller depends on.
///
/// [`ApiClient`](super::ApiClient) is the production implementation; tests
/// substitute scripted doubles so controller behavior can be exercised
/// without a network.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Request a presigned upload slot for a new photo.
    async fn request_upload_slot(
        &self,
        user_id: Option<&str>,
        content_type: &str,
    ) -> Result<UploadSlot>;

    /// Upload the photo bytes directly to storage via the presigned URL.
    async fn upload_direct(
        &self,
        upload_url: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<()>;

    /// Upload the photo through the API instead, as base64. Used only after
    /// a direct upload came back [`ApiError::UploadBlocked`](super::ApiError).
    async fn upload_inline(
        &self,
        user_id: Option<&str>,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<InlineUpload>;

    /// Start the multi-stage analysis workflow for an uploaded photo.
    async fn start_workflow(
        &self,
        photo_id: &str,
        s3_key: Option<&str>,
    ) -> Result<WorkflowStarted>;

    /// Start the single-pass detection alternative.
    async fn start_single_pass(
        &self,
        photo_id: &str,
        s3_key: Option<&str>,
    ) -> Result<WorkflowStarted>;

    /// Fetch the backend-authoritative metadata for a photo.
    async fn fetch_metadata(&self, photo_id: &str) -> Result<PhotoMetadata>;
}
