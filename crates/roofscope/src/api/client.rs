//! HTTP implementation of the analysis backend contract.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use log::{debug, info, warn};
use reqwest::Client;
use serde_json::{json, Value};

use crate::error::{describe_failure, UNKNOWN_ERROR};

use super::backend::AnalysisBackend;
use super::error::{ApiError, Result};
use super::types::{InlineUpload, PhotoMetadata, UploadSlot, WorkflowStarted};

/// Default connect timeout for HTTP requests (10 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default request timeout for HTTP requests (30 seconds).
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// REST client for the photo-analysis backend.
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Creates a client for the given API base URL.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Request(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Creates a client from a loaded configuration.
    pub fn from_config(config: &crate::config::ClientConfig) -> Result<Self> {
        Self::new(config.api_base_url.clone())
    }

    /// Get the API base URL (trailing slash stripped).
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

/// Classifies a transport failure on the direct storage upload. Failures
/// that never produced an HTTP response (connect refused, timeout) are the
/// blocked class that selects the inline fallback; anything with a status
/// means storage was reachable and stays a plain request error.
fn classify_direct_upload_failure(error: reqwest::Error) -> ApiError {
    if error.is_connect() || error.is_timeout() {
        ApiError::UploadBlocked(error.to_string())
    } else {
        ApiError::Request(format!("Direct upload failed: {}", error))
    }
}

/// Builds a normalized error from a non-success response. Backend error
/// bodies are `{"error": "..."}` JSON; anything else goes through the
/// bounded failure description.
async fn response_error(context: &str, response: reqwest::Response) -> ApiError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    let detail = match serde_json::from_str::<Value>(&body) {
        Ok(value) => value
            .get("error")
            .map(describe_failure)
            .unwrap_or_else(|| describe_failure(&value)),
        Err(_) if body.trim().is_empty() => UNKNOWN_ERROR.to_string(),
        Err(_) => describe_failure(&Value::String(body)),
    };

    ApiError::Request(format!("{} ({}): {}", context, status, detail))
}

#[async_trait]
impl AnalysisBackend for ApiClient {
    async fn request_upload_slot(
        &self,
        user_id: Option<&str>,
        content_type: &str,
    ) -> Result<UploadSlot> {
        let mut body = json!({ "content_type": content_type });
        if let Some(user_id) = user_id {
            body["user_id"] = json!(user_id);
        }

        info!("Requesting upload slot from {}", self.base_url);
        let response = self
            .client
            .post(self.endpoint("photos/upload"))
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::Request(format!("Upload slot request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(response_error("Upload slot request failed", response).await);
        }

        let slot: UploadSlot = response
            .json()
            .await
            .map_err(|e| ApiError::Request(format!("Failed to parse upload slot: {}", e)))?;

        debug!("Upload slot issued for photo {}", slot.photo_id);
        Ok(slot)
    }

    async fn upload_direct(
        &self,
        upload_url: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<()> {
        let response = self
            .client
            .put(upload_url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(classify_direct_upload_failure)?;

        if !response.status().is_success() {
            return Err(response_error("Direct upload failed", response).await);
        }

        debug!("Direct upload completed ({} bytes)", bytes.len());
        Ok(())
    }

    async fn upload_inline(
        &self,
        user_id: Option<&str>,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<InlineUpload> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        let mut body = json!({ "file": encoded, "content_type": content_type });
        if let Some(user_id) = user_id {
            body["user_id"] = json!(user_id);
        }

        warn!("Uploading photo inline through the API ({} bytes)", bytes.len());
        let response = self
            .client
            .post(self.endpoint("photos/upload"))
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::Request(format!("Inline upload failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(response_error("Inline upload failed", response).await);
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::Request(format!("Failed to parse inline upload: {}", e)))
    }

    async fn start_workflow(
        &self,
        photo_id: &str,
        s3_key: Option<&str>,
    ) -> Result<WorkflowStarted> {
        let mut body = json!({ "photo_id": photo_id });
        if let Some(s3_key) = s3_key {
            body["s3_key"] = json!(s3_key);
        }

        let response = self
            .client
            .post(self.endpoint(&format!("photos/{}/analyze", photo_id)))
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::Request(format!("Workflow trigger failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(response_error("Workflow trigger failed", response).await);
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::Request(format!("Failed to parse workflow response: {}", e)))
    }

    async fn start_single_pass(
        &self,
        photo_id: &str,
        s3_key: Option<&str>,
    ) -> Result<WorkflowStarted> {
        let mut body = json!({ "photo_id": photo_id });
        if let Some(s3_key) = s3_key {
            body["s3_key"] = json!(s3_key);
        }

        let response = self
            .client
            .post(self.endpoint(&format!("photos/{}/detect", photo_id)))
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::Request(format!("Detection trigger failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(response_error("Detection trigger failed", response).await);
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::Request(format!("Failed to parse detection response: {}", e)))
    }

    async fn fetch_metadata(&self, photo_id: &str) -> Result<PhotoMetadata> {
        let response = self
            .client
            .get(self.endpoint(&format!("photos/{}/metadata", photo_id)))
            .send()
            .await
            .map_err(|e| ApiError::Request(format!("Metadata request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(response_error("Metadata request failed", response).await);
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::Request(format!("Failed to parse metadata: {}", e)))
    }
}
