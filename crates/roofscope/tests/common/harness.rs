//! Test harness for controller tests: a scripted backend double plus a
//! controller wired for fast polling.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use roofscope::api::error::Result as ApiResult;
use roofscope::{
    AnalysisBackend, AnalysisController, ApiError, ClientConfig, InlineUpload, PhotoMetadata,
    UploadSlot, WorkflowStarted,
};

/// One recorded backend invocation, with the arguments the controller used.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    UploadSlot {
        user_id: Option<String>,
    },
    DirectUpload {
        upload_url: String,
    },
    InlineUpload {
        user_id: Option<String>,
    },
    StartWorkflow {
        photo_id: String,
        s3_key: Option<String>,
    },
    StartSinglePass {
        photo_id: String,
        s3_key: Option<String>,
    },
    FetchMetadata {
        photo_id: String,
    },
}

type Scripted<T> = Mutex<VecDeque<ApiResult<T>>>;

/// Backend double with per-operation response queues and call recording.
///
/// Metadata polls consume the queue first and then fall back to
/// `metadata_default`, so "stays processing forever" is one line of setup.
#[derive(Default)]
pub struct MockBackend {
    pub upload_slots: Scripted<UploadSlot>,
    pub direct_uploads: Scripted<()>,
    pub inline_uploads: Scripted<InlineUpload>,
    pub workflow_starts: Scripted<WorkflowStarted>,
    pub single_pass_starts: Scripted<WorkflowStarted>,
    pub metadata_responses: Scripted<PhotoMetadata>,
    pub metadata_default: Mutex<Option<ApiResult<PhotoMetadata>>>,
    calls: Mutex<Vec<BackendCall>>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_upload_slot(&self, result: ApiResult<UploadSlot>) {
        self.upload_slots.lock().unwrap().push_back(result);
    }

    pub fn push_direct_upload(&self, result: ApiResult<()>) {
        self.direct_uploads.lock().unwrap().push_back(result);
    }

    pub fn push_inline_upload(&self, result: ApiResult<InlineUpload>) {
        self.inline_uploads.lock().unwrap().push_back(result);
    }

    pub fn push_workflow_start(&self, result: ApiResult<WorkflowStarted>) {
        self.workflow_starts.lock().unwrap().push_back(result);
    }

    pub fn push_single_pass_start(&self, result: ApiResult<WorkflowStarted>) {
        self.single_pass_starts.lock().unwrap().push_back(result);
    }

    pub fn push_metadata(&self, result: ApiResult<PhotoMetadata>) {
        self.metadata_responses.lock().unwrap().push_back(result);
    }

    pub fn set_metadata_default(&self, result: ApiResult<PhotoMetadata>) {
        *self.metadata_default.lock().unwrap() = Some(result);
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn metadata_call_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, BackendCall::FetchMetadata { .. }))
            .count()
    }

    pub fn inline_upload_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, BackendCall::InlineUpload { .. }))
            .count()
    }

    fn record(&self, call: BackendCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn pop<T>(queue: &Scripted<T>) -> Option<ApiResult<T>> {
        queue.lock().unwrap().pop_front()
    }
}

#[async_trait]
impl AnalysisBackend for MockBackend {
    async fn request_upload_slot(
        &self,
        user_id: Option<&str>,
        _content_type: &str,
    ) -> ApiResult<UploadSlot> {
        self.record(BackendCall::UploadSlot {
            user_id: user_id.map(str::to_string),
        });
        Self::pop(&self.upload_slots)
            .unwrap_or_else(|| Err(ApiError::Request("no scripted upload slot".to_string())))
    }

    async fn upload_direct(
        &self,
        upload_url: &str,
        _content_type: &str,
        _bytes: &[u8],
    ) -> ApiResult<()> {
        self.record(BackendCall::DirectUpload {
            upload_url: upload_url.to_string(),
        });
        Self::pop(&self.direct_uploads)
            .unwrap_or_else(|| Err(ApiError::Request("no scripted direct upload".to_string())))
    }

    async fn upload_inline(
        &self,
        user_id: Option<&str>,
        _content_type: &str,
        _bytes: &[u8],
    ) -> ApiResult<InlineUpload> {
        self.record(BackendCall::InlineUpload {
            user_id: user_id.map(str::to_string),
        });
        Self::pop(&self.inline_uploads)
            .unwrap_or_else(|| Err(ApiError::Request("no scripted inline upload".to_string())))
    }

    async fn start_workflow(
        &self,
        photo_id: &str,
        s3_key: Option<&str>,
    ) -> ApiResult<WorkflowStarted> {
        self.record(BackendCall::StartWorkflow {
            photo_id: photo_id.to_string(),
            s3_key: s3_key.map(str::to_string),
        });
        Self::pop(&self.workflow_starts)
            .unwrap_or_else(|| Err(ApiError::Request("no scripted workflow start".to_string())))
    }

    async fn start_single_pass(
        &self,
        photo_id: &str,
        s3_key: Option<&str>,
    ) -> ApiResult<WorkflowStarted> {
        self.record(BackendCall::StartSinglePass {
            photo_id: photo_id.to_string(),
            s3_key: s3_key.map(str::to_string),
        });
        Self::pop(&self.single_pass_starts)
            .unwrap_or_else(|| Err(ApiError::Request("no scripted single pass".to_string())))
    }

    async fn fetch_metadata(&self, photo_id: &str) -> ApiResult<PhotoMetadata> {
        self.record(BackendCall::FetchMetadata {
            photo_id: photo_id.to_string(),
        });
        if let Some(result) = Self::pop(&self.metadata_responses) {
            return result;
        }
        if let Some(default) = self.metadata_default.lock().unwrap().clone() {
            return default;
        }
        Err(ApiError::Request("no scripted metadata".to_string()))
    }
}

/// A controller bound to a [`MockBackend`], with millisecond polling so
/// tests run fast. No socket endpoint is configured: tests drive stage
/// events through the sink directly and exercise the polling-only mode.
pub struct ControllerHarness {
    pub backend: Arc<MockBackend>,
    pub controller: AnalysisController,
}

impl ControllerHarness {
    pub fn new() -> Self {
        Self::with_config(fast_config())
    }

    pub fn with_config(config: ClientConfig) -> Self {
        let backend = MockBackend::new();
        let controller = AnalysisController::new(backend.clone(), config);
        Self {
            backend,
            controller,
        }
    }
}

impl Default for ControllerHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Fast timing for tests: 1 ms polls, small budgets.
pub fn fast_config() -> ClientConfig {
    ClientConfig {
        api_base_url: "http://127.0.0.1:9/api".to_string(),
        status_socket_url: None,
        poll_interval_ms: 1,
        max_poll_attempts: 25,
        confirm_tick_ms: 1,
        confirm_ceiling_ms: 500,
    }
}

/// Config with a slow poll interval, for tests that need to interrupt a run
/// before its first poll lands.
pub fn slow_poll_config() -> ClientConfig {
    ClientConfig {
        poll_interval_ms: 50,
        max_poll_attempts: 100,
        ..fast_config()
    }
}

/// Polls a condition for up to ~2 seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..1000 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    false
}
