//! The analysis state machine: upload with fallback, workflow trigger,
//! interval polling with fail-fast channel events, cancellation.

use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::api::{AnalysisBackend, ApiError, ExecutionStatus, PhotoMetadata};
use crate::config::ClientConfig;
use crate::error::AnalysisError;
use crate::status::{AnalysisStage, StageEvent, StageRegistry, StageSink, StageState, StatusChannel};

use super::session::SessionOutcome;
use super::snapshot::AnalysisSnapshot;
use super::wait::{sleep_abortable, WaitOutcome};

/// Which backend pipeline a run drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineMode {
    /// Orchestrator, concurrent wireframe + color stages, overlay merge.
    MultiStage,
    /// The single-pass detection alternative.
    SinglePass,
}

impl PipelineMode {
    fn label(&self) -> &'static str {
        match self {
            PipelineMode::MultiStage => "multi-stage",
            PipelineMode::SinglePass => "single-pass",
        }
    }
}

/// Tracks one run: its cancellation token plus a failure reported out of
/// band by the status channel. Failing cancels the token so waits end early;
/// the poll loop checks the failure slot first to tell the two apart.
pub(crate) struct RunGuard {
    token: CancellationToken,
    failure: Mutex<Option<String>>,
}

impl RunGuard {
    fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            failure: Mutex::new(None),
        }
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub(crate) fn abort(&self) {
        self.token.cancel();
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Records a channel-reported failure and wakes any pending wait.
    /// The first failure wins.
    pub(crate) fn fail(&self, message: String) {
        {
            let mut guard = match self.failure.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if guard.is_none() {
                *guard = Some(message);
            }
        }
        self.token.cancel();
    }

    pub(crate) fn failure(&self) -> Option<String> {
        match self.failure.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[derive(Default)]
pub(crate) struct SessionState {
    pub(crate) uploading: bool,
    pub(crate) analyzing: bool,
    pub(crate) photo_id: Option<String>,
    pub(crate) storage_key: Option<String>,
    pub(crate) metadata: Option<PhotoMetadata>,
    pub(crate) error: Option<String>,
    pub(crate) upload_error: Option<String>,
    pub(crate) background_complete: bool,
}

pub(crate) struct ControllerInner {
    pub(crate) backend: Arc<dyn AnalysisBackend>,
    pub(crate) registry: StageRegistry,
    pub(crate) channel: StatusChannel,
    pub(crate) config: ClientConfig,
    state: RwLock<SessionState>,
    run: Mutex<Option<Arc<RunGuard>>>,
    session: Mutex<Option<Arc<SessionOutcome>>>,
}

/// Coordinates one photo-analysis session at a time.
///
/// Cheap to clone; clones share state. All methods take `&self` and the
/// controller stays responsive to [`reset`](AnalysisController::reset) while
/// a run is suspended on a network call or poll wait.
#[derive(Clone)]
pub struct AnalysisController {
    pub(crate) inner: Arc<ControllerInner>,
}

impl AnalysisController {
    pub fn new(backend: Arc<dyn AnalysisBackend>, config: ClientConfig) -> Self {
        let channel = StatusChannel::new(config.status_socket_url.clone());
        Self {
            inner: Arc::new(ControllerInner {
                backend,
                registry: StageRegistry::new(),
                channel,
                config,
                state: RwLock::new(SessionState::default()),
                run: Mutex::new(None),
                session: Mutex::new(None),
            }),
        }
    }

    /// Uploads a photo and runs the multi-stage analysis to completion.
    ///
    /// The direct-to-storage upload falls back to the inline API upload on a
    /// transport block; the caller only sees a failure when both paths fail.
    pub async fn upload_and_analyze(
        &self,
        bytes: &[u8],
        content_type: &str,
        user_id: Option<&str>,
    ) -> Result<PhotoMetadata, AnalysisError> {
        let run = self.begin_run();

        let (photo_id, storage_key) =
            match self.upload_photo(&run, bytes, content_type, user_id).await {
                Ok(ids) => ids,
                Err(error) => return self.finish(&run, Err(error)),
            };

        self.with_state(|state| {
            state.uploading = false;
            state.analyzing = true;
            state.photo_id = Some(photo_id.clone());
            state.storage_key = Some(storage_key.clone());
        });
        self.seed_stages(PipelineMode::MultiStage);
        self.connect_channel(&photo_id);

        info!("Starting analysis workflow for photo {}", photo_id);
        if let Err(error) = self
            .inner
            .backend
            .start_workflow(&photo_id, Some(&storage_key))
            .await
        {
            return self.finish(&run, Err(error.into()));
        }

        let span = tracing::info_span!("poll_metadata", photo_id = %photo_id);
        let outcome = self.poll_until_terminal(&run, &photo_id).instrument(span).await;
        self.finish(&run, outcome)
    }

    /// Re-runs analysis for an already-uploaded photo.
    pub async fn analyze_photo(
        &self,
        photo_id: &str,
        mode: PipelineMode,
    ) -> Result<PhotoMetadata, AnalysisError> {
        let run = self.begin_run();

        self.with_state(|state| {
            state.analyzing = true;
            state.photo_id = Some(photo_id.to_string());
        });
        self.seed_stages(mode);
        self.connect_channel(photo_id);

        info!("Starting {} analysis for photo {}", mode.label(), photo_id);
        let trigger = match mode {
            PipelineMode::MultiStage => self.inner.backend.start_workflow(photo_id, None).await,
            PipelineMode::SinglePass => self.inner.backend.start_single_pass(photo_id, None).await,
        };
        if let Err(error) = trigger {
            return self.finish(&run, Err(error.into()));
        }

        let span = tracing::info_span!("poll_metadata", photo_id = %photo_id);
        let outcome = self.poll_until_terminal(&run, photo_id).instrument(span).await;
        self.finish(&run, outcome)
    }

    /// Current session state plus the full stage map.
    pub fn snapshot(&self) -> AnalysisSnapshot {
        let stages = self.inner.registry.snapshot();
        self.read_state(|state| AnalysisSnapshot {
            uploading: state.uploading,
            analyzing: state.analyzing,
            photo_id: state.photo_id.clone(),
            metadata: state.metadata.clone(),
            error: state.error.clone(),
            upload_error: state.upload_error.clone(),
            background_analysis_complete: state.background_complete,
            stages,
        })
    }

    /// Returns to idle from any state: aborts the active run, cancels any
    /// pending confirmation session, disconnects the channel and clears all
    /// session state. In-flight network calls may still complete but their
    /// results are discarded. Idempotent.
    pub fn reset(&self) {
        if let Some(run) = self.take_run() {
            run.abort();
        }
        if let Some(session) = self.take_session() {
            session.cancel();
        }
        self.inner.channel.disconnect();
        self.inner.registry.reset();
        self.with_state(|state| *state = SessionState::default());
        debug!("Analysis session reset");
    }

    // ─── Shared run machinery ───────────────────────────────────────────────

    /// Supersedes any previous run and installs a fresh guard.
    pub(crate) fn begin_run(&self) -> Arc<RunGuard> {
        self.reset();
        let run = Arc::new(RunGuard::new());
        *self.lock_run() = Some(run.clone());
        run
    }

    /// Requests a slot and uploads, falling back to the inline path when the
    /// direct upload is blocked. Returns the ids the trigger must use; the
    /// fallback issues its own.
    pub(crate) async fn upload_photo(
        &self,
        run: &Arc<RunGuard>,
        bytes: &[u8],
        content_type: &str,
        user_id: Option<&str>,
    ) -> Result<(String, String), AnalysisError> {
        self.with_state(|state| state.uploading = true);
        let slot = self
            .inner
            .backend
            .request_upload_slot(user_id, content_type)
            .await?;
        debug!(
            "Upload slot issued for photo {} (key {})",
            slot.photo_id, slot.s3_key
        );
        if run.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }

        match self
            .inner
            .backend
            .upload_direct(&slot.upload_url, content_type, bytes)
            .await
        {
            Ok(()) => Ok((slot.photo_id, slot.s3_key)),
            Err(ApiError::UploadBlocked(reason)) => {
                warn!("Direct upload blocked ({}); retrying through the API", reason);
                let inline = self
                    .inner
                    .backend
                    .upload_inline(user_id, content_type, bytes)
                    .await?;
                Ok((inline.photo_id, inline.s3_key))
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Polls metadata until the run reaches a terminal state, the attempt
    /// budget runs out, or the run is cancelled. A channel-reported stage
    /// failure is authoritative and ends the loop without waiting for the
    /// backend record to catch up.
    pub(crate) async fn poll_until_terminal(
        &self,
        run: &Arc<RunGuard>,
        photo_id: &str,
    ) -> Result<PhotoMetadata, AnalysisError> {
        let interval = Duration::from_millis(self.inner.config.poll_interval_ms.max(1));
        let attempts = self.inner.config.max_poll_attempts.max(1);

        for attempt in 1..=attempts {
            if let Some(message) = run.failure() {
                return Err(AnalysisError::Pipeline(message));
            }
            if run.is_cancelled() {
                return Err(AnalysisError::Cancelled);
            }

            if sleep_abortable(interval, run.token()).await == WaitOutcome::Cancelled {
                if let Some(message) = run.failure() {
                    return Err(AnalysisError::Pipeline(message));
                }
                return Err(AnalysisError::Cancelled);
            }
            // Re-check after the wait: the select can resolve the timer even
            // when cancellation raced it.
            if let Some(message) = run.failure() {
                return Err(AnalysisError::Pipeline(message));
            }
            if run.is_cancelled() {
                return Err(AnalysisError::Cancelled);
            }

            match self.inner.backend.fetch_metadata(photo_id).await {
                Ok(metadata) => match metadata.effective_status() {
                    ExecutionStatus::Pending | ExecutionStatus::Processing => {
                        debug!(
                            "Photo {} still {} after poll {}/{}",
                            photo_id,
                            metadata.effective_status(),
                            attempt,
                            attempts
                        );
                    }
                    ExecutionStatus::Completed => {
                        info!(
                            "Analysis completed for photo {} after {} polls",
                            photo_id, attempt
                        );
                        return Ok(metadata);
                    }
                    ExecutionStatus::Failed => {
                        let message = metadata.error.clone().unwrap_or_else(|| {
                            "Analysis pipeline reported failure".to_string()
                        });
                        return Err(AnalysisError::Pipeline(message));
                    }
                    ExecutionStatus::Unknown => {
                        let message = metadata.error.clone().unwrap_or_else(|| {
                            "Analysis ended in an unrecognized status".to_string()
                        });
                        return Err(AnalysisError::Pipeline(message));
                    }
                },
                Err(error) => warn!(
                    "Metadata poll {}/{} for photo {} failed: {}",
                    attempt, attempts, photo_id, error
                ),
            }
        }

        Err(AnalysisError::Timeout(format!(
            "Analysis did not reach a terminal state within {} polls",
            attempts
        )))
    }

    /// Writes the terminal outcome into session state and tears the run
    /// down. A run superseded by a reset (or a newer run) never touches
    /// state; its outcome is discarded.
    pub(crate) fn finish(
        &self,
        run: &Arc<RunGuard>,
        outcome: Result<PhotoMetadata, AnalysisError>,
    ) -> Result<PhotoMetadata, AnalysisError> {
        self.inner.channel.disconnect();
        if !self.clear_current(run) {
            return Err(AnalysisError::Cancelled);
        }

        match &outcome {
            Ok(metadata) => {
                let metadata = metadata.clone();
                self.with_state(|state| {
                    state.uploading = false;
                    state.analyzing = false;
                    state.metadata = Some(metadata);
                    state.error = None;
                });
            }
            Err(AnalysisError::Cancelled) => {}
            Err(error) => {
                let message = error.message();
                self.with_state(|state| {
                    state.uploading = false;
                    state.analyzing = false;
                    state.error = Some(message);
                });
            }
        }
        outcome
    }

    /// Seeds the optimistic stage display for a fresh run: the caller should
    /// not have to wait for a server acknowledgment to show progress. Runs
    /// the same in push and polling-only modes.
    pub(crate) fn seed_stages(&self, mode: PipelineMode) {
        self.inner.registry.reset();
        match mode {
            PipelineMode::MultiStage => {
                self.inner
                    .registry
                    .update(AnalysisStage::Orchestrator, StageState::Running, None);
                for stage in [
                    AnalysisStage::Wireframe,
                    AnalysisStage::Color,
                    AnalysisStage::Overlay,
                ] {
                    self.inner.registry.update(stage, StageState::Pending, None);
                }
            }
            PipelineMode::SinglePass => {
                self.inner
                    .registry
                    .update(AnalysisStage::SingleAgent, StageState::Running, None);
            }
        }
    }

    pub(crate) fn connect_channel(&self, photo_id: &str) {
        let sink: Arc<dyn StageSink> = Arc::new(self.clone());
        self.inner.channel.connect(photo_id, sink);
    }

    // ─── State and slot accessors ───────────────────────────────────────────

    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let mut guard = match self.inner.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Session state lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        f(&mut guard)
    }

    pub(crate) fn read_state<R>(&self, f: impl FnOnce(&SessionState) -> R) -> R {
        let guard = match self.inner.state.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Session state lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        f(&guard)
    }

    fn lock_run(&self) -> std::sync::MutexGuard<'_, Option<Arc<RunGuard>>> {
        match self.inner.run.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Run slot lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn lock_session(&self) -> std::sync::MutexGuard<'_, Option<Arc<SessionOutcome>>> {
        match self.inner.session.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Session slot lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    pub(crate) fn current_run(&self) -> Option<Arc<RunGuard>> {
        self.lock_run().clone()
    }

    pub(crate) fn is_current(&self, run: &Arc<RunGuard>) -> bool {
        self.lock_run()
            .as_ref()
            .map(|current| Arc::ptr_eq(current, run))
            .unwrap_or(false)
    }

    /// Clears the run slot if it still holds this run. Returns whether it did.
    pub(crate) fn clear_current(&self, run: &Arc<RunGuard>) -> bool {
        let mut guard = self.lock_run();
        if guard
            .as_ref()
            .map(|current| Arc::ptr_eq(current, run))
            .unwrap_or(false)
        {
            *guard = None;
            true
        } else {
            false
        }
    }

    fn take_run(&self) -> Option<Arc<RunGuard>> {
        self.lock_run().take()
    }

    pub(crate) fn set_session(&self, session: Arc<SessionOutcome>) {
        *self.lock_session() = Some(session);
    }

    pub(crate) fn current_session(&self) -> Option<Arc<SessionOutcome>> {
        self.lock_session().clone()
    }

    pub(crate) fn take_session(&self) -> Option<Arc<SessionOutcome>> {
        self.lock_session().take()
    }

    fn has_active_session(&self) -> bool {
        self.lock_session()
            .as_ref()
            .map(|session| !session.is_cancelled())
            .unwrap_or(false)
    }
}

impl StageSink for AnalysisController {
    fn stage_event(&self, event: StageEvent) {
        // Coalesce out-of-order events: a settled stage never regresses.
        if let Some(current) = self.inner.registry.get(event.stage) {
            if current.value.is_terminal() {
                debug!(
                    "Ignoring out-of-order {} event for settled stage {}",
                    event.value, event.stage
                );
                return;
            }
        }
        self.inner
            .registry
            .update(event.stage, event.value, event.details.clone());

        if event.value != StageState::Failed {
            return;
        }

        // A failed stage is authoritative: fail the run without waiting for
        // polling to observe it.
        let message = event
            .details
            .unwrap_or_else(|| format!("{} stage failed", event.stage));
        let Some(run) = self.current_run() else {
            return;
        };
        if run.is_cancelled() {
            return;
        }
        run.fail(message.clone());

        // In the confirmation-gated flow the failure stays captured until the
        // user proceeds; immediate mode surfaces it right away.
        if !self.has_active_session() {
            self.with_state(|state| state.error = Some(message));
        }
    }
}
