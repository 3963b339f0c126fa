//! Speculative background analysis behind a user confirmation gate.
//!
//! Upload kicks the pipeline off immediately while the user is still looking
//! at a preview. Confirming surfaces the captured outcome, instantly when
//! the background run already finished. Rejecting cancels the run before
//! anything is shown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, info};

use crate::api::PhotoMetadata;
use crate::error::AnalysisError;

use super::controller::{AnalysisController, PipelineMode};
use super::wait::{sleep_abortable, WaitOutcome};

#[derive(Default)]
struct Captured {
    result: Option<PhotoMetadata>,
    error: Option<AnalysisError>,
}

/// Outcome slots shared between the background run and the confirmation
/// path. Both sides consult the same captured state, so the race between
/// the run finishing and the user clicking confirm cannot show divergent
/// results.
pub struct SessionOutcome {
    captured: Mutex<Captured>,
    cancelled: AtomicBool,
}

impl SessionOutcome {
    pub(crate) fn new() -> Self {
        Self {
            captured: Mutex::new(Captured::default()),
            cancelled: AtomicBool::new(false),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Marks the session rejected. Captures arriving afterwards are dropped,
    /// so a late background completion never surfaces.
    pub(crate) fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Stores the background run's outcome. At most one of result/error is
    /// ever set; the first capture wins and a cancelled session captures
    /// nothing.
    pub(crate) fn capture(&self, outcome: Result<PhotoMetadata, AnalysisError>) {
        if self.is_cancelled() {
            debug!("Discarding background outcome for cancelled session");
            return;
        }
        let mut guard = match self.captured.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if guard.result.is_some() || guard.error.is_some() {
            return;
        }
        match outcome {
            Ok(metadata) => guard.result = Some(metadata),
            // A cancelled run has no outcome to remember.
            Err(AnalysisError::Cancelled) => {}
            Err(error) => guard.error = Some(error),
        }
    }

    pub fn result(&self) -> Option<PhotoMetadata> {
        match self.captured.lock() {
            Ok(guard) => guard.result.clone(),
            Err(poisoned) => poisoned.into_inner().result.clone(),
        }
    }

    pub fn error(&self) -> Option<AnalysisError> {
        match self.captured.lock() {
            Ok(guard) => guard.error.clone(),
            Err(poisoned) => poisoned.into_inner().error.clone(),
        }
    }

    pub fn is_settled(&self) -> bool {
        match self.captured.lock() {
            Ok(guard) => guard.result.is_some() || guard.error.is_some(),
            Err(poisoned) => {
                let guard = poisoned.into_inner();
                guard.result.is_some() || guard.error.is_some()
            }
        }
    }
}

impl AnalysisController {
    /// Uploads a photo and starts the analysis in the background without
    /// entering a user-visible analyzing state. Returns the photo id for the
    /// preview; call [`confirm_analysis`](Self::confirm_analysis) to surface
    /// the outcome or [`cancel_and_reset`](Self::cancel_and_reset) to reject
    /// it.
    pub async fn upload_and_start_analysis(
        &self,
        bytes: &[u8],
        content_type: &str,
        user_id: Option<&str>,
    ) -> Result<String, AnalysisError> {
        let run = self.begin_run();

        let (photo_id, storage_key) =
            match self.upload_photo(&run, bytes, content_type, user_id).await {
                Ok(ids) => ids,
                Err(error) => {
                    if self.clear_current(&run) {
                        let message = error.message();
                        self.with_state(|state| {
                            state.uploading = false;
                            state.upload_error = Some(message);
                        });
                        return Err(error);
                    }
                    return Err(AnalysisError::Cancelled);
                }
            };

        self.with_state(|state| {
            state.uploading = false;
            state.photo_id = Some(photo_id.clone());
            state.storage_key = Some(storage_key.clone());
        });

        let outcome = Arc::new(SessionOutcome::new());
        self.set_session(outcome.clone());
        self.seed_stages(PipelineMode::MultiStage);
        self.connect_channel(&photo_id);

        info!("Starting background analysis for photo {}", photo_id);
        let controller = self.clone();
        let background_run = run.clone();
        let background_photo = photo_id.clone();
        tokio::spawn(async move {
            if background_run.is_cancelled() {
                return;
            }
            let trigger = controller
                .inner
                .backend
                .start_workflow(&background_photo, Some(&storage_key))
                .await;
            let result = match trigger {
                Err(error) => Err(AnalysisError::from(error)),
                Ok(_) => {
                    controller
                        .poll_until_terminal(&background_run, &background_photo)
                        .await
                }
            };

            let was_cancelled = matches!(result, Err(AnalysisError::Cancelled));
            outcome.capture(result);

            if !was_cancelled
                && !outcome.is_cancelled()
                && controller.is_current(&background_run)
            {
                controller.with_state(|state| state.background_complete = true);
                controller.inner.channel.disconnect();
                debug!("Background analysis settled for photo {}", background_photo);
            }
        });

        Ok(photo_id)
    }

    /// Surfaces the background run's outcome after the user confirms.
    ///
    /// The captured outcome is checked before any wait, so a run that
    /// already finished resolves immediately with no further network calls.
    /// Otherwise this ticks against the shared session slots until the
    /// outcome lands or the confirmation window closes. Window exhaustion
    /// is a timeout, distinct from a pipeline-reported failure.
    pub async fn confirm_analysis(&self) -> Result<PhotoMetadata, AnalysisError> {
        let Some(outcome) = self.current_session() else {
            let error =
                AnalysisError::Request("No analysis is waiting for confirmation".to_string());
            self.with_state(|state| state.error = Some(error.message()));
            return Err(error);
        };

        self.with_state(|state| {
            state.error = None;
            state.upload_error = None;
            state.analyzing = true;
        });

        let tick = Duration::from_millis(self.inner.config.confirm_tick_ms.max(1));
        let budget = (self.inner.config.confirm_ceiling_ms
            / self.inner.config.confirm_tick_ms.max(1))
        .max(1);
        let cancel = self
            .current_run()
            .map(|run| run.token().clone())
            .unwrap_or_default();

        for _ in 0..budget {
            if outcome.is_cancelled() {
                self.with_state(|state| state.analyzing = false);
                return Err(AnalysisError::Cancelled);
            }
            if let Some(metadata) = outcome.result() {
                self.with_state(|state| {
                    state.analyzing = false;
                    state.metadata = Some(metadata.clone());
                    state.error = None;
                });
                self.clear_gate();
                return Ok(metadata);
            }
            if let Some(error) = outcome.error() {
                let message = error.message();
                self.with_state(|state| {
                    state.analyzing = false;
                    state.error = Some(message);
                });
                self.clear_gate();
                return Err(error);
            }

            if sleep_abortable(tick, &cancel).await == WaitOutcome::Cancelled {
                // The run token fired (user cancel or a fail-fast stage
                // event); give the background task a turn to record its
                // outcome before the next check instead of spinning.
                tokio::time::sleep(tick).await;
            }
        }

        let error = AnalysisError::Timeout(
            "Analysis result was not available within the confirmation window".to_string(),
        );
        self.with_state(|state| {
            state.analyzing = false;
            state.error = Some(error.message());
        });
        Err(error)
    }

    /// Rejects the preview: marks the session cancelled, aborts the
    /// in-flight background run and clears all state. The run's eventual
    /// completion is never surfaced.
    pub fn cancel_and_reset(&self) {
        self.reset();
    }

    /// Tears down the confirmation gate after its outcome was surfaced.
    fn clear_gate(&self) {
        let _ = self.take_session();
        if let Some(run) = self.current_run() {
            let _ = self.clear_current(&run);
        }
    }
}
