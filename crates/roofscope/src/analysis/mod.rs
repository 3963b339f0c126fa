//! The orchestration controller: upload, trigger, track, reconcile.

pub mod controller;
pub mod session;
pub mod snapshot;
pub mod wait;

pub use controller::{AnalysisController, PipelineMode};
pub use session::SessionOutcome;
pub use snapshot::AnalysisSnapshot;
pub use wait::{sleep_abortable, WaitOutcome};
