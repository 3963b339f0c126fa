//! Per-stage status tracking for a running analysis: the push channel, the
//! event envelope, and the in-memory registry the UI reads from.

pub mod channel;
pub mod event;
pub mod registry;
pub mod stage;

pub use channel::{StageSink, StatusChannel};
pub use event::StageEvent;
pub use registry::{StageRegistry, StageStatus};
pub use stage::{AnalysisStage, StageState};
