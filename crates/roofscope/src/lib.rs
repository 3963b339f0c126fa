pub mod analysis;
pub mod api;
pub mod config;
pub mod error;
pub mod status;

pub use analysis::{
    sleep_abortable, AnalysisController, AnalysisSnapshot, PipelineMode, SessionOutcome,
    WaitOutcome,
};
pub use api::{
    AnalysisBackend, ApiClient, ApiError, Detection, ExecutionStatus, InlineUpload, Material,
    PhotoMetadata, UploadSlot, WorkflowStarted,
};
pub use config::{load_config, ClientConfig};
pub use error::{describe_failure, AnalysisError, ConfigError, Result, UNKNOWN_ERROR};
pub use status::{
    AnalysisStage, StageEvent, StageRegistry, StageSink, StageState, StageStatus, StatusChannel,
};
