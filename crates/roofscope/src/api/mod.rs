pub mod backend;
pub mod client;
pub mod error;
pub mod types;

pub use backend::AnalysisBackend;
pub use client::ApiClient;
pub use error::ApiError;
pub use types::{
    Detection, ExecutionStatus, InlineUpload, Material, PhotoMetadata, UploadSlot, WorkflowStarted,
};
