use serde_json::Value;

use crate::error::describe_failure;

use super::stage::{AnalysisStage, StageState};

/// One normalized stage-status update from the push channel.
#[derive(Debug, Clone, PartialEq)]
pub struct StageEvent {
    pub stage: AnalysisStage,
    pub value: StageState,
    /// Human-readable failure detail, present only when `value` is failed.
    pub details: Option<String>,
}

impl StageEvent {
    /// Parses a raw push frame into a normalized event.
    ///
    /// The envelope is `{stage, status, error?}`; legacy frames carry the
    /// stage under `event` instead. Returns `None` for anything that does
    /// not resolve to a known stage and state. Callers log and drop those;
    /// a malformed frame must never take the channel down.
    pub fn parse(raw: &str) -> Option<StageEvent> {
        let frame: Value = serde_json::from_str(raw).ok()?;

        let stage_name = frame
            .get("stage")
            .and_then(Value::as_str)
            .or_else(|| frame.get("event").and_then(Value::as_str))?;
        let stage = AnalysisStage::parse(stage_name)?;

        let value = StageState::parse(frame.get("status").and_then(Value::as_str)?)?;

        let details = if value == StageState::Failed {
            frame
                .get("error")
                .filter(|error| !error.is_null())
                .map(describe_failure)
        } else {
            None
        };

        Some(StageEvent {
            stage,
            value,
            details,
        })
    }
}
