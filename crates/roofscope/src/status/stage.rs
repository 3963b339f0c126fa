use serde::{Deserialize, Serialize};

/// The named steps of the analysis pipeline.
///
/// `Wireframe` and `Color` run concurrently on the backend; `Overlay` merges
/// their outputs. `SingleAgent` is the single-pass alternative that bypasses
/// the fan-out entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStage {
    Orchestrator,
    Wireframe,
    Color,
    Overlay,
    SingleAgent,
}

impl AnalysisStage {
    pub const ALL: [AnalysisStage; 5] = [
        AnalysisStage::Orchestrator,
        AnalysisStage::Wireframe,
        AnalysisStage::Color,
        AnalysisStage::Overlay,
        AnalysisStage::SingleAgent,
    ];

    /// Stages of the multi-stage workflow, in reporting order.
    pub const MULTI_STAGE: [AnalysisStage; 4] = [
        AnalysisStage::Orchestrator,
        AnalysisStage::Wireframe,
        AnalysisStage::Color,
        AnalysisStage::Overlay,
    ];

    /// Resolves a stage name from a status frame, folding the legacy and
    /// per-agent aliases onto the canonical identifiers.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "orchestrator" | "workflow" => Some(AnalysisStage::Orchestrator),
            "wireframe" | "agent1" | "agent_wireframe" => Some(AnalysisStage::Wireframe),
            "color" | "agent2" | "agent_color" => Some(AnalysisStage::Color),
            "overlay" | "merge" | "agent3" | "agent_overlay" => Some(AnalysisStage::Overlay),
            "single_agent" | "agent_single" | "single" => Some(AnalysisStage::SingleAgent),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStage::Orchestrator => "orchestrator",
            AnalysisStage::Wireframe => "wireframe",
            AnalysisStage::Color => "color",
            AnalysisStage::Overlay => "overlay",
            AnalysisStage::SingleAgent => "single_agent",
        }
    }
}

impl std::fmt::Display for AnalysisStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Progress of one stage within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    Idle,
    Pending,
    Running,
    Completed,
    Failed,
}

impl StageState {
    /// Resolves a status string from a frame, tolerating the synonyms the
    /// backend has used across versions.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "idle" => Some(StageState::Idle),
            "pending" | "queued" => Some(StageState::Pending),
            "running" | "processing" | "in_progress" | "started" => Some(StageState::Running),
            "completed" | "complete" | "succeeded" | "success" => Some(StageState::Completed),
            "failed" | "error" | "failure" => Some(StageState::Failed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StageState::Idle => "idle",
            StageState::Pending => "pending",
            StageState::Running => "running",
            StageState::Completed => "completed",
            StageState::Failed => "failed",
        }
    }

    /// True once a stage can no longer advance.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StageState::Completed | StageState::Failed)
    }
}

impl std::fmt::Display for StageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_parse_canonical_names() {
        assert_eq!(
            AnalysisStage::parse("orchestrator"),
            Some(AnalysisStage::Orchestrator)
        );
        assert_eq!(
            AnalysisStage::parse("wireframe"),
            Some(AnalysisStage::Wireframe)
        );
        assert_eq!(
            AnalysisStage::parse("single_agent"),
            Some(AnalysisStage::SingleAgent)
        );
    }

    #[test]
    fn test_stage_parse_aliases() {
        assert_eq!(
            AnalysisStage::parse("workflow"),
            Some(AnalysisStage::Orchestrator)
        );
        assert_eq!(AnalysisStage::parse("agent1"), Some(AnalysisStage::Wireframe));
        assert_eq!(AnalysisStage::parse("agent2"), Some(AnalysisStage::Color));
        assert_eq!(AnalysisStage::parse("agent3"), Some(AnalysisStage::Overlay));
        assert_eq!(AnalysisStage::parse("merge"), Some(AnalysisStage::Overlay));
        assert_eq!(
            AnalysisStage::parse("single-agent"),
            Some(AnalysisStage::SingleAgent)
        );
        assert_eq!(
            AnalysisStage::parse("Agent-Single"),
            Some(AnalysisStage::SingleAgent)
        );
    }

    #[test]
    fn test_stage_parse_rejects_unknown() {
        assert_eq!(AnalysisStage::parse("agent9"), None);
        assert_eq!(AnalysisStage::parse(""), None);
    }

    #[test]
    fn test_aliases_collapse_to_stable_identifiers() {
        // Different spellings of the same stage must map to the same entry,
        // so a mixed event stream cannot produce duplicate display rows.
        let spellings = ["wireframe", "agent1", "AGENT1", "agent-wireframe"];
        for spelling in spellings {
            assert_eq!(
                AnalysisStage::parse(spelling),
                Some(AnalysisStage::Wireframe),
                "spelling {:?}",
                spelling
            );
        }
    }

    #[test]
    fn test_state_parse_synonyms() {
        assert_eq!(StageState::parse("processing"), Some(StageState::Running));
        assert_eq!(StageState::parse("queued"), Some(StageState::Pending));
        assert_eq!(StageState::parse("succeeded"), Some(StageState::Completed));
        assert_eq!(StageState::parse("error"), Some(StageState::Failed));
        assert_eq!(StageState::parse("partial"), None);
    }

    #[test]
    fn test_terminal_states() {
        assert!(StageState::Completed.is_terminal());
        assert!(StageState::Failed.is_terminal());
        assert!(!StageState::Running.is_terminal());
        assert!(!StageState::Idle.is_terminal());
    }
}
