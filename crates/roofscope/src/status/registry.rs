use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::stage::{AnalysisStage, StageState};

/// Displayed status of one stage.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageStatus {
    pub stage: AnalysisStage,
    pub value: StageState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Current per-stage status for the active run. Pure state, no I/O.
///
/// Writes are last-write-wins; the event layer feeding this registry is
/// responsible for ordering (see the controller's sink). It is a display
/// aid, not a correctness-critical store.
pub struct StageRegistry {
    stages: RwLock<HashMap<AnalysisStage, StageStatus>>,
}

fn idle_map() -> HashMap<AnalysisStage, StageStatus> {
    let now = Utc::now();
    AnalysisStage::ALL
        .iter()
        .map(|stage| {
            (
                *stage,
                StageStatus {
                    stage: *stage,
                    value: StageState::Idle,
                    details: None,
                    updated_at: now,
                },
            )
        })
        .collect()
}

impl StageRegistry {
    pub fn new() -> Self {
        Self {
            stages: RwLock::new(idle_map()),
        }
    }

    /// Replaces the entry for a stage.
    pub fn update(&self, stage: AnalysisStage, value: StageState, details: Option<String>) {
        let mut guard = match self.stages.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Stage registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        guard.insert(
            stage,
            StageStatus {
                stage,
                value,
                details,
                updated_at: Utc::now(),
            },
        );
    }

    /// Returns the current status of one stage.
    pub fn get(&self, stage: AnalysisStage) -> Option<StageStatus> {
        let guard = match self.stages.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Stage registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        guard.get(&stage).cloned()
    }

    /// Restores every known stage to idle. Called at the start of each run.
    pub fn reset(&self) {
        let mut guard = match self.stages.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Stage registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        *guard = idle_map();
    }

    /// The full map in stable display order. Never partial.
    pub fn snapshot(&self) -> Vec<StageStatus> {
        let guard = match self.stages.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Stage registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        AnalysisStage::ALL
            .iter()
            .filter_map(|stage| guard.get(stage).cloned())
            .collect()
    }
}

impl Default for StageRegistry {
    fn default() -> Self {
        Self::new()
    }
}
