//! Orchestrator state machine and externally-visible status (spec.md §4.9,
//! §6 "scheduler_status").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The orchestrator's own run state, distinct from `SolverStatus` (which
/// describes a single solve's outcome).
#[cfg_attr(feature = "swagger", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrchestratorState {
    Idle,
    Ticking,
    Paused,
    Failed,
}

impl Default for OrchestratorState {
    fn default() -> Self {
        OrchestratorState::Idle
    }
}

/// Status snapshot exposed to whatever surface reports on the planner
/// (spec.md §6: "running, last_run, next_run, last_error").
#[cfg_attr(feature = "swagger", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerStatus {
    pub state: OrchestratorState,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}
