use serde::{Deserialize, Serialize};
use strum::Display;

use super::{BatteryState, Horizon, RiskProfile, WaterHeaterConfig};

/// Cost coefficients and penalty weights for the MILP objective (spec.md
/// §4.6), sourced from the `planner`/`arbitrage` config sections. Kept
/// separate from `BatteryState` (whose `wear_cost_per_kwh` this
/// complements) since these govern the objective shape rather than the
/// battery's physical envelope.
#[derive(Debug, Clone)]
pub struct CostModel {
    pub ramping_cost_per_kw: f64,
    pub export_threshold: f64,
    pub comfort_penalty: f64,
    pub spacing_penalty: f64,
    pub block_start_penalty: f64,
    /// Use the hard spacing formulation (`Σ water_on + M*water_start ≤ M`)
    /// rather than the soft `spacing_viol` linearization fallback.
    pub hard_spacing: bool,
    /// Whether `grid_import_limit_kw` is a soft cap (breach allowed, at
    /// `import_breach_penalty`) or a hard upper bound.
    pub grid_import_limit_soft: bool,
    pub import_breach_penalty: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            ramping_cost_per_kw: 0.0,
            export_threshold: 0.0,
            comfort_penalty: 50.0,
            spacing_penalty: 50.0,
            block_start_penalty: 0.01,
            hard_spacing: true,
            grid_import_limit_soft: true,
            import_breach_penalty: 5_000.0,
        }
    }
}

/// Everything the MILP solver (C6) needs for one planning tick (spec.md §3
/// "SolverInput"). Constructed exclusively by the input assembler (C4);
/// every invariant in spec.md §3 is checked before this value exists.
#[derive(Debug, Clone)]
pub struct SolverInput {
    pub horizon: Horizon,
    pub battery: BatteryState,
    pub water_heater: Option<WaterHeaterConfig>,
    pub risk: RiskProfile,
    pub cost: CostModel,
    pub initial_soc_kwh: f64,
    pub target_soc_kwh: Option<f64>,
    pub terminal_value_per_kwh: f64,
    pub grid_import_limit_kw: Option<f64>,
    pub max_export_kw: Option<f64>,
    pub export_enabled: bool,
}

/// Outcome of one MILP solve (spec.md §3 "SolverResult").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverResult {
    pub slots: Vec<SolverSlotResult>,
    pub total_cost: f64,
    pub status: SolverStatus,
    pub solve_time_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverSlotResult {
    pub charge_kwh: f64,
    pub discharge_kwh: f64,
    pub grid_import_kwh: f64,
    pub grid_export_kwh: f64,
    pub soc_end_kwh: f64,
    pub water_heat_on: bool,
}

#[cfg_attr(feature = "swagger", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SolverStatus {
    Optimal,
    Infeasible,
    Timeout,
    Error,
}

impl SolverResult {
    /// Per spec.md §4.6: anything other than `optimal` produces an empty
    /// schedule and is surfaced to the orchestrator.
    pub fn is_usable(&self) -> bool {
        self.status == SolverStatus::Optimal
    }
}
