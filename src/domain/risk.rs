use serde::{Deserialize, Serialize};

/// Selects between the static and dynamic S-index modes (spec.md §4.5).
#[cfg_attr(feature = "swagger", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RiskMode {
    Static,
    Dynamic,
}

/// Configuration for the risk/S-index engine (spec.md §3 "RiskProfile").
#[cfg_attr(feature = "swagger", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskProfile {
    pub base_factor: f64,
    pub max_factor: f64,
    pub mode: RiskMode,
    pub pv_deficit_weight: f64,
    pub temp_weight: f64,
    pub temp_baseline_c: f64,
    pub temp_cold_c: f64,
    /// Day offsets to look ahead when computing PV-deficit/temperature
    /// signals (e.g. `[2, 3, 4]`).
    pub days_ahead_for_sindex: Vec<u32>,
    /// 1..=5, higher appetite tolerates missing the terminal target more
    /// (maps to a lower `target_soc_penalty`).
    pub risk_appetite: u8,
}

impl RiskProfile {
    /// Bidirectional soft penalty applied to `target_under`/`target_over`
    /// slacks, derived from `risk_appetite` (spec.md §4.5). Appetite 1 is the
    /// most risk-averse (highest penalty); 5 is the most tolerant.
    pub fn target_soc_penalty(&self) -> f64 {
        const BASE_PENALTY: f64 = 500.0;
        let appetite = self.risk_appetite.clamp(1, 5) as f64;
        BASE_PENALTY / appetite
    }
}
