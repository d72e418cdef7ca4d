use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Static battery hardware/configuration parameters (spec.md §3 "BatteryState",
/// the configuration half; the live half -- current `soc_kwh` -- is passed
/// separately into `SolverInput` since it is read fresh on every tick).
#[cfg_attr(feature = "swagger", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatteryState {
    pub capacity_kwh: f64,
    pub min_soc_pct: f64,
    pub max_soc_pct: f64,
    pub max_charge_kw: f64,
    pub max_discharge_kw: f64,
    pub round_trip_eff: f64,
    pub wear_cost_per_kwh: f64,
    /// Set once the live-SoC-above-max-SoC warning has fired, so it is only
    /// emitted a single time per such excursion (spec.md §3).
    #[serde(default)]
    pub charging_forbidden_by_overshoot: bool,
}

#[derive(Debug, Error, PartialEq)]
pub enum BatteryStateError {
    #[error("capacity_kwh must be positive, got {0}")]
    NonPositiveCapacity(f64),
    #[error("min_soc_pct ({min}) must be <= max_soc_pct ({max})")]
    SocBoundsInverted { min: f64, max: f64 },
    #[error("soc percentages must lie within [0, 100], got min={min} max={max}")]
    SocOutOfRange { min: f64, max: f64 },
    #[error("max_charge_kw must be positive, got {0}")]
    NonPositiveMaxCharge(f64),
    #[error("max_discharge_kw must be positive, got {0}")]
    NonPositiveMaxDischarge(f64),
    #[error("round_trip_eff must be in (0, 1], got {0}")]
    EfficiencyOutOfRange(f64),
    #[error("wear_cost_per_kwh must be non-negative, got {0}")]
    NegativeWearCost(f64),
}

impl BatteryState {
    pub fn validate(&self) -> Result<(), BatteryStateError> {
        if !(self.capacity_kwh > 0.0) {
            return Err(BatteryStateError::NonPositiveCapacity(self.capacity_kwh));
        }
        if self.min_soc_pct < 0.0 || self.max_soc_pct > 100.0 {
            return Err(BatteryStateError::SocOutOfRange {
                min: self.min_soc_pct,
                max: self.max_soc_pct,
            });
        }
        if self.min_soc_pct > self.max_soc_pct {
            return Err(BatteryStateError::SocBoundsInverted {
                min: self.min_soc_pct,
                max: self.max_soc_pct,
            });
        }
        if !(self.max_charge_kw > 0.0) {
            return Err(BatteryStateError::NonPositiveMaxCharge(self.max_charge_kw));
        }
        if !(self.max_discharge_kw > 0.0) {
            return Err(BatteryStateError::NonPositiveMaxDischarge(
                self.max_discharge_kw,
            ));
        }
        if !(self.round_trip_eff > 0.0 && self.round_trip_eff <= 1.0) {
            return Err(BatteryStateError::EfficiencyOutOfRange(self.round_trip_eff));
        }
        if self.wear_cost_per_kwh < 0.0 {
            return Err(BatteryStateError::NegativeWearCost(self.wear_cost_per_kwh));
        }
        Ok(())
    }

    /// One-way charge/discharge efficiency, the symmetric square root of the
    /// round-trip efficiency (spec.md §3).
    pub fn charge_eff(&self) -> f64 {
        self.round_trip_eff.sqrt()
    }

    pub fn discharge_eff(&self) -> f64 {
        self.round_trip_eff.sqrt()
    }

    pub fn min_soc_kwh(&self) -> f64 {
        self.min_soc_pct / 100.0 * self.capacity_kwh
    }

    pub fn max_soc_kwh(&self) -> f64 {
        self.max_soc_pct / 100.0 * self.capacity_kwh
    }

    /// Clamp a live SoC reading to `[0, capacity_kwh]` and flag whether it
    /// exceeds the configured max (spec.md §3: the planner honors the live
    /// value but forbids further charging and emits a one-time warning).
    pub fn clamp_live_soc(&self, soc_kwh: f64) -> (f64, bool) {
        let clamped = soc_kwh.clamp(0.0, self.capacity_kwh);
        let overshoot = clamped > self.max_soc_kwh() + 1e-9;
        (clamped, overshoot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_state() -> BatteryState {
        BatteryState {
            capacity_kwh: 10.0,
            min_soc_pct: 10.0,
            max_soc_pct: 90.0,
            max_charge_kw: 4.0,
            max_discharge_kw: 4.0,
            round_trip_eff: 0.9,
            wear_cost_per_kwh: 0.01,
            charging_forbidden_by_overshoot: false,
        }
    }

    #[test]
    fn charge_eff_is_sqrt_of_round_trip() {
        let state = valid_state();
        let e = state.charge_eff();
        assert!((e * e - state.round_trip_eff).abs() < 1e-9);
    }

    #[test]
    fn rejects_inverted_soc_bounds() {
        let mut state = valid_state();
        state.min_soc_pct = 95.0;
        assert_eq!(
            state.validate(),
            Err(BatteryStateError::SocBoundsInverted { min: 95.0, max: 90.0 })
        );
    }

    #[test]
    fn clamp_live_soc_flags_overshoot() {
        let state = valid_state();
        let (clamped, overshoot) = state.clamp_live_soc(9.5);
        assert_eq!(clamped, 9.5);
        assert!(overshoot);
        let (clamped, overshoot) = state.clamp_live_soc(5.0);
        assert_eq!(clamped, 5.0);
        assert!(!overshoot);
    }

    #[test]
    fn clamp_live_soc_clamps_out_of_bounds_readings() {
        let state = valid_state();
        let (clamped, _) = state.clamp_live_soc(-1.0);
        assert_eq!(clamped, 0.0);
        let (clamped, _) = state.clamp_live_soc(99.0);
        assert_eq!(clamped, 10.0);
    }
}
