#![allow(dead_code)]
//! Risk / S-index engine (C5): turns PV-deficit and temperature signals
//! into a scalar safety factor and a terminal value per kWh that shape how
//! much the solver should value stored energy at horizon end (spec.md
//! §4.5). Grounded on `original_source/planner.py::_calculate_dynamic_s_index`.

use std::collections::HashMap;

use crate::domain::{RiskMode, RiskProfile};

/// Debug breakdown of a dynamic-mode factor computation, mirroring the
/// diagnostic payload the Python original records for later inspection.
#[derive(Debug, Clone, PartialEq)]
pub struct SIndexDebug {
    pub mode: &'static str,
    pub base_factor: f64,
    pub avg_deficit: f64,
    pub temp_adjustment: f64,
    pub mean_temperature_c: Option<f64>,
    pub considered_days: Vec<u32>,
    pub factor_unclamped: f64,
}

/// Per-day-offset forecast signals available to the dynamic S-index
/// computation; absent offsets are simply skipped (the original's
/// "insufficient_forecast_data" path).
pub struct DailySignals<'a> {
    pub pv_kwh: &'a HashMap<u32, f64>,
    pub load_kwh: &'a HashMap<u32, f64>,
    pub temp_c: &'a HashMap<u32, f64>,
}

pub struct RiskEngine;

impl RiskEngine {
    /// Compute the safety factor for a planning tick, along with a debug
    /// payload when the dynamic path was taken.
    pub fn factor(profile: &RiskProfile, signals: &DailySignals) -> (f64, Option<SIndexDebug>) {
        match profile.mode {
            RiskMode::Static => (profile.base_factor.min(profile.max_factor), None),
            RiskMode::Dynamic => Self::dynamic_factor(profile, signals),
        }
    }

    fn dynamic_factor(profile: &RiskProfile, signals: &DailySignals) -> (f64, Option<SIndexDebug>) {
        let mut deficits = Vec::new();
        let mut considered_days = Vec::new();

        for &offset in &profile.days_ahead_for_sindex {
            let load = signals.load_kwh.get(&offset).copied();
            let pv = signals.pv_kwh.get(&offset).copied();
            let (load, pv) = match (load, pv) {
                (Some(l), Some(p)) => (l, p),
                _ => continue,
            };
            considered_days.push(offset);
            if load <= 0.0 {
                deficits.push(0.0);
            } else {
                deficits.push(((load - pv) / load.max(1e-6)).max(0.0));
            }
        }

        if considered_days.is_empty() {
            return (profile.base_factor.min(profile.max_factor), None);
        }

        let avg_deficit = deficits.iter().sum::<f64>() / deficits.len() as f64;

        let mut mean_temp = None;
        let mut temp_adjustment = 0.0;
        if profile.temp_weight > 0.0 {
            let temps: Vec<f64> = considered_days
                .iter()
                .filter_map(|d| signals.temp_c.get(d).copied())
                .collect();
            if !temps.is_empty() {
                let mean = temps.iter().sum::<f64>() / temps.len() as f64;
                let span = (profile.temp_baseline_c - profile.temp_cold_c).max(1.0);
                temp_adjustment = ((profile.temp_baseline_c - mean) / span).clamp(0.0, 1.0);
                mean_temp = Some(mean);
            }
        }

        let raw = profile.base_factor
            + profile.pv_deficit_weight * avg_deficit
            + profile.temp_weight * temp_adjustment;
        let factor = raw.clamp(0.0, profile.max_factor);

        (
            factor,
            Some(SIndexDebug {
                mode: "dynamic",
                base_factor: profile.base_factor,
                avg_deficit,
                temp_adjustment,
                mean_temperature_c: mean_temp,
                considered_days,
                factor_unclamped: raw,
            }),
        )
    }

    /// Terminal value (currency/kWh) for stored energy at horizon end
    /// (spec.md §4.5): `factor * avg_future_price` over the slots beyond
    /// the priced horizon.
    pub fn terminal_value_per_kwh(factor: f64, avg_future_price: f64) -> f64 {
        factor * avg_future_price
    }
}
