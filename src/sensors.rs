#![allow(dead_code)]
//! Live sensor capabilities consumed by the orchestrator (spec.md §6 "Live
//! sensors"): battery SoC, cumulative energy counters, and a day-offset
//! temperature forecast. Kept as trait objects (DESIGN NOTE "optional
//! features flipped by capability checks" -> `sensor.read`) so the
//! orchestrator never depends on a concrete hardware integration -- the
//! executor/Home-Assistant bridge that actually reads these is out of
//! scope for this crate (spec.md §1).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::PlannerError;
use crate::observation::CumulativeReading;

/// Capability `sensor.read`: the live state the input assembler (C4) needs
/// that cannot be derived from config or the stores alone.
#[async_trait]
pub trait LiveSensors: Send + Sync {
    /// Current battery SoC in kWh. Must fail with `SoCUnavailable` rather
    /// than default to any value (spec.md §4.4: "the planner must never
    /// assume a default SoC, as that causes phantom charging").
    async fn battery_soc_kwh(&self) -> Result<f64, PlannerError>;

    /// Cumulative (monotonically increasing) energy counters, read once per
    /// tick boundary for observation recording (spec.md §4.3, §5).
    async fn cumulative_reading(&self) -> Result<CumulativeReading, PlannerError>;

    /// Energy already delivered by the water heater today, credited against
    /// the day-0 daily requirement (spec.md §3 "WaterHeater").
    async fn water_heated_today_kwh(&self) -> f64 {
        0.0
    }

    /// Slots an operator or a previous plan has locked to "on"
    /// (spec.md §4.6 "Forced ON slots").
    async fn water_locked_on_slots(&self) -> Vec<DateTime<Utc>> {
        Vec::new()
    }

    /// Operator-supplied end-of-horizon target SoC, if any.
    async fn target_soc_kwh(&self) -> Option<f64> {
        None
    }

    /// Soft or hard grid import cap, if configured externally (distinct
    /// from `grid_import_limit_soft` which only governs whether a
    /// configured cap is enforced softly or hard).
    async fn grid_import_limit_kw(&self) -> Option<f64> {
        None
    }

    async fn max_export_kw(&self) -> Option<f64> {
        None
    }
}

/// Capability `sensor.read` (weather): daily mean temperature forecast by
/// day-offset from "today", used by the dynamic S-index (spec.md §4.5).
#[async_trait]
pub trait TemperatureSource: Send + Sync {
    async fn daily_mean_c(&self, now: DateTime<Utc>, day_offset: u32) -> Option<f64>;
}

/// A `TemperatureSource` that never has data; the risk engine treats a
/// fully-missing signal as "fall back to static-equivalent base factor"
/// (spec.md §4.5, `RiskEngine::dynamic_factor`'s empty-considered-days path).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTemperatureData;

#[async_trait]
impl TemperatureSource for NoTemperatureData {
    async fn daily_mean_c(&self, _now: DateTime<Utc>, _day_offset: u32) -> Option<f64> {
        None
    }
}

/// Capability `forecast.calibrate` (optional): triggered by the
/// orchestrator after an observation is recorded, so a learned-forecast
/// collaborator can compare realized vs. forecast and adjust correction
/// rows. The forecast model itself is out of scope (spec.md §1); this is
/// only the seam the orchestrator calls through.
#[async_trait]
pub trait ForecastCalibrator: Send + Sync {
    async fn calibrate(&self, slot_start: DateTime<Utc>);
}

/// No-op calibrator: the default when no learned-forecast collaborator is
/// wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCalibrator;

#[async_trait]
impl ForecastCalibrator for NoopCalibrator {
    async fn calibrate(&self, _slot_start: DateTime<Utc>) {}
}

/// Placeholder `LiveSensors` backed by a config-supplied starting SoC and
/// zeroed counters. Stands in for the real executor/Home-Assistant bridge
/// (out of scope, spec.md §1) so the binary has something to read from
/// until that bridge is wired in; `battery_soc_kwh` reports whatever SoC it
/// was seeded with rather than inventing readings that were never taken.
pub struct StaticLiveSensors {
    soc_kwh: std::sync::atomic::AtomicU64,
}

impl StaticLiveSensors {
    pub fn new(initial_soc_kwh: f64) -> Self {
        Self {
            soc_kwh: std::sync::atomic::AtomicU64::new(initial_soc_kwh.to_bits()),
        }
    }
}

#[async_trait]
impl LiveSensors for StaticLiveSensors {
    async fn battery_soc_kwh(&self) -> Result<f64, PlannerError> {
        Ok(f64::from_bits(
            self.soc_kwh.load(std::sync::atomic::Ordering::Relaxed),
        ))
    }

    async fn cumulative_reading(&self) -> Result<CumulativeReading, PlannerError> {
        Ok(CumulativeReading::default())
    }
}
