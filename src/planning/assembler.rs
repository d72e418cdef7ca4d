//! Input assembler (C4): joins the tariff horizon, the forecast store (with
//! a naive fallback), live battery/observation state, and config-derived
//! risk/cost/water-heater settings into one `SolverInput`.
//!
//! Grounded on the teacher's `controller::mod::AppState` collaborator
//! wiring -- the assembler plays the same "gather everything the next step
//! needs" role `AppState` played ahead of a `ScheduleRepository::insert`,
//! but expressed as one pure-ish async function over explicit trait objects
//! (capability-style) instead of a shared mutable state struct.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::config::AppConfig;
use crate::domain::{BatteryState, CostModel, ForecastVersion, SolverInput, WaterHeaterConfig};
use crate::error::PlannerError;
use crate::forecast::{ForecastStore, NaiveForecaster};
use crate::observation::ObservationStore;
use crate::tariff::{build_horizon, PricingConfig, TariffSource};

/// Everything about the live system that the assembler cannot derive from
/// config or stores alone.
pub struct LiveState {
    pub live_soc_kwh: f64,
    pub heated_today_kwh: f64,
    pub locked_on_slots: Vec<DateTime<Utc>>,
    pub target_soc_kwh: Option<f64>,
    pub terminal_value_per_kwh: f64,
    pub grid_import_limit_kw: Option<f64>,
    pub max_export_kw: Option<f64>,
}

pub async fn assemble(
    now: DateTime<Utc>,
    config: &AppConfig,
    tariff_source: &dyn TariffSource,
    forecast_store: &dyn ForecastStore,
    observation_store: &dyn ObservationStore,
    live: LiveState,
) -> Result<SolverInput, PlannerError> {
    let tz = config
        .tz()
        .map_err(|_| PlannerError::ConfigInvalid("invalid timezone".into()))?;
    let resolution = config.resolution_minutes();
    let horizon_hours = config.planner.horizon_hours;
    let pricing: PricingConfig = (&config.pricing).into();
    let version = ForecastVersion(config.forecast.active_version.clone());

    let start = crate::tariff::round_up_to_slot_boundary(now, resolution);
    let end = start + Duration::minutes((horizon_hours * 60.0).round() as i64);

    let stored_rows = match forecast_store.range(start, end, &version).await {
        Ok(rows) => rows,
        Err(e) => {
            let missing = PlannerError::ForecastMissing { slot_start: start };
            if !missing.is_recoverable_inline() {
                return Err(missing);
            }
            tracing::warn!(
                error = %e,
                "forecast store range() failed, substituting naive forecast for every slot"
            );
            Vec::new()
        }
    };
    let by_slot: HashMap<DateTime<Utc>, (f64, f64, Option<f64>, Option<f64>, Option<f64>, Option<f64>)> =
        stored_rows
            .into_iter()
            .map(|row| {
                (
                    row.slot_start,
                    (
                        row.effective_pv_kwh(),
                        row.effective_load_kwh(),
                        row.pv_p10_kwh,
                        row.pv_p90_kwh,
                        row.load_p10_kwh,
                        row.load_p90_kwh,
                    ),
                )
            })
            .collect();

    let history_start = start - Duration::days(config.forecast.naive_lookback_days);
    let history = observation_store
        .range(history_start, start)
        .await
        .unwrap_or_default();

    let horizon = build_horizon(
        tariff_source,
        now,
        resolution,
        horizon_hours,
        &pricing,
        |slot_start| {
            if let Some(row) = by_slot.get(&slot_start) {
                *row
            } else {
                use chrono::Timelike;
                let naive = NaiveForecaster::naive_pv_load(
                    &history,
                    slot_start.hour(),
                    start,
                    config.forecast.naive_lookback_days,
                );
                match naive {
                    Some((pv, load)) => (pv, load, None, None, None, None),
                    None => (0.0, 0.0, None, None, None, None),
                }
            }
        },
    )
    .await
    .map_err(|e| PlannerError::TariffUnavailable(e.to_string()))?;

    let battery_config: BatteryState = config.battery.clone().into();
    let (clamped_soc, overshoot) = battery_config.clamp_live_soc(live.live_soc_kwh);
    let battery = BatteryState {
        charging_forbidden_by_overshoot: overshoot,
        ..battery_config
    };

    let water_heater: Option<WaterHeaterConfig> = config
        .water_heating
        .as_ref()
        .map(|w| w.to_domain(live.heated_today_kwh, live.locked_on_slots));

    Ok(SolverInput {
        horizon,
        battery,
        water_heater,
        risk: config.risk_profile(),
        cost: CostModel::default(),
        initial_soc_kwh: clamped_soc,
        target_soc_kwh: live.target_soc_kwh,
        terminal_value_per_kwh: live.terminal_value_per_kwh,
        grid_import_limit_kw: live.grid_import_limit_kw,
        max_export_kw: live.max_export_kw,
        export_enabled: config.arbitrage.enable_export,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        ArbitrageConfig, BatteryConfig, ForecastConfig, PlannerConfig, PricingConfig as CfgPricingConfig,
        SIndexConfig, TelemetryConfig,
    };
    use crate::domain::RiskMode;
    use crate::forecast::MemoryForecastStore;
    use crate::observation::MemoryObservationStore;
    use crate::tariff::RawPricePoint;
    use async_trait::async_trait;
    use chrono::TimeZone;

    struct FixedSource {
        points: Vec<RawPricePoint>,
    }

    #[async_trait]
    impl TariffSource for FixedSource {
        async fn today_and_tomorrow(&self, _now: DateTime<Utc>) -> anyhow::Result<Vec<RawPricePoint>> {
            Ok(self.points.clone())
        }
    }

    fn test_config() -> AppConfig {
        AppConfig {
            timezone: "UTC".to_string(),
            battery: BatteryConfig {
                capacity_kwh: 10.0,
                min_soc_percent: 10.0,
                max_soc_percent: 90.0,
                max_charge_kw: 4.0,
                max_discharge_kw: 4.0,
                round_trip_efficiency: 0.9,
                wear_cost_per_kwh: 0.01,
            },
            water_heating: None,
            s_index: SIndexConfig {
                mode: RiskMode::Static,
                base_factor: 1.0,
                max_factor: 1.0,
                pv_deficit_weight: 0.0,
                temp_weight: 0.0,
                temp_baseline_c: 20.0,
                temp_cold_c: -15.0,
                days_ahead_for_sindex: vec![],
                risk_appetite: 3,
            },
            arbitrage: ArbitrageConfig {
                enable_export: true,
                export_fees: 0.0,
                export_peak_only: false,
                export_percentile_threshold: None,
            },
            planner: PlannerConfig {
                resolution_minutes: 60,
                interval_minutes: 15,
                jitter_minutes: 0,
                solve_timeout_s: 60,
                horizon_hours: 2.0,
            },
            pricing: CfgPricingConfig {
                vat_percent: 0.0,
                grid_transfer_fee: 0.0,
                energy_tax: 0.0,
            },
            forecast: ForecastConfig::default(),
            database: Default::default(),
            telemetry: TelemetryConfig::default(),
        }
    }

    #[tokio::test]
    async fn assembles_a_solvable_input_from_stores() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let source = FixedSource {
            points: vec![
                RawPricePoint { start: t0, end: t0 + Duration::hours(1), spot_price_per_kwh: 0.1 },
                RawPricePoint {
                    start: t0 + Duration::hours(1),
                    end: t0 + Duration::hours(2),
                    spot_price_per_kwh: 0.2,
                },
            ],
        };
        let forecast_store = MemoryForecastStore::default();
        let observation_store = MemoryObservationStore::default();
        let config = test_config();

        let input = assemble(
            t0,
            &config,
            &source,
            &forecast_store,
            &observation_store,
            LiveState {
                live_soc_kwh: 5.0,
                heated_today_kwh: 0.0,
                locked_on_slots: vec![],
                target_soc_kwh: None,
                terminal_value_per_kwh: 0.0,
                grid_import_limit_kw: None,
                max_export_kw: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(input.horizon.len(), 2);
        assert!((input.initial_soc_kwh - 5.0).abs() < 1e-9);
        assert!(!input.battery.charging_forbidden_by_overshoot);
    }
}
