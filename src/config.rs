#![allow(dead_code)]
//! Application configuration (spec.md §6 "Config bundle").
//!
//! Loaded via `figment` (TOML + env, matching the teacher's layering) and
//! validated via `validator` before the orchestrator is allowed to start
//! (spec.md §7 `ConfigInvalid` is fatal on startup).

use anyhow::{Context, Result};
use chrono_tz::Tz;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use validator::Validate;

use crate::domain::{BatteryState, RiskMode, RiskProfile, WaterHeaterConfig};

/// Top-level application configuration (spec.md §6 table).
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct AppConfig {
    /// All slot boundaries and bucket dates use this zone.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[validate(nested)]
    pub battery: BatteryConfig,

    #[serde(default)]
    #[validate(nested)]
    pub water_heating: Option<WaterHeatingConfig>,

    #[validate(nested)]
    pub s_index: SIndexConfig,

    #[validate(nested)]
    pub arbitrage: ArbitrageConfig,

    #[validate(nested)]
    pub planner: PlannerConfig,

    #[validate(nested)]
    pub pricing: PricingConfig,

    #[serde(default)]
    #[validate(nested)]
    pub forecast: ForecastConfig,

    #[serde(default)]
    #[validate(nested)]
    pub tariff_feed: TariffFeedConfig,

    #[serde(default)]
    #[validate(nested)]
    pub location: LocationConfig,

    #[serde(default)]
    #[validate(nested)]
    pub database: DatabaseConfig,

    #[serde(default)]
    #[validate(nested)]
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Parsed `timezone`, defaulting to UTC if unparseable -- rejected at
    /// `validate_all` time rather than silently here.
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("invalid timezone '{}': {}", self.timezone, e))
    }

    /// Run both `validator`-derived field validation and the cross-field
    /// checks spec.md §3/§7 require (`ConfigInvalid`).
    pub fn validate_all(&self) -> Result<()> {
        self.validate().context("configuration validation failed")?;
        self.tz().context("configuration validation failed")?;
        if !matches!(self.resolution_minutes(), 15 | 30 | 60) {
            anyhow::bail!(
                "resolution_minutes must be one of {{15,30,60}}, got {}",
                self.planner.resolution_minutes
            );
        }
        let battery_state: BatteryState = self.battery.clone().into();
        battery_state
            .validate()
            .context("battery configuration invalid")?;
        Ok(())
    }

    pub fn resolution_minutes(&self) -> i64 {
        self.planner.resolution_minutes as i64
    }

    pub fn risk_profile(&self) -> RiskProfile {
        RiskProfile {
            base_factor: self.s_index.base_factor,
            max_factor: self.s_index.max_factor,
            mode: self.s_index.mode,
            pv_deficit_weight: self.s_index.pv_deficit_weight,
            temp_weight: self.s_index.temp_weight,
            temp_baseline_c: self.s_index.temp_baseline_c,
            temp_cold_c: self.s_index.temp_cold_c,
            days_ahead_for_sindex: self.s_index.days_ahead_for_sindex.clone(),
            risk_appetite: self.s_index.risk_appetite,
        }
    }
}

/// Loads the configured `Config::load` hierarchy: `config/default.toml`,
/// then an optional environment overlay, then `OEC__`-prefixed env vars
/// (matching the teacher's `AppConfig::load_with_env`).
impl AppConfig {
    pub fn load() -> Result<Self> {
        Self::load_with_env(None)
    }

    pub fn load_with_env(environment: Option<&str>) -> Result<Self> {
        let mut figment = Figment::new().merge(Toml::file("config/default.toml"));

        if let Some(env) = environment {
            figment = figment.merge(Toml::file(format!("config/{env}.toml")));
        } else {
            figment = figment.merge(Toml::file("config/development.toml").nested());
        }

        figment = figment.merge(Env::prefixed("OEC__").split("__"));

        let config: AppConfig = figment.extract().context("failed to parse configuration")?;
        config.validate_all()?;
        Ok(config)
    }
}

/// `battery.*` (spec.md §3 "BatteryState").
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct BatteryConfig {
    #[validate(range(min = 0.01, max = 1000.0))]
    pub capacity_kwh: f64,
    #[serde(default = "default_min_soc")]
    #[validate(range(min = 0.0, max = 100.0))]
    pub min_soc_percent: f64,
    #[serde(default = "default_max_soc")]
    #[validate(range(min = 0.0, max = 100.0))]
    pub max_soc_percent: f64,
    #[validate(range(min = 0.01, max = 100.0))]
    pub max_charge_kw: f64,
    #[validate(range(min = 0.01, max = 100.0))]
    pub max_discharge_kw: f64,
    #[validate(range(min = 0.01, max = 1.0))]
    pub round_trip_efficiency: f64,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub wear_cost_per_kwh: f64,
}

impl From<BatteryConfig> for BatteryState {
    fn from(c: BatteryConfig) -> Self {
        BatteryState {
            capacity_kwh: c.capacity_kwh,
            min_soc_pct: c.min_soc_percent,
            max_soc_pct: c.max_soc_percent,
            max_charge_kw: c.max_charge_kw,
            max_discharge_kw: c.max_discharge_kw,
            round_trip_eff: c.round_trip_efficiency,
            wear_cost_per_kwh: c.wear_cost_per_kwh,
            charging_forbidden_by_overshoot: false,
        }
    }
}

/// `water_heating.*` (spec.md §3 "WaterHeater", §4.6).
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct WaterHeatingConfig {
    #[validate(range(min = 0.01, max = 50.0))]
    pub power_kw: f64,
    #[validate(range(min = 0.0))]
    pub min_kwh_per_day: f64,
    #[validate(range(min = 0.1))]
    pub max_gap_hours: f64,
    #[validate(range(min = 0.0))]
    pub min_spacing_hours: f64,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 12.0))]
    pub defer_up_to_hours: f64,
}

impl WaterHeatingConfig {
    pub fn to_domain(&self, heated_today_kwh: f64, locked_on_slots: Vec<chrono::DateTime<chrono::Utc>>) -> WaterHeaterConfig {
        WaterHeaterConfig {
            power_kw: self.power_kw,
            min_kwh_per_day: self.min_kwh_per_day,
            max_gap_hours: self.max_gap_hours,
            min_spacing_hours: self.min_spacing_hours,
            defer_up_to_hours: self.defer_up_to_hours,
            heated_today_kwh,
            locked_on_slots,
        }
    }
}

/// `s_index.*` (spec.md §3 "RiskProfile", §4.5).
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct SIndexConfig {
    #[serde(default = "default_risk_mode")]
    pub mode: RiskMode,
    #[validate(range(min = 0.0))]
    pub base_factor: f64,
    #[validate(range(min = 0.0))]
    pub max_factor: f64,
    #[serde(default)]
    pub pv_deficit_weight: f64,
    #[serde(default)]
    pub temp_weight: f64,
    #[serde(default = "default_temp_baseline")]
    pub temp_baseline_c: f64,
    #[serde(default = "default_temp_cold")]
    pub temp_cold_c: f64,
    #[serde(default = "default_days_ahead")]
    pub days_ahead_for_sindex: Vec<u32>,
    #[validate(range(min = 1, max = 5))]
    pub risk_appetite: u8,
}

/// `arbitrage.*` (spec.md §4.6, §6).
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct ArbitrageConfig {
    #[serde(default = "default_true")]
    pub enable_export: bool,
    #[serde(default)]
    pub export_fees: f64,
    #[serde(default)]
    pub export_peak_only: bool,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 1.0))]
    pub export_percentile_threshold: Option<f64>,
}

/// `planner.*` (spec.md §4.9, §5).
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct PlannerConfig {
    #[serde(default = "default_resolution_minutes")]
    pub resolution_minutes: u32,
    #[serde(default = "default_interval_minutes")]
    #[validate(range(min = 1, max = 1440))]
    pub interval_minutes: u64,
    #[serde(default)]
    #[validate(range(min = 0, max = 60))]
    pub jitter_minutes: u64,
    #[serde(default = "default_solve_timeout_s")]
    #[validate(range(min = 1, max = 600))]
    pub solve_timeout_s: u64,
    #[serde(default = "default_horizon_hours")]
    #[validate(range(min = 1.0, max = 168.0))]
    pub horizon_hours: f64,
}

/// `pricing.*` (spec.md §4.1).
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct PricingConfig {
    #[validate(range(min = 0.0, max = 1.0))]
    pub vat_percent: f64,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub grid_transfer_fee: f64,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub energy_tax: f64,
}

impl From<&PricingConfig> for crate::tariff::PricingConfig {
    fn from(c: &PricingConfig) -> Self {
        crate::tariff::PricingConfig {
            vat_percent: c.vat_percent,
            grid_transfer_fee: c.grid_transfer_fee,
            energy_tax: c.energy_tax,
        }
    }
}

/// Which forecast version to treat as active (spec.md §4.2).
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct ForecastConfig {
    #[serde(default = "default_forecast_version")]
    pub active_version: String,
    #[serde(default = "default_lookback_days")]
    pub naive_lookback_days: i64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            active_version: default_forecast_version(),
            naive_lookback_days: default_lookback_days(),
        }
    }
}

/// `tariff_feed.*`: day-ahead price feed endpoint (spec.md §6 "Tariff
/// feed"). Defaults point at the public elprisetjustnu.se endpoint this
/// crate's `DayAheadTariffSource` is grounded on.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct TariffFeedConfig {
    #[serde(default = "default_tariff_base_url")]
    pub base_url: String,
    #[serde(default = "default_price_area")]
    pub area: String,
    #[serde(default = "default_tariff_cache_ttl_s")]
    #[validate(range(min = 1, max = 86400))]
    pub cache_ttl_s: u64,
}

impl Default for TariffFeedConfig {
    fn default() -> Self {
        Self {
            base_url: default_tariff_base_url(),
            area: default_price_area(),
            cache_ttl_s: default_tariff_cache_ttl_s(),
        }
    }
}

/// `location.*`: site coordinates for the weather/temperature feed (spec.md
/// §4.5 dynamic S-index signal).
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct LocationConfig {
    #[serde(default)]
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[serde(default)]
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            latitude: 59.33,
            longitude: 18.06,
        }
    }
}

/// Postgres-backed persistence, only consulted when the `db` feature is on.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_db_max_connections")]
    #[validate(range(min = 1, max = 100))]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_db_max_connections(),
        }
    }
}

/// Structured logging configuration, matching the teacher's `telemetry.rs`.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_true")]
    pub log_json: bool,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[serde(default)]
    pub enable_metrics: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: true,
            log_file: None,
            enable_metrics: false,
        }
    }
}

fn default_timezone() -> String {
    "UTC".to_string()
}
fn default_min_soc() -> f64 {
    10.0
}
fn default_max_soc() -> f64 {
    95.0
}
fn default_risk_mode() -> RiskMode {
    RiskMode::Static
}
fn default_temp_baseline() -> f64 {
    20.0
}
fn default_temp_cold() -> f64 {
    -15.0
}
fn default_days_ahead() -> Vec<u32> {
    vec![2, 3, 4]
}
fn default_true() -> bool {
    true
}
fn default_resolution_minutes() -> u32 {
    15
}
fn default_interval_minutes() -> u64 {
    15
}
fn default_solve_timeout_s() -> u64 {
    60
}
fn default_horizon_hours() -> f64 {
    48.0
}
fn default_forecast_version() -> String {
    "naive-baseline".to_string()
}
fn default_lookback_days() -> i64 {
    7
}
fn default_db_max_connections() -> u32 {
    10
}
fn default_tariff_base_url() -> String {
    "https://www.elprisetjustnu.se".to_string()
}
fn default_price_area() -> String {
    "SE3".to_string()
}
fn default_tariff_cache_ttl_s() -> u64 {
    1800
}
fn default_log_level() -> String {
    "info".to_string()
}

// Kept for call sites that still spell out the old name.
pub type Config = AppConfig;

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        AppConfig {
            timezone: "Europe/Stockholm".to_string(),
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
                base_factor: 1.05,
                max_factor: 1.5,
                pv_deficit_weight: 0.3,
                temp_weight: 0.2,
                temp_baseline_c: 20.0,
                temp_cold_c: -15.0,
                days_ahead_for_sindex: vec![2, 3, 4],
                risk_appetite: 3,
            },
            arbitrage: ArbitrageConfig {
                enable_export: true,
                export_fees: 0.0,
                export_peak_only: false,
                export_percentile_threshold: None,
            },
            planner: PlannerConfig {
                resolution_minutes: 15,
                interval_minutes: 15,
                jitter_minutes: 2,
                solve_timeout_s: 60,
                horizon_hours: 48.0,
            },
            pricing: PricingConfig {
                vat_percent: 0.25,
                grid_transfer_fee: 0.0,
                energy_tax: 0.0,
            },
            forecast: ForecastConfig::default(),
            tariff_feed: TariffFeedConfig::default(),
            location: LocationConfig::default(),
            database: DatabaseConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(valid_config().validate_all().is_ok());
    }

    #[test]
    fn rejects_bad_timezone() {
        let mut cfg = valid_config();
        cfg.timezone = "Not/AZone".to_string();
        assert!(cfg.validate_all().is_err());
    }

    #[test]
    fn rejects_unsupported_resolution() {
        let mut cfg = valid_config();
        cfg.planner.resolution_minutes = 7;
        assert!(cfg.validate_all().is_err());
    }

    #[test]
    fn rejects_inverted_soc_bounds() {
        let mut cfg = valid_config();
        cfg.battery.min_soc_percent = 95.0;
        cfg.battery.max_soc_percent = 90.0;
        assert!(cfg.validate_all().is_err());
    }
}
