use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named forecast version so multiple models (naive baseline vs. learned)
/// can coexist in the store (spec.md §4.2).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ForecastVersion(pub String);

impl ForecastVersion {
    pub fn naive() -> Self {
        Self("naive-baseline".to_string())
    }
}

impl std::fmt::Display for ForecastVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored forecast row keyed by `(slot_start, forecast_version)`
/// (spec.md §4.2). `base` and `correction` are kept separate for
/// diagnostics; `effective()` returns `base + correction`.
#[cfg_attr(feature = "swagger", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastRow {
    pub slot_start: DateTime<Utc>,
    pub version: ForecastVersion,
    pub pv_base_kwh: f64,
    pub load_base_kwh: f64,
    pub pv_correction_kwh: f64,
    pub load_correction_kwh: f64,
    pub pv_p10_kwh: Option<f64>,
    pub pv_p90_kwh: Option<f64>,
    pub load_p10_kwh: Option<f64>,
    pub load_p90_kwh: Option<f64>,
}

impl ForecastRow {
    pub fn effective_pv_kwh(&self) -> f64 {
        self.pv_base_kwh + self.pv_correction_kwh
    }

    pub fn effective_load_kwh(&self) -> f64 {
        self.load_base_kwh + self.load_correction_kwh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_is_base_plus_correction() {
        let row = ForecastRow {
            slot_start: Utc::now(),
            version: ForecastVersion::naive(),
            pv_base_kwh: 1.0,
            load_base_kwh: 0.5,
            pv_correction_kwh: -0.2,
            load_correction_kwh: 0.1,
            pv_p10_kwh: None,
            pv_p90_kwh: None,
            load_p10_kwh: None,
            load_p90_kwh: None,
        };
        assert!((row.effective_pv_kwh() - 0.8).abs() < 1e-9);
        assert!((row.effective_load_kwh() - 0.6).abs() < 1e-9);
    }
}
