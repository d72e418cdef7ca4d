use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use super::{PricingConfig, RawPricePoint, TariffSource};
use crate::domain::{Horizon, HorizonError, Slot};

#[derive(Debug, Error)]
pub enum HorizonBuildError {
    #[error("tariff source error: {0}")]
    Source(#[from] anyhow::Error),
    #[error("no price points cover {0}")]
    NoCoverage(DateTime<Utc>),
    #[error(transparent)]
    Horizon(#[from] HorizonError),
}

/// Round `now` up to the next slot boundary at `resolution_minutes`
/// (spec.md §4.4 step 1). Boundaries are aligned to the top of the hour so
/// 15/30/60-minute resolutions all line up predictably.
pub fn round_up_to_slot_boundary(now: DateTime<Utc>, resolution_minutes: i64) -> DateTime<Utc> {
    let step_secs = resolution_minutes * 60;
    let epoch_secs = now.timestamp();
    let has_fraction = now.timestamp_subsec_nanos() > 0;
    let remainder = epoch_secs.rem_euclid(step_secs);
    if remainder == 0 && !has_fraction {
        return now;
    }
    let floor = now - Duration::seconds(remainder) - Duration::nanoseconds(now.timestamp_subsec_nanos() as i64);
    floor + Duration::seconds(step_secs)
}

/// Build a fully-populated, price-and-forecast-joined `Horizon` starting at
/// the next slot boundary after `now` and covering `horizon_hours` (spec.md
/// §4.1, §4.4 steps 1-2). `forecast_lookup` supplies, per slot start,
/// `(pv_kwh, load_kwh, pv_p10, pv_p90, load_p10, load_p90)` -- in the real
/// pipeline this closure is backed by the forecast store (C2) joined with a
/// naive fallback, which is the input assembler's (C4) job; this function
/// is reused there and in isolation in tests.
pub async fn build_horizon<F>(
    source: &dyn TariffSource,
    now: DateTime<Utc>,
    resolution_minutes: i64,
    horizon_hours: f64,
    pricing: &PricingConfig,
    forecast_lookup: F,
) -> Result<Horizon, HorizonBuildError>
where
    F: Fn(DateTime<Utc>) -> (f64, f64, Option<f64>, Option<f64>, Option<f64>, Option<f64>),
{
    let start = round_up_to_slot_boundary(now, resolution_minutes);
    let raw = source.today_and_tomorrow(now).await?;
    if raw.is_empty() {
        return Err(HorizonBuildError::NoCoverage(start));
    }

    let horizon_end = start + Duration::minutes((horizon_hours * 60.0).round() as i64);
    let mut slots = Vec::new();
    let step = Duration::minutes(resolution_minutes);

    for point in &raw {
        if point.end <= start || point.start >= horizon_end {
            continue;
        }
        let mut cursor = point.start;
        while cursor < point.end {
            let slot_end = (cursor + step).min(point.end);
            if slot_end > start && cursor < horizon_end {
                let clipped_start = cursor.max(start);
                let clipped_end = slot_end.min(horizon_end);
                if clipped_end > clipped_start {
                    let (pv, load, pv_p10, pv_p90, load_p10, load_p90) =
                        forecast_lookup(clipped_start);
                    slots.push(Slot {
                        start: clipped_start,
                        end: clipped_end,
                        import_price: pricing.import_price(point.spot_price_per_kwh),
                        export_price: pricing.export_price(point.spot_price_per_kwh),
                        pv_forecast_kwh: pv,
                        load_forecast_kwh: load,
                        pv_p10_kwh: pv_p10,
                        pv_p90_kwh: pv_p90,
                        load_p10_kwh: load_p10,
                        load_p90_kwh: load_p90,
                    });
                }
            }
            cursor = slot_end;
        }
    }

    slots.sort_by_key(|s| s.start);
    Horizon::new(slots, 0.0).map_err(HorizonBuildError::from)
}
