#![allow(dead_code)]
//! Time & Tariff model (C1): turns a day-ahead price feed into a sequence of
//! price-bearing `Slot`s (spec.md §4.1).

mod dayahead;
mod fees;
mod horizon_builder;
mod source;

pub use dayahead::DayAheadTariffSource;
pub use fees::PricingConfig;
pub use horizon_builder::{build_horizon, round_up_to_slot_boundary, HorizonBuildError};
pub use source::{RawPricePoint, TariffSource};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    struct FixedSource {
        points: Vec<RawPricePoint>,
    }

    #[async_trait]
    impl TariffSource for FixedSource {
        async fn today_and_tomorrow(
            &self,
            _now: DateTime<Utc>,
        ) -> anyhow::Result<Vec<RawPricePoint>> {
            Ok(self.points.clone())
        }
    }

    fn hourly_points(start: DateTime<Utc>, n: i64) -> Vec<RawPricePoint> {
        (0..n)
            .map(|i| RawPricePoint {
                start: start + Duration::hours(i),
                end: start + Duration::hours(i + 1),
                spot_price_per_kwh: 0.5,
            })
            .collect()
    }

    #[tokio::test]
    async fn splits_hourly_points_into_finer_slots() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let source = FixedSource {
            points: hourly_points(t0, 2),
        };
        let pricing = PricingConfig::default();
        let horizon = build_horizon(
            &source,
            t0,
            15,
            24.0,
            &pricing,
            |_start| (0.0, 0.0, None, None, None, None),
        )
        .await
        .unwrap();
        // 2 hourly points split into 15-minute slots = 8 slots.
        assert_eq!(horizon.len(), 8);
        assert_eq!(horizon.start(), t0);
    }

    #[tokio::test]
    async fn truncates_to_today_when_tomorrow_missing() {
        // spec.md §4.4: if tomorrow's prices are missing, truncate to today.
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let source = FixedSource {
            points: hourly_points(t0, 1),
        };
        let pricing = PricingConfig::default();
        let horizon = build_horizon(
            &source,
            t0,
            15,
            24.0,
            &pricing,
            |_| (0.0, 0.0, None, None, None, None),
        )
        .await
        .unwrap();
        assert_eq!(horizon.len(), 4);
    }

    #[tokio::test]
    async fn errors_when_no_price_coverage_at_all() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let source = FixedSource { points: vec![] };
        let pricing = PricingConfig::default();
        let err = build_horizon(
            &source,
            t0,
            15,
            24.0,
            &pricing,
            |_| (0.0, 0.0, None, None, None, None),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, HorizonBuildError::NoCoverage(_)));
    }
}
