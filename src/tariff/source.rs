use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A single upstream day-ahead market price entry before fee/VAT
/// application (spec.md §4.1, §6 "Tariff feed"). `spot_price_per_kwh` is
/// already converted from currency/MWh if the upstream publishes in MWh.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPricePoint {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub spot_price_per_kwh: f64,
}

/// Capability `tariff.read` (DESIGN NOTE "optional features flipped by
/// capability checks"): a collaborator that can produce day-ahead prices.
/// Grounded on the teacher's `PriceForecaster` trait
/// (`forecast::prices::PriceForecaster`), generalized from a fixed 24h
/// window to "as much of today+tomorrow as is published".
#[async_trait]
pub trait TariffSource: Send + Sync {
    /// Returns ordered price points covering at least today; tomorrow's
    /// prices may be absent if not yet published (spec.md §4.1).
    async fn today_and_tomorrow(&self, now: DateTime<Utc>) -> Result<Vec<RawPricePoint>>;
}
