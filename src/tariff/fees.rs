use serde::{Deserialize, Serialize};
use validator::Validate;

/// Fee/VAT configuration applied on top of the spot price (spec.md §4.1,
/// §6 `pricing.*`).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PricingConfig {
    #[validate(range(min = 0.0, max = 1.0))]
    pub vat_percent: f64,
    #[validate(range(min = 0.0))]
    pub grid_transfer_fee: f64,
    #[validate(range(min = 0.0))]
    pub energy_tax: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            vat_percent: 0.25,
            grid_transfer_fee: 0.0,
            energy_tax: 0.0,
        }
    }
}

impl PricingConfig {
    /// `import_price = (spot + grid_transfer_fee + energy_tax) * (1 + vat)`
    /// (spec.md §4.1).
    pub fn import_price(&self, spot_price_per_kwh: f64) -> f64 {
        (spot_price_per_kwh + self.grid_transfer_fee + self.energy_tax) * (1.0 + self.vat_percent)
    }

    /// `export_price = spot` -- no fees, no VAT -- unless overridden
    /// (spec.md §4.1).
    pub fn export_price(&self, spot_price_per_kwh: f64) -> f64 {
        spot_price_per_kwh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn import_price_applies_fees_and_vat() {
        let cfg = PricingConfig {
            vat_percent: 0.25,
            grid_transfer_fee: 0.1,
            energy_tax: 0.05,
        };
        let price = cfg.import_price(1.0);
        assert!((price - (1.0 + 0.1 + 0.05) * 1.25).abs() < 1e-9);
    }

    #[test]
    fn export_price_has_no_fees() {
        let cfg = PricingConfig {
            vat_percent: 0.25,
            grid_transfer_fee: 0.1,
            energy_tax: 0.05,
        };
        assert_eq!(cfg.export_price(1.0), 1.0);
    }

    #[test]
    fn negative_spot_prices_flow_through() {
        let cfg = PricingConfig::default();
        assert!(cfg.import_price(-0.2) < 0.0);
        assert!(cfg.export_price(-0.2) < 0.0);
    }
}
