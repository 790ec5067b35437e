//! Risk-adjusted spread calculation.
//!
//! Pure and deterministic: identical risk input always yields the same
//! spread, with no side effects and no failure modes.

use rust_decimal::Decimal;

/// Spread parameters.
#[derive(Debug, Clone)]
pub struct SpreadConfig {
    /// Flat fee fraction applied to every quote (1%).
    pub base_fee: Decimal,
    /// Additional fee per unit of risk score (up to 5% at score 1.0).
    pub risk_premium_factor: Decimal,
}

impl Default for SpreadConfig {
    fn default() -> Self {
        Self {
            base_fee: Decimal::new(1, 2),            // 0.01
            risk_premium_factor: Decimal::new(5, 2), // 0.05
        }
    }
}

impl SpreadConfig {
    /// Largest spread this configuration can produce.
    pub fn max_spread(&self) -> Decimal {
        self.base_fee + self.risk_premium_factor
    }
}

/// Compute the fee spread for a risk score:
/// `base_fee + risk_score × risk_premium_factor`.
pub fn spread_for_risk(risk_score: Decimal, config: &SpreadConfig) -> Decimal {
    config.base_fee + risk_score * config.risk_premium_factor
}
