//! RampPay Pricing
//!
//! Collaborator interfaces for exchange rates and risk scores, plus the
//! pure spread calculator that turns a risk score into a fee fraction.

pub mod error;
pub mod oracle;
pub mod risk;
pub mod spread;

pub use error::{PricingError, PricingResult};
pub use oracle::{RateOracle, SimulatedRateOracle};
pub use risk::{RiskScorer, SimulatedRiskScorer};
pub use spread::{spread_for_risk, SpreadConfig};
