//! Rate oracle trait and simulated implementation.

use async_trait::async_trait;
use dashmap::DashMap;
use rand::Rng;
use rust_decimal::Decimal;
use tracing::debug;

use ramppay_common::{AssetPair, CryptoAsset, Currency, ExchangeRate};

use crate::error::{PricingError, PricingResult};

/// Trait for exchange rate providers.
#[async_trait]
pub trait RateOracle: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &str;

    /// Get the current rate (fiat per unit of asset) for a pair.
    async fn rate(&self, pair: &AssetPair) -> PricingResult<ExchangeRate>;

    /// Check if this oracle supports the given pair.
    fn supports(&self, pair: &AssetPair) -> bool;

    /// Get all supported pairs.
    fn supported_pairs(&self) -> Vec<AssetPair>;
}

/// Simulated oracle with settable base rates and optional jitter.
///
/// Stands in for a market-data connector; tests set exact rates with zero
/// jitter, the demo binary uses jittered base rates.
pub struct SimulatedRateOracle {
    name: String,
    rates: DashMap<AssetPair, Decimal>,
    /// Maximum absolute jitter added to the base rate, as a fraction.
    jitter: Decimal,
}

impl SimulatedRateOracle {
    /// Create an oracle with no rates and no jitter.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rates: DashMap::new(),
            jitter: Decimal::ZERO,
        }
    }

    /// Demo oracle preloaded with BRL market levels.
    pub fn with_demo_rates(fiat: Currency) -> Self {
        let oracle = Self {
            name: "simulated-market".to_string(),
            rates: DashMap::new(),
            jitter: Decimal::new(5, 3), // 0.5%
        };
        oracle.set_rate(
            AssetPair::new(CryptoAsset::Eth, fiat.clone()),
            Decimal::from(15_000),
        );
        oracle.set_rate(
            AssetPair::new(CryptoAsset::Usdc, fiat.clone()),
            Decimal::new(50, 1), // 5.0
        );
        oracle.set_rate(
            AssetPair::new(CryptoAsset::Btc, fiat),
            Decimal::from(350_000),
        );
        oracle
    }

    /// Set the base rate for a pair.
    pub fn set_rate(&self, pair: AssetPair, fiat_per_unit: Decimal) {
        self.rates.insert(pair, fiat_per_unit);
    }

    /// Remove the rate for a pair.
    pub fn clear_rate(&self, pair: &AssetPair) {
        self.rates.remove(pair);
    }

    fn sample(&self, base: Decimal) -> Decimal {
        if self.jitter.is_zero() {
            return base;
        }
        // Uniform jitter in [-jitter, +jitter] around the base rate.
        let bps: i64 = rand::thread_rng().gen_range(-10_000..=10_000);
        let offset = base * self.jitter * Decimal::new(bps, 4);
        base + offset
    }
}

#[async_trait]
impl RateOracle for SimulatedRateOracle {
    fn name(&self) -> &str {
        &self.name
    }

    async fn rate(&self, pair: &AssetPair) -> PricingResult<ExchangeRate> {
        let base = self
            .rates
            .get(pair)
            .map(|r| *r)
            .ok_or_else(|| PricingError::RateNotAvailable(pair.clone()))?;

        let sampled = self.sample(base);
        if sampled <= Decimal::ZERO {
            return Err(PricingError::InvalidRate {
                pair: pair.clone(),
                reason: format!("non-positive rate {}", sampled),
            });
        }

        debug!(pair = %pair, rate = %sampled, "Sampled exchange rate");
        Ok(ExchangeRate::new(pair.clone(), sampled, self.name.clone()))
    }

    fn supports(&self, pair: &AssetPair) -> bool {
        self.rates.contains_key(pair)
    }

    fn supported_pairs(&self) -> Vec<AssetPair> {
        self.rates.iter().map(|r| r.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_settable_rate() {
        let oracle = SimulatedRateOracle::new("test");
        let pair = AssetPair::new(CryptoAsset::Usdc, Currency::brl());
        oracle.set_rate(pair.clone(), dec!(5.0));

        let rate = oracle.rate(&pair).await.unwrap();
        assert_eq!(rate.fiat_per_unit, dec!(5.0));
        assert_eq!(rate.source, "test");
    }

    #[tokio::test]
    async fn test_unknown_pair() {
        let oracle = SimulatedRateOracle::new("test");
        let pair = AssetPair::new(CryptoAsset::Btc, Currency::brl());

        let result = oracle.rate(&pair).await;
        assert!(matches!(result, Err(PricingError::RateNotAvailable(_))));
    }

    #[tokio::test]
    async fn test_demo_rates_cover_all_assets() {
        let oracle = SimulatedRateOracle::with_demo_rates(Currency::brl());
        for asset in CryptoAsset::all() {
            let pair = AssetPair::new(*asset, Currency::brl());
            assert!(oracle.supports(&pair));
            let rate = oracle.rate(&pair).await.unwrap();
            assert!(rate.is_positive());
        }
    }

    #[tokio::test]
    async fn test_jitter_stays_near_base() {
        let oracle = SimulatedRateOracle::with_demo_rates(Currency::brl());
        let pair = AssetPair::new(CryptoAsset::Usdc, Currency::brl());

        for _ in 0..50 {
            let rate = oracle.rate(&pair).await.unwrap().fiat_per_unit;
            assert!(rate >= dec!(4.975) && rate <= dec!(5.025));
        }
    }
}
