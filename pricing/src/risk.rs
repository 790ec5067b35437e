//! Risk scorer trait and simulated implementation.

use async_trait::async_trait;
use dashmap::DashMap;
use rand::Rng;
use rust_decimal::Decimal;
use tracing::debug;

use ramppay_common::CryptoAsset;

use crate::error::PricingResult;

/// Trait for volatility/risk scoring of an asset.
///
/// Scores are fractions in [0, 1]; higher means riskier.
#[async_trait]
pub trait RiskScorer: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &str;

    /// Get the current risk score for an asset, clamped to [0, 1].
    async fn risk_score(&self, asset: CryptoAsset) -> PricingResult<Decimal>;
}

/// Simulated risk scorer. Stands in for an ML model or order book depth
/// analysis; tests pin exact scores, the demo binary samples randomly.
pub struct SimulatedRiskScorer {
    name: String,
    scores: DashMap<CryptoAsset, Decimal>,
    randomize: bool,
}

impl SimulatedRiskScorer {
    /// Scorer that returns pinned scores only.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scores: DashMap::new(),
            randomize: false,
        }
    }

    /// Scorer that samples a random score for assets without a pinned one.
    pub fn randomized() -> Self {
        Self {
            name: "simulated-volatility".to_string(),
            scores: DashMap::new(),
            randomize: true,
        }
    }

    /// Pin the score for an asset. Values are clamped to [0, 1] on read.
    pub fn set_score(&self, asset: CryptoAsset, score: Decimal) {
        self.scores.insert(asset, score);
    }

    fn clamp(score: Decimal) -> Decimal {
        score.clamp(Decimal::ZERO, Decimal::ONE)
    }
}

#[async_trait]
impl RiskScorer for SimulatedRiskScorer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn risk_score(&self, asset: CryptoAsset) -> PricingResult<Decimal> {
        let score = match self.scores.get(&asset) {
            Some(pinned) => *pinned,
            None if self.randomize => {
                let bps: i64 = rand::thread_rng().gen_range(0..=10_000);
                Decimal::new(bps, 4)
            }
            None => {
                return Err(crate::error::PricingError::ScoreNotAvailable(asset));
            }
        };

        let score = Self::clamp(score);
        debug!(asset = %asset, score = %score, "Sampled risk score");
        Ok(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_pinned_score() {
        let scorer = SimulatedRiskScorer::new("test");
        scorer.set_score(CryptoAsset::Usdc, dec!(0.2));

        let score = scorer.risk_score(CryptoAsset::Usdc).await.unwrap();
        assert_eq!(score, dec!(0.2));
    }

    #[tokio::test]
    async fn test_missing_score_errors_without_randomize() {
        let scorer = SimulatedRiskScorer::new("test");
        assert!(scorer.risk_score(CryptoAsset::Eth).await.is_err());
    }

    #[tokio::test]
    async fn test_scores_are_clamped() {
        let scorer = SimulatedRiskScorer::new("test");
        scorer.set_score(CryptoAsset::Eth, dec!(1.7));
        scorer.set_score(CryptoAsset::Btc, dec!(-0.3));

        assert_eq!(scorer.risk_score(CryptoAsset::Eth).await.unwrap(), dec!(1));
        assert_eq!(scorer.risk_score(CryptoAsset::Btc).await.unwrap(), dec!(0));
    }

    #[tokio::test]
    async fn test_randomized_scores_in_range() {
        let scorer = SimulatedRiskScorer::randomized();
        for _ in 0..50 {
            let score = scorer.risk_score(CryptoAsset::Eth).await.unwrap();
            assert!(score >= dec!(0) && score <= dec!(1));
        }
    }
}
