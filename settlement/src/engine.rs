//! Quote engine.
//!
//! Sole owner of quote creation. Samples risk and rate under bounded
//! timeouts, applies the volatility circuit breaker, prices the
//! conversion and persists the quote.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use ramppay_common::{
    AssetPair, CryptoAsset, DurationExt, Money, Quote, QuoteStatus, RampError, Result,
};
use ramppay_pricing::{spread_for_risk, RateOracle, RiskScorer, SpreadConfig};

use crate::audit::AuditLog;
use crate::config::QuoteConfig;
use crate::metrics::SharedMetrics;
use crate::store::QuoteStore;

/// The quote engine.
pub struct QuoteEngine {
    store: Arc<dyn QuoteStore>,
    oracle: Arc<dyn RateOracle>,
    risk_scorer: Arc<dyn RiskScorer>,
    audit: Arc<dyn AuditLog>,
    metrics: SharedMetrics,
    config: QuoteConfig,
    spread_config: SpreadConfig,
}

impl QuoteEngine {
    /// Create a new quote engine.
    pub fn new(
        store: Arc<dyn QuoteStore>,
        oracle: Arc<dyn RateOracle>,
        risk_scorer: Arc<dyn RiskScorer>,
        audit: Arc<dyn AuditLog>,
        metrics: SharedMetrics,
        config: QuoteConfig,
        spread_config: SpreadConfig,
    ) -> Self {
        Self {
            store,
            oracle,
            risk_scorer,
            audit,
            metrics,
            config,
            spread_config,
        }
    }

    /// Create a priced, time-bounded quote for converting `fiat_amount`
    /// into `asset`.
    #[instrument(skip(self), fields(asset = %asset, fiat_amount = %fiat_amount))]
    pub async fn create_quote(&self, fiat_amount: Decimal, asset: CryptoAsset) -> Result<Quote> {
        if fiat_amount <= Decimal::ZERO {
            return Err(RampError::validation_field(
                "fiat amount must be positive",
                "amount",
            ));
        }

        // Risk gate comes first: a paused market must not cost an oracle call.
        let risk_score = self.sample_risk(asset).await?;
        if risk_score > self.config.risk_threshold {
            self.metrics.quote_rejected_risk();
            warn!(
                asset = %asset,
                score = %risk_score,
                threshold = %self.config.risk_threshold,
                "Quotes paused for asset, market too volatile"
            );
            return Err(RampError::RiskTooHigh {
                asset,
                score: risk_score,
            });
        }

        let pair = AssetPair::new(asset, self.config.fiat_currency.clone());
        let rate = self.sample_rate(&pair).await?;

        let spread = spread_for_risk(risk_score, &self.spread_config);
        let crypto_amount =
            Quote::compute_crypto_amount(fiat_amount, rate.fiat_per_unit, spread);

        let created_at = ramppay_common::time::now();
        let quote = Quote {
            id: ramppay_common::QuoteId::new(),
            fiat_amount: Money::new(fiat_amount, self.config.fiat_currency.clone()),
            asset,
            exchange_rate: rate.fiat_per_unit,
            risk_score,
            spread,
            crypto_amount,
            deposit_address: self.config.deposit_address.clone(),
            created_at,
            expires_at: created_at + self.config.ttl,
            status: QuoteStatus::Active,
        };

        self.store.insert(quote.clone()).await?;

        if let Err(e) = self.audit.record_quote_created(&quote).await {
            self.metrics.audit_failure();
            warn!(quote_id = %quote.id, error = %e, "Quote audit write failed");
        }

        self.metrics.quote_created();
        info!(
            quote_id = %quote.id,
            crypto_amount = %quote.crypto_amount,
            spread = %quote.spread,
            expires_at = %quote.expires_at,
            "Quote created"
        );

        Ok(quote)
    }

    /// Fetch a quote by id. Logically expired quotes are returned with
    /// their status computed as Expired, so callers get a precise reason.
    pub async fn get_quote(&self, id: &ramppay_common::QuoteId) -> Result<Quote> {
        let mut quote = self
            .store
            .get(id)
            .await
            .ok_or(RampError::QuoteNotFound(*id))?;
        quote.status = quote.effective_status(ramppay_common::time::now());
        Ok(quote)
    }

    async fn sample_risk(&self, asset: CryptoAsset) -> Result<Decimal> {
        let timeout = self.config.upstream_timeout.as_std();
        match tokio::time::timeout(timeout, self.risk_scorer.risk_score(asset)).await {
            Ok(Ok(score)) => Ok(score),
            Ok(Err(e)) => Err(RampError::upstream("risk-scorer", e.to_string())),
            Err(_) => Err(RampError::upstream("risk-scorer", "timed out")),
        }
    }

    async fn sample_rate(&self, pair: &AssetPair) -> Result<ramppay_common::ExchangeRate> {
        let timeout = self.config.upstream_timeout.as_std();
        let rate = match tokio::time::timeout(timeout, self.oracle.rate(pair)).await {
            Ok(Ok(rate)) => rate,
            Ok(Err(e)) => return Err(RampError::upstream("rate-oracle", e.to_string())),
            Err(_) => return Err(RampError::upstream("rate-oracle", "timed out")),
        };

        if !rate.is_positive() {
            return Err(RampError::upstream(
                "rate-oracle",
                format!("non-positive rate for {}", pair),
            ));
        }

        Ok(rate)
    }
}
