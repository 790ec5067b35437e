//! Liquidation trigger and detached dispatch.
//!
//! Liquidation converts the received crypto back to a stable position.
//! It runs outside the settlement critical path: failures never fail the
//! settlement response, but each one leaves the treasury holding float
//! exposure and must be observable.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::{error, info};

use ramppay_common::{CryptoAsset, QuoteId, Result};

use crate::metrics::SharedMetrics;

/// Exchange connector selling received crypto.
#[async_trait]
pub trait LiquidationTrigger: Send + Sync {
    /// Get the connector name.
    fn name(&self) -> &str;

    /// Market-sell the given amount of the asset.
    async fn sell(&self, amount: Decimal, asset: CryptoAsset) -> Result<()>;
}

/// Simulated exchange connector.
pub struct SimulatedExchange;

#[async_trait]
impl LiquidationTrigger for SimulatedExchange {
    fn name(&self) -> &str {
        "simulated-exchange"
    }

    async fn sell(&self, amount: Decimal, asset: CryptoAsset) -> Result<()> {
        info!(amount = %amount, asset = %asset, "Market-selling received crypto");
        Ok(())
    }
}

/// Dispatch a liquidation as a detached task.
///
/// Returns immediately; the spawned task logs and counts failures with
/// enough context for manual reconciliation.
pub fn dispatch_liquidation(
    trigger: Arc<dyn LiquidationTrigger>,
    metrics: SharedMetrics,
    amount: Decimal,
    asset: CryptoAsset,
    quote_id: QuoteId,
) {
    metrics.liquidation_dispatched();
    tokio::spawn(async move {
        match trigger.sell(amount, asset).await {
            Ok(()) => {
                info!(
                    quote_id = %quote_id,
                    amount = %amount,
                    asset = %asset,
                    "Liquidation completed"
                );
            }
            Err(e) => {
                metrics.liquidation_failed();
                error!(
                    quote_id = %quote_id,
                    amount = %amount,
                    asset = %asset,
                    error = %e,
                    "Liquidation failed, treasury holds unsold crypto"
                );
            }
        }
    });
}

/// Recording trigger for tests: counts sells, optionally fails.
#[cfg(any(test, feature = "test-utils"))]
pub struct RecordingLiquidation {
    sells: parking_lot::Mutex<Vec<(Decimal, CryptoAsset)>>,
    fail: std::sync::atomic::AtomicBool,
}

#[cfg(any(test, feature = "test-utils"))]
impl RecordingLiquidation {
    pub fn new() -> Self {
        Self {
            sells: parking_lot::Mutex::new(Vec::new()),
            fail: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn sell_count(&self) -> usize {
        self.sells.lock().len()
    }

    pub fn sells(&self) -> Vec<(Decimal, CryptoAsset)> {
        self.sells.lock().clone()
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Default for RecordingLiquidation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl LiquidationTrigger for RecordingLiquidation {
    fn name(&self) -> &str {
        "recording-exchange"
    }

    async fn sell(&self, amount: Decimal, asset: CryptoAsset) -> Result<()> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(ramppay_common::RampError::LiquidationFailed(
                "simulated exchange outage".to_string(),
            ));
        }
        self.sells.lock().push((amount, asset));
        Ok(())
    }
}
