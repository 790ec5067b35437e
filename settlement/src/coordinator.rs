//! Settlement coordinator.
//!
//! Turns a confirmed on-chain deposit into an instant fiat payout.
//! Matching is explicit (asset plus amount within tolerance) and the
//! payout is at-most-once: a per-quote async lock serializes concurrent
//! events for the same quote, and the store-level compare-and-set is the
//! final arbiter of the Active to Settled transition.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{error, info, instrument, warn};

use ramppay_common::{
    ChainEvent, Quote, QuoteId, QuoteStatus, RampError, Result, SettlementResult,
};

use crate::audit::AuditLog;
use crate::config::MatchConfig;
use crate::liquidation::{dispatch_liquidation, LiquidationTrigger};
use crate::metrics::SharedMetrics;
use crate::payout::{PayoutGateway, RecipientDirectory};
use crate::store::QuoteStore;

/// The settlement coordinator.
pub struct SettlementCoordinator {
    store: Arc<dyn QuoteStore>,
    payout: Arc<dyn PayoutGateway>,
    audit: Arc<dyn AuditLog>,
    liquidation: Arc<dyn LiquidationTrigger>,
    recipients: Arc<dyn RecipientDirectory>,
    metrics: SharedMetrics,
    config: MatchConfig,
    // Per-quote serialization for concurrent deposit notifications.
    settle_locks: DashMap<QuoteId, Arc<tokio::sync::Mutex<()>>>,
}

impl SettlementCoordinator {
    /// Create a new settlement coordinator.
    pub fn new(
        store: Arc<dyn QuoteStore>,
        payout: Arc<dyn PayoutGateway>,
        audit: Arc<dyn AuditLog>,
        liquidation: Arc<dyn LiquidationTrigger>,
        recipients: Arc<dyn RecipientDirectory>,
        metrics: SharedMetrics,
        config: MatchConfig,
    ) -> Self {
        Self {
            store,
            payout,
            audit,
            liquidation,
            recipients,
            metrics,
            config,
            settle_locks: DashMap::new(),
        }
    }

    /// Handle a confirmed deposit into the treasury wallet.
    ///
    /// On success the quote is Settled, the fiat payout has been sent
    /// exactly once, and a liquidation task has been dispatched.
    #[instrument(skip(self, event), fields(tx_hash = %event.tx_hash, asset = %event.asset, amount = %event.amount))]
    pub async fn handle_chain_event(&self, event: &ChainEvent) -> Result<SettlementResult> {
        self.metrics.settlement_initiated();

        let quote_id = self.match_quote(event).await?;

        // Serialize settlement attempts for this quote. The lock entry is
        // tiny and quotes are short-lived, so entries are never evicted.
        let lock = self
            .settle_locks
            .entry(quote_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Re-read under the lock: a concurrent event may have settled or
        // the TTL may have lapsed while we waited.
        let quote = self
            .store
            .get(&quote_id)
            .await
            .ok_or(RampError::QuoteNotFound(quote_id))?;

        match quote.effective_status(ramppay_common::time::now()) {
            QuoteStatus::Active => {}
            QuoteStatus::Settled => {
                self.metrics.settlement_failed();
                self.release_lock(&quote_id);
                return Err(RampError::AlreadySettled(quote_id));
            }
            QuoteStatus::Expired => {
                self.metrics.settlement_failed();
                self.release_lock(&quote_id);
                return Err(RampError::QuoteExpired(quote_id));
            }
            QuoteStatus::Cancelled => {
                self.metrics.settlement_rejected();
                self.release_lock(&quote_id);
                return Err(RampError::NoMatchingQuote {
                    asset: event.asset,
                    amount: event.amount,
                });
            }
        }

        let payout_id = self.send_payout(&quote).await?;

        // The payout has left the building; record the transition. A lost
        // CAS here means a concurrent settle slipped past the lock, which
        // the lock is supposed to make impossible.
        let won = self
            .store
            .compare_and_set_status(&quote_id, QuoteStatus::Active, QuoteStatus::Settled)
            .await?;
        if !won {
            self.metrics.settlement_failed();
            self.release_lock(&quote_id);
            error!(
                quote_id = %quote_id,
                payout_id = %payout_id,
                "Quote settled concurrently after payout, manual reconciliation required"
            );
            return Err(RampError::Internal(format!(
                "quote {} settled concurrently after payout {}",
                quote_id, payout_id
            )));
        }

        self.metrics.payout_sent();

        if let Err(e) = self
            .audit
            .record_fiat_movement(&payout_id, &quote.fiat_amount, quote_id)
            .await
        {
            self.metrics.audit_failure();
            error!(
                quote_id = %quote_id,
                payout_id = %payout_id,
                error = %e,
                "Audit write failed after payout"
            );
        }

        dispatch_liquidation(
            self.liquidation.clone(),
            self.metrics.clone(),
            quote.crypto_amount,
            quote.asset,
            quote_id,
        );

        self.release_lock(&quote_id);

        self.metrics.settlement_success();
        info!(
            quote_id = %quote_id,
            payout_id = %payout_id,
            tx_hash = %event.tx_hash,
            "Settlement complete"
        );

        Ok(SettlementResult {
            status: QuoteStatus::Settled,
            payout_id,
            quote_id,
        })
    }

    /// Drop the lock entry for a quote that reached a terminal state.
    /// Waiters hold their own `Arc` to the mutex; a later event re-creates
    /// the entry and fails re-validation, so the map stays bounded by the
    /// number of quotes still in flight.
    fn release_lock(&self, quote_id: &QuoteId) {
        self.settle_locks.remove(quote_id);
    }

    #[cfg(test)]
    fn settle_lock_count(&self) -> usize {
        self.settle_locks.len()
    }

    /// Match the deposit to exactly one live quote by asset and amount.
    async fn match_quote(&self, event: &ChainEvent) -> Result<QuoteId> {
        let now = ramppay_common::time::now();
        let candidates: Vec<Quote> = self
            .store
            .active_quotes()
            .await
            .into_iter()
            .filter(|q| {
                q.effective_status(now) == QuoteStatus::Active
                    && q.asset == event.asset
                    && self.amount_matches(q, event)
            })
            .collect();

        match candidates.len() {
            0 => {
                self.metrics.settlement_rejected();
                warn!(
                    asset = %event.asset,
                    amount = %event.amount,
                    tx_hash = %event.tx_hash,
                    "Deposit matches no live quote"
                );
                Err(RampError::NoMatchingQuote {
                    asset: event.asset,
                    amount: event.amount,
                })
            }
            1 => Ok(candidates[0].id),
            n => {
                self.metrics.settlement_rejected();
                warn!(
                    asset = %event.asset,
                    amount = %event.amount,
                    candidates = n,
                    "Deposit matches multiple quotes, refusing to guess"
                );
                Err(RampError::AmbiguousMatch {
                    asset: event.asset,
                    amount: event.amount,
                    candidates: n,
                })
            }
        }
    }

    fn amount_matches(&self, quote: &Quote, event: &ChainEvent) -> bool {
        let deviation = (event.amount - quote.crypto_amount).abs();
        deviation <= quote.crypto_amount * self.config.amount_tolerance
    }

    async fn send_payout(&self, quote: &Quote) -> Result<ramppay_common::PayoutId> {
        let recipient = self.recipients.recipient_for(quote);
        match self
            .payout
            .send_payout(&quote.fiat_amount, &recipient.key, &recipient.name)
            .await
        {
            Ok(id) => Ok(id),
            Err(e) => {
                // Quote stays Active; a retried deposit event can settle it.
                self.metrics.settlement_failed();
                error!(
                    quote_id = %quote.id,
                    error = %e,
                    "Fiat payout failed, quote remains active"
                );
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::RecordingAuditLog;
    use crate::liquidation::RecordingLiquidation;
    use crate::payout::{Recipient, RecordingPayoutGateway, StaticRecipientDirectory};
    use crate::store::InMemoryQuoteStore;
    use chrono::{Duration, Utc};
    use ramppay_common::{CryptoAsset, Currency, Money, TxHash};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    struct Harness {
        coordinator: Arc<SettlementCoordinator>,
        store: Arc<InMemoryQuoteStore>,
        payout: Arc<RecordingPayoutGateway>,
        audit: Arc<RecordingAuditLog>,
        liquidation: Arc<RecordingLiquidation>,
        metrics: SharedMetrics,
    }

    fn setup_with_gateway(payout: Arc<RecordingPayoutGateway>) -> Harness {
        let store = Arc::new(InMemoryQuoteStore::new());
        let audit = Arc::new(RecordingAuditLog::new());
        let liquidation = Arc::new(RecordingLiquidation::new());
        let metrics: SharedMetrics = Arc::new(crate::metrics::Metrics::new());

        let coordinator = Arc::new(SettlementCoordinator::new(
            store.clone(),
            payout.clone(),
            audit.clone(),
            liquidation.clone(),
            Arc::new(StaticRecipientDirectory::new(Recipient {
                key: "user-cpf-key".to_string(),
                name: "John Doe".to_string(),
            })),
            metrics.clone(),
            MatchConfig::default(),
        ));

        Harness {
            coordinator,
            store,
            payout,
            audit,
            liquidation,
            metrics,
        }
    }

    fn setup() -> Harness {
        setup_with_gateway(Arc::new(RecordingPayoutGateway::new()))
    }

    fn make_quote(crypto_amount: Decimal) -> Quote {
        let now = Utc::now();
        Quote {
            id: QuoteId::new(),
            fiat_amount: Money::new(dec!(500), Currency::brl()),
            asset: CryptoAsset::Usdc,
            exchange_rate: dec!(5.0),
            risk_score: dec!(0.2),
            spread: dec!(0.02),
            crypto_amount,
            deposit_address: "0xtreasury".to_string(),
            created_at: now,
            expires_at: now + Duration::minutes(10),
            status: QuoteStatus::Active,
        }
    }

    fn make_event(amount: Decimal) -> ChainEvent {
        ChainEvent {
            tx_hash: TxHash::new("0xabc123"),
            from_address: "0xsender".to_string(),
            to_address: "0xtreasury".to_string(),
            amount,
            asset: CryptoAsset::Usdc,
        }
    }

    #[tokio::test]
    async fn test_settlement_happy_path() {
        let harness = setup();
        let quote = make_quote(dec!(102.0));
        let quote_id = quote.id;
        harness.store.insert(quote).await.unwrap();

        let result = harness
            .coordinator
            .handle_chain_event(&make_event(dec!(102.0)))
            .await
            .unwrap();

        assert_eq!(result.quote_id, quote_id);
        assert_eq!(result.status, QuoteStatus::Settled);
        assert_eq!(
            harness.store.get(&quote_id).await.unwrap().status,
            QuoteStatus::Settled
        );

        // Payout to the right recipient, then the audit entry.
        assert_eq!(harness.payout.payout_count(), 1);
        assert_eq!(harness.payout.payouts()[0].1, "user-cpf-key");
        assert_eq!(harness.audit.fiat_movements().len(), 1);
        assert_eq!(harness.audit.fiat_movements()[0].1, quote_id);

        // Liquidation runs detached.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(harness.liquidation.sell_count(), 1);
        assert_eq!(
            harness.liquidation.sells()[0],
            (dec!(102.0), CryptoAsset::Usdc)
        );

        let snapshot = harness.metrics.snapshot();
        assert_eq!(snapshot.settlements_success, 1);
        assert_eq!(snapshot.payouts_sent, 1);
    }

    #[tokio::test]
    async fn test_amount_within_tolerance_matches() {
        let harness = setup();
        let quote = make_quote(dec!(100.0));
        harness.store.insert(quote).await.unwrap();

        // 0.5% tolerance on 100.0 accepts up to 100.5.
        let result = harness
            .coordinator
            .handle_chain_event(&make_event(dec!(100.4)))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_no_matching_quote() {
        let harness = setup();
        let quote = make_quote(dec!(102.0));
        harness.store.insert(quote).await.unwrap();

        let result = harness
            .coordinator
            .handle_chain_event(&make_event(dec!(50.0)))
            .await;

        assert!(matches!(result, Err(RampError::NoMatchingQuote { .. })));
        assert_eq!(harness.payout.payout_count(), 0);
        assert_eq!(harness.metrics.snapshot().settlements_rejected, 1);
    }

    #[tokio::test]
    async fn test_wrong_asset_does_not_match() {
        let harness = setup();
        let mut quote = make_quote(dec!(102.0));
        quote.asset = CryptoAsset::Eth;
        harness.store.insert(quote).await.unwrap();

        let result = harness
            .coordinator
            .handle_chain_event(&make_event(dec!(102.0)))
            .await;
        assert!(matches!(result, Err(RampError::NoMatchingQuote { .. })));
    }

    #[tokio::test]
    async fn test_ambiguous_match_is_rejected() {
        let harness = setup();
        harness.store.insert(make_quote(dec!(102.0))).await.unwrap();
        harness.store.insert(make_quote(dec!(102.0))).await.unwrap();

        let result = harness
            .coordinator
            .handle_chain_event(&make_event(dec!(102.0)))
            .await;

        match result {
            Err(RampError::AmbiguousMatch { candidates, .. }) => assert_eq!(candidates, 2),
            other => panic!("expected AmbiguousMatch, got {:?}", other.err()),
        }
        assert_eq!(harness.payout.payout_count(), 0);
    }

    #[tokio::test]
    async fn test_expired_quote_does_not_match() {
        let harness = setup();
        let mut quote = make_quote(dec!(102.0));
        quote.expires_at = quote.created_at - Duration::seconds(1);
        harness.store.insert(quote).await.unwrap();

        let result = harness
            .coordinator
            .handle_chain_event(&make_event(dec!(102.0)))
            .await;
        assert!(matches!(result, Err(RampError::NoMatchingQuote { .. })));
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_event_pays_once() {
        let harness = setup_with_gateway(Arc::new(RecordingPayoutGateway::with_delay(
            std::time::Duration::from_millis(100),
        )));
        let quote = make_quote(dec!(102.0));
        harness.store.insert(quote).await.unwrap();

        let c1 = harness.coordinator.clone();
        let c2 = harness.coordinator.clone();
        let e1 = make_event(dec!(102.0));
        let e2 = make_event(dec!(102.0));

        let (r1, r2) = tokio::join!(
            tokio::spawn(async move { c1.handle_chain_event(&e1).await }),
            tokio::spawn(async move { c2.handle_chain_event(&e2).await }),
        );
        let r1 = r1.unwrap();
        let r2 = r2.unwrap();

        // Exactly one winner, exactly one payout.
        assert_eq!(
            [r1.is_ok(), r2.is_ok()].iter().filter(|ok| **ok).count(),
            1
        );
        let loser = if r1.is_err() { r1 } else { r2 };
        assert!(matches!(loser, Err(RampError::AlreadySettled(_))));
        assert_eq!(harness.payout.payout_count(), 1);
        assert_eq!(harness.coordinator.settle_lock_count(), 0);
    }

    #[tokio::test]
    async fn test_settle_locks_do_not_accumulate() {
        let harness = setup();

        for _ in 0..5 {
            let quote = make_quote(dec!(102.0));
            harness.store.insert(quote).await.unwrap();
            harness
                .coordinator
                .handle_chain_event(&make_event(dec!(102.0)))
                .await
                .unwrap();
        }

        assert_eq!(harness.coordinator.settle_lock_count(), 0);
    }

    #[tokio::test]
    async fn test_payout_failure_leaves_quote_active() {
        let harness = setup();
        harness.payout.set_failing(true);
        let quote = make_quote(dec!(102.0));
        let quote_id = quote.id;
        harness.store.insert(quote).await.unwrap();

        let result = harness
            .coordinator
            .handle_chain_event(&make_event(dec!(102.0)))
            .await;

        assert!(matches!(result, Err(RampError::PayoutFailed(_))));
        assert_eq!(
            harness.store.get(&quote_id).await.unwrap().status,
            QuoteStatus::Active
        );
        assert!(harness.audit.fiat_movements().is_empty());

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(harness.liquidation.sell_count(), 0);

        // The quote is still in flight, so its lock entry stays.
        assert_eq!(harness.coordinator.settle_lock_count(), 1);

        // A retried event can still settle the quote.
        harness.payout.set_failing(false);
        let retry = harness
            .coordinator
            .handle_chain_event(&make_event(dec!(102.0)))
            .await;
        assert!(retry.is_ok());
        assert_eq!(harness.coordinator.settle_lock_count(), 0);
    }

    #[tokio::test]
    async fn test_audit_failure_does_not_fail_settlement() {
        let harness = setup();
        harness.audit.set_failing(true);
        let quote = make_quote(dec!(102.0));
        harness.store.insert(quote).await.unwrap();

        let result = harness
            .coordinator
            .handle_chain_event(&make_event(dec!(102.0)))
            .await;

        assert!(result.is_ok());
        assert_eq!(harness.payout.payout_count(), 1);
        assert_eq!(harness.metrics.snapshot().audit_failures, 1);
    }

    #[tokio::test]
    async fn test_liquidation_failure_does_not_fail_settlement() {
        let harness = setup();
        harness.liquidation.set_failing(true);
        let quote = make_quote(dec!(102.0));
        harness.store.insert(quote).await.unwrap();

        let result = harness
            .coordinator
            .handle_chain_event(&make_event(dec!(102.0)))
            .await;
        assert!(result.is_ok());

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let snapshot = harness.metrics.snapshot();
        assert_eq!(snapshot.liquidations_dispatched, 1);
        assert_eq!(snapshot.liquidations_failed, 1);
        assert_eq!(snapshot.settlements_success, 1);
    }

    #[tokio::test]
    async fn test_settled_quote_rejects_second_event() {
        let harness = setup();
        let quote = make_quote(dec!(102.0));
        harness.store.insert(quote).await.unwrap();

        harness
            .coordinator
            .handle_chain_event(&make_event(dec!(102.0)))
            .await
            .unwrap();

        // The settled quote no longer matches; the replay is rejected.
        let replay = harness
            .coordinator
            .handle_chain_event(&make_event(dec!(102.0)))
            .await;
        assert!(matches!(replay, Err(RampError::NoMatchingQuote { .. })));
        assert_eq!(harness.payout.payout_count(), 1);
    }
}
