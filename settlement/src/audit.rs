//! Audit log collaborator.
//!
//! Fiat movement entries are written only after the payout succeeds; a
//! failed audit write is reported but never reverses the payout.

use async_trait::async_trait;
use tracing::info;

use ramppay_common::{Money, PayoutId, Quote, QuoteId, Result};

/// Immutable audit trail of quote and fiat movement events.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Record quote creation.
    async fn record_quote_created(&self, quote: &Quote) -> Result<()>;

    /// Record a fiat movement after a successful payout.
    async fn record_fiat_movement(
        &self,
        payout_id: &PayoutId,
        amount: &Money,
        quote_id: QuoteId,
    ) -> Result<()>;
}

/// Audit log writing structured events to the `audit` tracing target.
pub struct TracingAuditLog;

#[async_trait]
impl AuditLog for TracingAuditLog {
    async fn record_quote_created(&self, quote: &Quote) -> Result<()> {
        info!(
            target: "audit",
            quote_id = %quote.id,
            asset = %quote.asset,
            fiat_amount = %quote.fiat_amount,
            crypto_amount = %quote.crypto_amount,
            exchange_rate = %quote.exchange_rate,
            spread = %quote.spread,
            expires_at = %quote.expires_at,
            "Quote created"
        );
        Ok(())
    }

    async fn record_fiat_movement(
        &self,
        payout_id: &PayoutId,
        amount: &Money,
        quote_id: QuoteId,
    ) -> Result<()> {
        info!(
            target: "audit",
            payout_id = %payout_id,
            amount = %amount,
            quote_id = %quote_id,
            "Fiat moved"
        );
        Ok(())
    }
}

/// Audit entry captured by the recording log.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Clone)]
pub enum AuditEntry {
    QuoteCreated(QuoteId),
    FiatMovement {
        payout_id: PayoutId,
        amount: Money,
        quote_id: QuoteId,
    },
}

/// Recording audit log for tests.
#[cfg(any(test, feature = "test-utils"))]
pub struct RecordingAuditLog {
    entries: parking_lot::Mutex<Vec<AuditEntry>>,
    fail: std::sync::atomic::AtomicBool,
}

#[cfg(any(test, feature = "test-utils"))]
impl RecordingAuditLog {
    pub fn new() -> Self {
        Self {
            entries: parking_lot::Mutex::new(Vec::new()),
            fail: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().clone()
    }

    pub fn fiat_movements(&self) -> Vec<(PayoutId, QuoteId)> {
        self.entries
            .lock()
            .iter()
            .filter_map(|entry| match entry {
                AuditEntry::FiatMovement {
                    payout_id,
                    quote_id,
                    ..
                } => Some((payout_id.clone(), *quote_id)),
                _ => None,
            })
            .collect()
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Default for RecordingAuditLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl AuditLog for RecordingAuditLog {
    async fn record_quote_created(&self, quote: &Quote) -> Result<()> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(ramppay_common::RampError::AuditFailed(
                "simulated audit outage".to_string(),
            ));
        }
        self.entries
            .lock()
            .push(AuditEntry::QuoteCreated(quote.id));
        Ok(())
    }

    async fn record_fiat_movement(
        &self,
        payout_id: &PayoutId,
        amount: &Money,
        quote_id: QuoteId,
    ) -> Result<()> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(ramppay_common::RampError::AuditFailed(
                "simulated audit outage".to_string(),
            ));
        }
        self.entries.lock().push(AuditEntry::FiatMovement {
            payout_id: payout_id.clone(),
            amount: amount.clone(),
            quote_id,
        });
        Ok(())
    }
}
