//! Metrics collection for service monitoring.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Service metrics.
pub struct Metrics {
    /// Quotes created.
    pub quotes_created: AtomicU64,
    /// Quotes rejected by the risk circuit breaker.
    pub quotes_rejected_risk: AtomicU64,
    /// Chain events received.
    pub settlements_total: AtomicU64,
    /// Successful settlements.
    pub settlements_success: AtomicU64,
    /// Settlements rejected at matching (no match / ambiguous).
    pub settlements_rejected: AtomicU64,
    /// Settlements failed after matching (payout or state conflicts).
    pub settlements_failed: AtomicU64,
    /// Fiat payouts sent.
    pub payouts_sent: AtomicU64,
    /// Audit writes that failed.
    pub audit_failures: AtomicU64,
    /// Liquidation tasks dispatched.
    pub liquidations_dispatched: AtomicU64,
    /// Liquidation tasks that failed (treasury float exposure).
    pub liquidations_failed: AtomicU64,
}

impl Metrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self {
            quotes_created: AtomicU64::new(0),
            quotes_rejected_risk: AtomicU64::new(0),
            settlements_total: AtomicU64::new(0),
            settlements_success: AtomicU64::new(0),
            settlements_rejected: AtomicU64::new(0),
            settlements_failed: AtomicU64::new(0),
            payouts_sent: AtomicU64::new(0),
            audit_failures: AtomicU64::new(0),
            liquidations_dispatched: AtomicU64::new(0),
            liquidations_failed: AtomicU64::new(0),
        }
    }

    /// Record quote creation.
    pub fn quote_created(&self) {
        self.quotes_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a quote rejected by the risk gate.
    pub fn quote_rejected_risk(&self) {
        self.quotes_rejected_risk.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a chain event received.
    pub fn settlement_initiated(&self) {
        self.settlements_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record settlement success.
    pub fn settlement_success(&self) {
        self.settlements_success.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a settlement rejected at matching.
    pub fn settlement_rejected(&self) {
        self.settlements_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record settlement failure.
    pub fn settlement_failed(&self) {
        self.settlements_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a fiat payout sent.
    pub fn payout_sent(&self) {
        self.payouts_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an audit write failure.
    pub fn audit_failure(&self) {
        self.audit_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a liquidation dispatch.
    pub fn liquidation_dispatched(&self) {
        self.liquidations_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a liquidation failure.
    pub fn liquidation_failed(&self) {
        self.liquidations_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            quotes_created: self.quotes_created.load(Ordering::Relaxed),
            quotes_rejected_risk: self.quotes_rejected_risk.load(Ordering::Relaxed),
            settlements_total: self.settlements_total.load(Ordering::Relaxed),
            settlements_success: self.settlements_success.load(Ordering::Relaxed),
            settlements_rejected: self.settlements_rejected.load(Ordering::Relaxed),
            settlements_failed: self.settlements_failed.load(Ordering::Relaxed),
            payouts_sent: self.payouts_sent.load(Ordering::Relaxed),
            audit_failures: self.audit_failures.load(Ordering::Relaxed),
            liquidations_dispatched: self.liquidations_dispatched.load(Ordering::Relaxed),
            liquidations_failed: self.liquidations_failed.load(Ordering::Relaxed),
        }
    }

    /// Export metrics in Prometheus format.
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        format!(
            r#"# HELP ramppay_quotes_created Total quotes created
# TYPE ramppay_quotes_created counter
ramppay_quotes_created {}

# HELP ramppay_quotes_rejected_risk Quotes rejected by the risk circuit breaker
# TYPE ramppay_quotes_rejected_risk counter
ramppay_quotes_rejected_risk {}

# HELP ramppay_settlements_total Chain events received
# TYPE ramppay_settlements_total counter
ramppay_settlements_total {}

# HELP ramppay_settlements_success Successful settlements
# TYPE ramppay_settlements_success counter
ramppay_settlements_success {}

# HELP ramppay_settlements_rejected Settlements rejected at matching
# TYPE ramppay_settlements_rejected counter
ramppay_settlements_rejected {}

# HELP ramppay_settlements_failed Settlements failed after matching
# TYPE ramppay_settlements_failed counter
ramppay_settlements_failed {}

# HELP ramppay_payouts_sent Fiat payouts sent
# TYPE ramppay_payouts_sent counter
ramppay_payouts_sent {}

# HELP ramppay_audit_failures Audit writes that failed
# TYPE ramppay_audit_failures counter
ramppay_audit_failures {}

# HELP ramppay_liquidations_dispatched Liquidation tasks dispatched
# TYPE ramppay_liquidations_dispatched counter
ramppay_liquidations_dispatched {}

# HELP ramppay_liquidations_failed Liquidation tasks that failed
# TYPE ramppay_liquidations_failed counter
ramppay_liquidations_failed {}
"#,
            snapshot.quotes_created,
            snapshot.quotes_rejected_risk,
            snapshot.settlements_total,
            snapshot.settlements_success,
            snapshot.settlements_rejected,
            snapshot.settlements_failed,
            snapshot.payouts_sent,
            snapshot.audit_failures,
            snapshot.liquidations_dispatched,
            snapshot.liquidations_failed,
        )
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub quotes_created: u64,
    pub quotes_rejected_risk: u64,
    pub settlements_total: u64,
    pub settlements_success: u64,
    pub settlements_rejected: u64,
    pub settlements_failed: u64,
    pub payouts_sent: u64,
    pub audit_failures: u64,
    pub liquidations_dispatched: u64,
    pub liquidations_failed: u64,
}

/// Shared metrics instance.
pub type SharedMetrics = Arc<Metrics>;
