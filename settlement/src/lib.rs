//! RampPay Settlement Core
//!
//! Owns the quote lifecycle and the webhook-driven settlement sequence:
//! risk-gated quote creation, explicit deposit matching, at-most-once fiat
//! payout, and detached liquidation dispatch.

pub mod audit;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod liquidation;
pub mod metrics;
pub mod payout;
pub mod store;

pub use audit::{AuditLog, TracingAuditLog};
pub use config::{MatchConfig, QuoteConfig, ServiceConfig};
pub use coordinator::SettlementCoordinator;
pub use engine::QuoteEngine;
pub use liquidation::{LiquidationTrigger, SimulatedExchange};
pub use metrics::{Metrics, MetricsSnapshot, SharedMetrics};
pub use payout::{
    PayoutGateway, Recipient, RecipientDirectory, SimulatedBankGateway, StaticRecipientDirectory,
};
pub use store::{InMemoryQuoteStore, QuoteStore};
