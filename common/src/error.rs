//! Error types for the RampPay service.

use crate::{CryptoAsset, QuoteId, QuoteStatus};
use rust_decimal::Decimal;
use thiserror::Error;

/// Main error type for RampPay operations.
#[derive(Error, Debug)]
pub enum RampError {
    /// Invalid request input.
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// Circuit breaker: market too volatile, quotes paused for the asset.
    #[error("Market too volatile for {asset}: risk score {score} exceeds threshold")]
    RiskTooHigh { asset: CryptoAsset, score: Decimal },

    /// Quote not found.
    #[error("Quote not found: {0}")]
    QuoteNotFound(QuoteId),

    /// Quote TTL elapsed before the operation could complete.
    #[error("Quote expired: {0}")]
    QuoteExpired(QuoteId),

    /// Quote was already settled; at most one payout per quote.
    #[error("Quote already settled: {0}")]
    AlreadySettled(QuoteId),

    /// No active quote matches the incoming chain event.
    #[error("No matching quote for {amount} {asset}")]
    NoMatchingQuote { asset: CryptoAsset, amount: Decimal },

    /// More than one active quote matches; never guess.
    #[error("Ambiguous match for {amount} {asset}: {candidates} candidate quotes")]
    AmbiguousMatch {
        asset: CryptoAsset,
        amount: Decimal,
        candidates: usize,
    },

    /// Invalid quote state transition.
    #[error("Invalid transition from {from:?} to {to:?}")]
    InvalidTransition { from: QuoteStatus, to: QuoteStatus },

    /// Rate oracle or risk scorer timed out or failed.
    #[error("Upstream {service} unavailable: {reason}")]
    UpstreamUnavailable { service: String, reason: String },

    /// Fiat payout failed; fatal to the settlement call.
    #[error("Payout failed: {0}")]
    PayoutFailed(String),

    /// Audit write failed. Reported, never reverses a payout.
    #[error("Audit write failed: {0}")]
    AuditFailed(String),

    /// Liquidation dispatch failed. Non-fatal to settlement.
    #[error("Liquidation failed: {0}")]
    LiquidationFailed(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RampError {
    /// Check if this error is retryable by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RampError::UpstreamUnavailable { .. })
    }

    /// Get a stable error code for API responses and logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            RampError::Validation { .. } => "VALIDATION_FAILED",
            RampError::RiskTooHigh { .. } => "RISK_TOO_HIGH",
            RampError::QuoteNotFound(_) => "QUOTE_NOT_FOUND",
            RampError::QuoteExpired(_) => "QUOTE_EXPIRED",
            RampError::AlreadySettled(_) => "ALREADY_SETTLED",
            RampError::NoMatchingQuote { .. } => "NO_MATCHING_QUOTE",
            RampError::AmbiguousMatch { .. } => "AMBIGUOUS_MATCH",
            RampError::InvalidTransition { .. } => "INVALID_TRANSITION",
            RampError::UpstreamUnavailable { .. } => "UPSTREAM_UNAVAILABLE",
            RampError::PayoutFailed(_) => "PAYOUT_FAILED",
            RampError::AuditFailed(_) => "AUDIT_FAILED",
            RampError::LiquidationFailed(_) => "LIQUIDATION_FAILED",
            RampError::ConfigurationError(_) => "CONFIGURATION_ERROR",
            RampError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Convenience constructor for validation failures.
    pub fn validation(message: impl Into<String>) -> Self {
        RampError::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Validation failure tied to a specific field.
    pub fn validation_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        RampError::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Convenience constructor for upstream failures.
    pub fn upstream(service: impl Into<String>, reason: impl Into<String>) -> Self {
        RampError::UpstreamUnavailable {
            service: service.into(),
            reason: reason.into(),
        }
    }
}

impl From<crate::quote::InvalidQuoteTransition> for RampError {
    fn from(err: crate::quote::InvalidQuoteTransition) -> Self {
        RampError::InvalidTransition {
            from: err.from,
            to: err.to,
        }
    }
}

/// Result type alias for RampPay operations.
pub type Result<T> = std::result::Result<T, RampError>;
