//! Pricing error types.

use ramppay_common::{AssetPair, CryptoAsset};
use thiserror::Error;

/// Errors that can occur in the pricing collaborators.
#[derive(Debug, Error)]
pub enum PricingError {
    /// Rate not available for the requested pair.
    #[error("Rate not available for {0}")]
    RateNotAvailable(AssetPair),

    /// Risk score not available for the asset.
    #[error("Risk score not available for {0}")]
    ScoreNotAvailable(CryptoAsset),

    /// Provider returned an invalid rate.
    #[error("Invalid rate for {pair}: {reason}")]
    InvalidRate { pair: AssetPair, reason: String },

    /// Provider returned an error.
    #[error("Provider error: {0}")]
    ProviderError(String),
}

/// Result type for pricing operations.
pub type PricingResult<T> = Result<T, PricingError>;
