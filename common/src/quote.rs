//! Quote model and lifecycle state machine.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{CryptoAsset, Money, QuoteId};

/// Quote lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuoteStatus {
    /// Quote is live and can be settled.
    Active,
    /// Deposit matched and fiat paid out.
    Settled,
    /// TTL elapsed before a matching deposit arrived.
    Expired,
    /// User abandoned the quote.
    Cancelled,
}

impl QuoteStatus {
    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, QuoteStatus::Active)
    }

    /// Get valid next states from current state.
    pub fn valid_transitions(&self) -> &[QuoteStatus] {
        match self {
            QuoteStatus::Active => &[
                QuoteStatus::Settled,
                QuoteStatus::Expired,
                QuoteStatus::Cancelled,
            ],
            QuoteStatus::Settled => &[],
            QuoteStatus::Expired => &[],
            QuoteStatus::Cancelled => &[],
        }
    }

    /// Check if transition to given state is valid.
    pub fn can_transition_to(&self, next: QuoteStatus) -> bool {
        self.valid_transitions().contains(&next)
    }
}

/// A priced, time-bounded offer converting a fiat amount to a crypto
/// amount at a locked rate and spread.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    /// Unique quote identifier.
    pub id: QuoteId,
    /// Fiat amount the user will receive.
    pub fiat_amount: Money,
    /// Crypto asset expected on the deposit leg.
    pub asset: CryptoAsset,
    /// Fiat per unit of the asset, sampled at quote time.
    pub exchange_rate: Decimal,
    /// Volatility/risk score in [0, 1], sampled at quote time.
    pub risk_score: Decimal,
    /// Risk-adjusted fee fraction added to the raw conversion.
    pub spread: Decimal,
    /// Crypto amount the user must deposit.
    pub crypto_amount: Decimal,
    /// Treasury address for the crypto leg.
    pub deposit_address: String,
    /// When the quote was created.
    pub created_at: DateTime<Utc>,
    /// When the quote expires.
    pub expires_at: DateTime<Utc>,
    /// Stored lifecycle state. The TTL is authoritative: readers must go
    /// through [`Quote::effective_status`].
    pub status: QuoteStatus,
}

impl Quote {
    /// Derived crypto amount: `(fiat / rate) × (1 + spread)`.
    pub fn compute_crypto_amount(
        fiat_amount: Decimal,
        exchange_rate: Decimal,
        spread: Decimal,
    ) -> Decimal {
        (fiat_amount / exchange_rate) * (Decimal::ONE + spread)
    }

    /// Check if the quote TTL has elapsed at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Lifecycle state as observed at `now`. An Active quote past its TTL
    /// reads as Expired even if the stored field was never updated.
    pub fn effective_status(&self, now: DateTime<Utc>) -> QuoteStatus {
        if self.status == QuoteStatus::Active && self.is_expired_at(now) {
            QuoteStatus::Expired
        } else {
            self.status
        }
    }

    /// Check the quote can still be settled at `now`.
    pub fn is_settleable_at(&self, now: DateTime<Utc>) -> bool {
        self.effective_status(now) == QuoteStatus::Active
    }

    /// Transition to a new status.
    pub fn transition_to(&mut self, next: QuoteStatus) -> Result<(), InvalidQuoteTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidQuoteTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Verify the stored crypto amount against the stored pricing inputs.
    pub fn pricing_is_consistent(&self) -> bool {
        let recomputed = Self::compute_crypto_amount(
            self.fiat_amount.value,
            self.exchange_rate,
            self.spread,
        );
        recomputed == self.crypto_amount
    }

    /// Remaining time until expiry at `now`.
    pub fn time_remaining(&self, now: DateTime<Utc>) -> Duration {
        let remaining = self.expires_at - now;
        if remaining < Duration::zero() {
            Duration::zero()
        } else {
            remaining
        }
    }
}

/// Error when attempting an invalid quote state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidQuoteTransition {
    pub from: QuoteStatus,
    pub to: QuoteStatus,
}

impl std::fmt::Display for InvalidQuoteTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Invalid quote transition from {:?} to {:?}",
            self.from, self.to
        )
    }
}

impl std::error::Error for InvalidQuoteTransition {}

/// A deposit confirmation reported by the chain watcher. Ephemeral, never
/// persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainEvent {
    /// On-chain transaction hash.
    pub tx_hash: crate::TxHash,
    /// Sender address.
    pub from_address: String,
    /// Destination address.
    pub to_address: String,
    /// Deposited amount in asset units.
    pub amount: Decimal,
    /// Deposited asset.
    pub asset: CryptoAsset,
}

/// Result of a successful settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementResult {
    /// Final quote status (always Settled on success).
    pub status: QuoteStatus,
    /// Bank rail payout identifier.
    pub payout_id: crate::PayoutId,
    /// The quote that was settled.
    pub quote_id: QuoteId,
}
