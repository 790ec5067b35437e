//! Fiat payout gateway and recipient resolution.

use async_trait::async_trait;
use rand::Rng;
use tracing::info;

use ramppay_common::{constants, DurationExt, Money, PayoutId, Quote, Result};

/// Recipient of the fiat leg.
#[derive(Debug, Clone)]
pub struct Recipient {
    /// Bank rail key (PIX key / account reference).
    pub key: String,
    /// Display name for the transfer.
    pub name: String,
}

/// Resolves the recipient linked to a quote. The quote-to-user link is
/// injected data owned by whoever created the quote on behalf of a user.
pub trait RecipientDirectory: Send + Sync {
    fn recipient_for(&self, quote: &Quote) -> Recipient;
}

/// Directory returning a single fixed recipient (demo wiring).
pub struct StaticRecipientDirectory {
    recipient: Recipient,
}

impl StaticRecipientDirectory {
    /// Create a directory around one recipient.
    pub fn new(recipient: Recipient) -> Self {
        Self { recipient }
    }

    /// Demo recipient matching the sandbox user.
    pub fn demo() -> Self {
        Self::new(Recipient {
            key: "user-cpf-key".to_string(),
            name: "John Doe".to_string(),
        })
    }
}

impl RecipientDirectory for StaticRecipientDirectory {
    fn recipient_for(&self, _quote: &Quote) -> Recipient {
        self.recipient.clone()
    }
}

/// Bank rail performing the instant fiat transfer.
#[async_trait]
pub trait PayoutGateway: Send + Sync {
    /// Get the gateway name.
    fn name(&self) -> &str;

    /// Send the fiat leg. Returns the rail-assigned transfer id.
    async fn send_payout(
        &self,
        amount: &Money,
        recipient_key: &str,
        recipient_name: &str,
    ) -> Result<PayoutId>;
}

/// Simulated instant-transfer rail with realistic latency and an
/// end-to-end id in the rail's format.
pub struct SimulatedBankGateway {
    latency: std::time::Duration,
}

impl SimulatedBankGateway {
    /// Create with the default simulated latency.
    pub fn new() -> Self {
        Self {
            latency: constants::bank_rail_latency().as_std(),
        }
    }

    /// Create with a custom latency.
    pub fn with_latency(latency: std::time::Duration) -> Self {
        Self { latency }
    }
}

impl Default for SimulatedBankGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PayoutGateway for SimulatedBankGateway {
    fn name(&self) -> &str {
        "simulated-bank"
    }

    async fn send_payout(
        &self,
        amount: &Money,
        recipient_key: &str,
        recipient_name: &str,
    ) -> Result<PayoutId> {
        info!(
            recipient = recipient_name,
            recipient_key,
            amount = %amount,
            "Initiating instant fiat transfer"
        );

        tokio::time::sleep(self.latency).await;

        let suffix: u32 = rand::thread_rng().gen_range(0..1000);
        let end_to_end_id = format!(
            "E{}R{:03}",
            chrono::Utc::now().timestamp_millis(),
            suffix
        );

        info!(payout_id = %end_to_end_id, "Fiat transfer sent");
        Ok(PayoutId::new(end_to_end_id))
    }
}

/// Recording gateway for tests: counts calls, optionally fails or delays.
#[cfg(any(test, feature = "test-utils"))]
pub struct RecordingPayoutGateway {
    payouts: parking_lot::Mutex<Vec<(Money, String)>>,
    delay: std::time::Duration,
    fail: std::sync::atomic::AtomicBool,
}

#[cfg(any(test, feature = "test-utils"))]
impl RecordingPayoutGateway {
    pub fn new() -> Self {
        Self {
            payouts: parking_lot::Mutex::new(Vec::new()),
            delay: std::time::Duration::ZERO,
            fail: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn with_delay(delay: std::time::Duration) -> Self {
        Self {
            delay,
            ..Self::new()
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn payout_count(&self) -> usize {
        self.payouts.lock().len()
    }

    pub fn payouts(&self) -> Vec<(Money, String)> {
        self.payouts.lock().clone()
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Default for RecordingPayoutGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl PayoutGateway for RecordingPayoutGateway {
    fn name(&self) -> &str {
        "recording-bank"
    }

    async fn send_payout(
        &self,
        amount: &Money,
        recipient_key: &str,
        _recipient_name: &str,
    ) -> Result<PayoutId> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(ramppay_common::RampError::PayoutFailed(
                "simulated rail outage".to_string(),
            ));
        }

        let mut payouts = self.payouts.lock();
        payouts.push((amount.clone(), recipient_key.to_string()));
        Ok(PayoutId::new(format!("E-TEST-{}", payouts.len())))
    }
}
