//! Service configuration.

use chrono::Duration;
use ramppay_common::{constants, Currency};
use ramppay_pricing::SpreadConfig;
use rust_decimal::Decimal;

/// Treasury wallet receiving the crypto leg.
pub const TREASURY_DEPOSIT_ADDRESS: &str = "0x742d35Cc6634C0532925a3b844Bc454e4438f44e";

/// Quote engine configuration.
#[derive(Debug, Clone)]
pub struct QuoteConfig {
    /// Quote time-to-live.
    pub ttl: Duration,
    /// Bounded timeout for oracle and scorer calls.
    pub upstream_timeout: Duration,
    /// Risk score above which quoting is paused for the asset.
    pub risk_threshold: Decimal,
    /// Fiat currency of the payout leg.
    pub fiat_currency: Currency,
    /// Deposit address for the crypto leg.
    pub deposit_address: String,
}

impl Default for QuoteConfig {
    fn default() -> Self {
        Self {
            ttl: constants::quote_ttl(),
            upstream_timeout: constants::upstream_timeout(),
            risk_threshold: Decimal::new(9, 1), // 0.9
            fiat_currency: Currency::brl(),
            deposit_address: TREASURY_DEPOSIT_ADDRESS.to_string(),
        }
    }
}

/// Settlement matching configuration.
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Relative tolerance between the deposited amount and the quoted
    /// crypto amount, to absorb rounding (0.5%).
    pub amount_tolerance: Decimal,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            amount_tolerance: Decimal::new(5, 3), // 0.005
        }
    }
}

/// Top-level service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Listen address.
    pub listen_addr: String,
    /// Listen port.
    pub listen_port: u16,
    /// Quote engine configuration.
    pub quote: QuoteConfig,
    /// Matching configuration.
    pub matching: MatchConfig,
    /// Spread parameters.
    pub spread: SpreadConfig,
    /// Log level.
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".to_string(),
            listen_port: 3000,
            quote: QuoteConfig::default(),
            matching: MatchConfig::default(),
            spread: SpreadConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("RAMPPAY_LISTEN_ADDR") {
            config.listen_addr = addr;
        }

        if let Ok(port) = std::env::var("RAMPPAY_LISTEN_PORT") {
            if let Ok(port) = port.parse() {
                config.listen_port = port;
            }
        }

        if let Ok(fiat) = std::env::var("RAMPPAY_FIAT_CURRENCY") {
            config.quote.fiat_currency = Currency::new(fiat);
        }

        if let Ok(address) = std::env::var("RAMPPAY_TREASURY_ADDRESS") {
            config.quote.deposit_address = address;
        }

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.log_level = level;
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.listen_port == 0 {
            return Err("Listen port cannot be 0".to_string());
        }

        if self.quote.deposit_address.is_empty() {
            return Err("Deposit address cannot be empty".to_string());
        }

        if self.quote.ttl <= Duration::zero() {
            return Err("Quote TTL must be positive".to_string());
        }

        if self.quote.risk_threshold <= Decimal::ZERO || self.quote.risk_threshold > Decimal::ONE {
            return Err("Risk threshold must be in (0, 1]".to_string());
        }

        if self.matching.amount_tolerance < Decimal::ZERO
            || self.matching.amount_tolerance >= Decimal::ONE
        {
            return Err("Amount tolerance must be in [0, 1)".to_string());
        }

        if self.spread.base_fee < Decimal::ZERO || self.spread.risk_premium_factor < Decimal::ZERO {
            return Err("Spread parameters cannot be negative".to_string());
        }

        Ok(())
    }
}
