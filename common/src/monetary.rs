//! Monetary types for the RampPay service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Sub};
use std::str::FromStr;

/// A fiat monetary amount with currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// The amount value (high precision decimal).
    pub value: Decimal,
    /// ISO 4217 currency code.
    pub currency: Currency,
}

impl Money {
    /// Create a new Money instance.
    pub fn new(value: Decimal, currency: Currency) -> Self {
        Self { value, currency }
    }

    /// Create a zero amount in the given currency.
    pub fn zero(currency: Currency) -> Self {
        Self {
            value: Decimal::ZERO,
            currency,
        }
    }

    /// Check if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.value > Decimal::ZERO
    }

    /// Check if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    /// Round to the currency's standard decimal places.
    pub fn round(&self) -> Self {
        let places = self.currency.decimal_places();
        Self {
            value: self.value.round_dp(places),
            currency: self.currency.clone(),
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.currency)
    }
}

impl Add for Money {
    type Output = Result<Money, CurrencyMismatchError>;

    fn add(self, other: Money) -> Self::Output {
        if self.currency != other.currency {
            return Err(CurrencyMismatchError {
                expected: self.currency,
                actual: other.currency,
            });
        }
        Ok(Money {
            value: self.value + other.value,
            currency: self.currency,
        })
    }
}

impl Sub for Money {
    type Output = Result<Money, CurrencyMismatchError>;

    fn sub(self, other: Money) -> Self::Output {
        if self.currency != other.currency {
            return Err(CurrencyMismatchError {
                expected: self.currency,
                actual: other.currency,
            });
        }
        Ok(Money {
            value: self.value - other.value,
            currency: self.currency,
        })
    }
}

impl Mul<Decimal> for Money {
    type Output = Money;

    fn mul(self, factor: Decimal) -> Self::Output {
        Money {
            value: self.value * factor,
            currency: self.currency,
        }
    }
}

/// Error when attempting operations on different currencies.
#[derive(Debug, Clone)]
pub struct CurrencyMismatchError {
    pub expected: Currency,
    pub actual: Currency,
}

impl fmt::Display for CurrencyMismatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Currency mismatch: expected {}, got {}",
            self.expected, self.actual
        )
    }
}

impl std::error::Error for CurrencyMismatchError {}

/// ISO 4217 fiat currency code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Currency(String);

impl Currency {
    /// Create a new currency from code.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().to_uppercase())
    }

    /// Get the currency code.
    pub fn code(&self) -> &str {
        &self.0
    }

    /// Get the standard decimal places for this currency.
    pub fn decimal_places(&self) -> u32 {
        match self.0.as_str() {
            "JPY" | "KRW" | "VND" => 0,
            "BHD" | "KWD" | "OMR" => 3,
            _ => 2,
        }
    }

    /// Common currencies
    pub fn brl() -> Self {
        Self::new("BRL")
    }

    pub fn usd() -> Self {
        Self::new("USD")
    }

    pub fn eur() -> Self {
        Self::new("EUR")
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Currency {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A crypto asset accepted on the deposit leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CryptoAsset {
    Eth,
    Usdc,
    Btc,
}

impl CryptoAsset {
    /// Ticker symbol for the asset.
    pub fn ticker(&self) -> &'static str {
        match self {
            CryptoAsset::Eth => "ETH",
            CryptoAsset::Usdc => "USDC",
            CryptoAsset::Btc => "BTC",
        }
    }

    /// All supported assets.
    pub fn all() -> &'static [CryptoAsset] {
        &[CryptoAsset::Eth, CryptoAsset::Usdc, CryptoAsset::Btc]
    }
}

impl fmt::Display for CryptoAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ticker())
    }
}

impl FromStr for CryptoAsset {
    type Err = UnsupportedAssetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ETH" => Ok(CryptoAsset::Eth),
            "USDC" => Ok(CryptoAsset::Usdc),
            "BTC" => Ok(CryptoAsset::Btc),
            other => Err(UnsupportedAssetError(other.to_string())),
        }
    }
}

/// Error for asset tickers outside the supported set.
#[derive(Debug, Clone)]
pub struct UnsupportedAssetError(pub String);

impl fmt::Display for UnsupportedAssetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unsupported crypto asset: {}", self.0)
    }
}

impl std::error::Error for UnsupportedAssetError {}

/// A crypto/fiat pair priced as fiat per unit of the asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetPair {
    /// The crypto asset being priced.
    pub asset: CryptoAsset,
    /// The fiat pricing currency.
    pub fiat: Currency,
}

impl AssetPair {
    /// Create a new asset pair.
    pub fn new(asset: CryptoAsset, fiat: Currency) -> Self {
        Self { asset, fiat }
    }
}

impl fmt::Display for AssetPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.asset, self.fiat)
    }
}

/// An exchange rate sample for an asset pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeRate {
    /// The asset pair.
    pub pair: AssetPair,
    /// Fiat units per one unit of the asset.
    pub fiat_per_unit: Decimal,
    /// When this rate was sampled.
    pub quoted_at: DateTime<Utc>,
    /// Rate source.
    pub source: String,
}

impl ExchangeRate {
    /// Create a new exchange rate sampled now.
    pub fn new(pair: AssetPair, fiat_per_unit: Decimal, source: impl Into<String>) -> Self {
        Self {
            pair,
            fiat_per_unit,
            quoted_at: Utc::now(),
            source: source.into(),
        }
    }

    /// Check the rate is usable for pricing.
    pub fn is_positive(&self) -> bool {
        self.fiat_per_unit > Decimal::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_operations() {
        let m1 = Money::new(dec!(100.00), Currency::brl());
        let m2 = Money::new(dec!(50.00), Currency::brl());

        let sum = (m1.clone() + m2.clone()).unwrap();
        assert_eq!(sum.value, dec!(150.00));

        let diff = (m1 - m2).unwrap();
        assert_eq!(diff.value, dec!(50.00));
    }

    #[test]
    fn test_currency_mismatch() {
        let m1 = Money::new(dec!(100.00), Currency::brl());
        let m2 = Money::new(dec!(100.00), Currency::usd());

        assert!((m1 + m2).is_err());
    }

    #[test]
    fn test_money_rounding() {
        let m = Money::new(dec!(10.005), Currency::brl());
        assert_eq!(m.round().value, dec!(10.01));
    }

    #[test]
    fn test_asset_parsing() {
        assert_eq!("eth".parse::<CryptoAsset>().unwrap(), CryptoAsset::Eth);
        assert_eq!("USDC".parse::<CryptoAsset>().unwrap(), CryptoAsset::Usdc);
        assert!("DOGE".parse::<CryptoAsset>().is_err());
    }

    #[test]
    fn test_asset_serde_uppercase() {
        let json = serde_json::to_string(&CryptoAsset::Usdc).unwrap();
        assert_eq!(json, "\"USDC\"");
        let back: CryptoAsset = serde_json::from_str("\"ETH\"").unwrap();
        assert_eq!(back, CryptoAsset::Eth);
    }

    #[test]
    fn test_pair_display() {
        let pair = AssetPair::new(CryptoAsset::Eth, Currency::brl());
        assert_eq!(pair.to_string(), "ETH/BRL");
    }

    #[test]
    fn test_exchange_rate_positive() {
        let pair = AssetPair::new(CryptoAsset::Usdc, Currency::brl());
        let rate = ExchangeRate::new(pair.clone(), dec!(5.0), "TEST");
        assert!(rate.is_positive());

        let zero = ExchangeRate::new(pair, Decimal::ZERO, "TEST");
        assert!(!zero.is_positive());
    }
}
