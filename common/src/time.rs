//! Time utilities and service constants.

use chrono::{DateTime, Duration, Utc};

/// Service timing constants.
pub mod constants {
    use super::Duration;

    /// Quote time-to-live (10 minutes).
    pub fn quote_ttl() -> Duration {
        Duration::minutes(10)
    }

    /// Bounded timeout for rate oracle and risk scorer calls (2 seconds).
    pub fn upstream_timeout() -> Duration {
        Duration::seconds(2)
    }

    /// Simulated bank rail latency (500 milliseconds).
    pub fn bank_rail_latency() -> Duration {
        Duration::milliseconds(500)
    }
}

/// A timestamp with timezone (always UTC for RampPay).
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Check if a timestamp has expired (is in the past).
pub fn is_expired(expiry: Timestamp) -> bool {
    now() > expiry
}

/// Calculate expiry time from now.
pub fn expires_in(duration: Duration) -> Timestamp {
    now() + duration
}

/// Duration extensions for convenient conversion.
pub trait DurationExt {
    fn as_std(&self) -> std::time::Duration;
}

impl DurationExt for Duration {
    fn as_std(&self) -> std::time::Duration {
        self.to_std().unwrap_or(std::time::Duration::ZERO)
    }
}
