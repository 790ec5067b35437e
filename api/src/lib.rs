//! RampPay HTTP API
//!
//! Thin axum layer over the quote engine and settlement coordinator.

pub mod routes;

pub use routes::{build_router, AppState};
