//! RampPay service binary.
//!
//! Wires the simulated collaborators to the quote engine and settlement
//! coordinator and serves the HTTP API.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ramppay_api::{build_router, AppState};
use ramppay_pricing::{SimulatedRateOracle, SimulatedRiskScorer};
use ramppay_settlement::{
    InMemoryQuoteStore, Metrics, QuoteEngine, ServiceConfig, SettlementCoordinator,
    SharedMetrics, SimulatedBankGateway, SimulatedExchange, StaticRecipientDirectory,
    TracingAuditLog,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServiceConfig::from_env();
    config
        .validate()
        .map_err(|e| anyhow::anyhow!(e))
        .context("Invalid configuration")?;

    init_tracing(&config.log_level);

    info!(
        listen_addr = %config.listen_addr,
        listen_port = config.listen_port,
        fiat = %config.quote.fiat_currency,
        deposit_address = %config.quote.deposit_address,
        "Starting RampPay service"
    );

    let metrics: SharedMetrics = Arc::new(Metrics::new());
    let store = Arc::new(InMemoryQuoteStore::new());
    let audit = Arc::new(TracingAuditLog);

    let engine = Arc::new(QuoteEngine::new(
        store.clone(),
        Arc::new(SimulatedRateOracle::with_demo_rates(
            config.quote.fiat_currency.clone(),
        )),
        Arc::new(SimulatedRiskScorer::randomized()),
        audit.clone(),
        metrics.clone(),
        config.quote.clone(),
        config.spread.clone(),
    ));

    let coordinator = Arc::new(SettlementCoordinator::new(
        store,
        Arc::new(SimulatedBankGateway::new()),
        audit,
        Arc::new(SimulatedExchange),
        Arc::new(StaticRecipientDirectory::demo()),
        metrics.clone(),
        config.matching.clone(),
    ));

    let app = build_router(Arc::new(AppState {
        engine,
        coordinator,
        metrics,
    }));

    let addr = format!("{}:{}", config.listen_addr, config.listen_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!(addr = %addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}
