//! HTTP routes and handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use ramppay_common::{
    ChainEvent, CryptoAsset, Quote, QuoteId, RampError, SettlementResult, TxHash,
};
use ramppay_settlement::{QuoteEngine, SettlementCoordinator, SharedMetrics};

/// Shared application state.
pub struct AppState {
    pub engine: Arc<QuoteEngine>,
    pub coordinator: Arc<SettlementCoordinator>,
    pub metrics: SharedMetrics,
}

/// Build the service router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/payment/quote", post(create_quote))
        .route("/payment/quote/:id", get(get_quote))
        .route("/payment/webhook", post(chain_event))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Error envelope returned to API clients.
struct ApiError(RampError);

impl From<RampError> for ApiError {
    fn from(err: RampError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            RampError::Validation { .. } | RampError::RiskTooHigh { .. } => {
                StatusCode::BAD_REQUEST
            }
            RampError::QuoteNotFound(_) => StatusCode::NOT_FOUND,
            RampError::QuoteExpired(_) => StatusCode::GONE,
            RampError::AlreadySettled(_) | RampError::AmbiguousMatch { .. } => {
                StatusCode::CONFLICT
            }
            RampError::NoMatchingQuote { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            RampError::UpstreamUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            RampError::PayoutFailed(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            warn!(code = self.0.error_code(), error = %self.0, "Request failed");
        }

        let body = json!({
            "error": self.0.to_string(),
            "code": self.0.error_code(),
        });
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct CreateQuoteRequest {
    /// Fiat amount the user wants to receive.
    amount: Decimal,
    /// Asset the user will deposit.
    currency: CryptoAsset,
}

/// Deposit confirmation payload as the chain watcher posts it.
#[derive(Debug, Deserialize)]
struct WebhookRequest {
    hash: String,
    from: String,
    to: String,
    value: Decimal,
    asset: CryptoAsset,
}

impl From<WebhookRequest> for ChainEvent {
    fn from(req: WebhookRequest) -> Self {
        ChainEvent {
            tx_hash: TxHash::new(req.hash),
            from_address: req.from,
            to_address: req.to,
            amount: req.value,
            asset: req.asset,
        }
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "ramppay",
    }))
}

async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.to_prometheus(),
    )
        .into_response()
}

async fn create_quote(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateQuoteRequest>,
) -> Result<Json<Quote>, ApiError> {
    let quote = state.engine.create_quote(req.amount, req.currency).await?;
    Ok(Json(quote))
}

async fn get_quote(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Quote>, ApiError> {
    let id = QuoteId::parse(&id)
        .map_err(|_| RampError::validation_field("invalid quote id", "id"))?;
    let quote = state.engine.get_quote(&id).await?;
    Ok(Json(quote))
}

async fn chain_event(
    State(state): State<Arc<AppState>>,
    Json(req): Json<WebhookRequest>,
) -> Result<Json<SettlementResult>, ApiError> {
    let event = ChainEvent::from(req);
    let result = state.coordinator.handle_chain_event(&event).await?;
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use ramppay_common::{AssetPair, Currency};
    use ramppay_pricing::{SimulatedRateOracle, SimulatedRiskScorer, SpreadConfig};
    use ramppay_settlement::audit::RecordingAuditLog;
    use ramppay_settlement::liquidation::RecordingLiquidation;
    use ramppay_settlement::payout::RecordingPayoutGateway;
    use ramppay_settlement::{
        InMemoryQuoteStore, MatchConfig, Metrics, QuoteConfig, StaticRecipientDirectory,
    };
    use rust_decimal_macros::dec;
    use tower::ServiceExt;

    fn test_router() -> Router {
        let oracle = Arc::new(SimulatedRateOracle::new("test"));
        oracle.set_rate(
            AssetPair::new(CryptoAsset::Usdc, Currency::brl()),
            dec!(5.0),
        );
        let scorer = Arc::new(SimulatedRiskScorer::new("test"));
        scorer.set_score(CryptoAsset::Usdc, dec!(0.2));
        scorer.set_score(CryptoAsset::Eth, dec!(0.95));

        let store = Arc::new(InMemoryQuoteStore::new());
        let audit = Arc::new(RecordingAuditLog::new());
        let metrics: SharedMetrics = Arc::new(Metrics::new());

        let engine = Arc::new(QuoteEngine::new(
            store.clone(),
            oracle,
            scorer,
            audit.clone(),
            metrics.clone(),
            QuoteConfig::default(),
            SpreadConfig::default(),
        ));
        let coordinator = Arc::new(SettlementCoordinator::new(
            store,
            Arc::new(RecordingPayoutGateway::new()),
            audit,
            Arc::new(RecordingLiquidation::new()),
            Arc::new(StaticRecipientDirectory::demo()),
            metrics.clone(),
            MatchConfig::default(),
        ));

        build_router(Arc::new(AppState {
            engine,
            coordinator,
            metrics,
        }))
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = test_router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_create_and_get_quote() {
        let app = test_router();

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/payment/quote",
                json!({"amount": "500", "currency": "USDC"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let quote = body_json(response).await;
        let crypto_amount: Decimal = quote["cryptoAmount"].as_str().unwrap().parse().unwrap();
        assert_eq!(crypto_amount, dec!(102.0));
        assert_eq!(quote["status"], "ACTIVE");
        assert_eq!(
            quote["depositAddress"],
            "0x742d35Cc6634C0532925a3b844Bc454e4438f44e"
        );

        let id = quote["id"].as_str().unwrap();
        let response = app
            .oneshot(
                Request::get(format!("/payment/quote/{}", id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let fetched = body_json(response).await;
        assert_eq!(fetched["id"], id);
    }

    #[tokio::test]
    async fn test_risk_rejection_is_bad_request() {
        let response = test_router()
            .oneshot(json_request(
                "POST",
                "/payment/quote",
                json!({"amount": "500", "currency": "ETH"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["code"], "RISK_TOO_HIGH");
    }

    #[tokio::test]
    async fn test_negative_amount_is_bad_request() {
        let response = test_router()
            .oneshot(json_request(
                "POST",
                "/payment/quote",
                json!({"amount": "-10", "currency": "USDC"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["code"], "VALIDATION_FAILED");
    }

    #[tokio::test]
    async fn test_unknown_quote_is_not_found() {
        let response = test_router()
            .oneshot(
                Request::get("/payment/quote/019456ab-1234-7def-8901-234567890abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["code"], "QUOTE_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_malformed_quote_id_is_bad_request() {
        let response = test_router()
            .oneshot(
                Request::get("/payment/quote/not-a-uuid")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_webhook_settles_quote() {
        let app = test_router();

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/payment/quote",
                json!({"amount": "500", "currency": "USDC"}),
            ))
            .await
            .unwrap();
        let quote = body_json(response).await;
        let quote_id = quote["id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/payment/webhook",
                json!({
                    "hash": "0xabc123",
                    "from": "0xsender",
                    "to": "0x742d35Cc6634C0532925a3b844Bc454e4438f44e",
                    "value": "102.0",
                    "asset": "USDC",
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let result = body_json(response).await;
        assert_eq!(result["status"], "SETTLED");
        assert_eq!(result["quoteId"], quote_id);
        assert!(result["payoutId"].as_str().unwrap().starts_with('E'));

        // The quote now reads Settled.
        let response = app
            .oneshot(
                Request::get(format!("/payment/quote/{}", quote_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let fetched = body_json(response).await;
        assert_eq!(fetched["status"], "SETTLED");
    }

    #[tokio::test]
    async fn test_unmatched_webhook_is_unprocessable() {
        let response = test_router()
            .oneshot(json_request(
                "POST",
                "/payment/webhook",
                json!({
                    "hash": "0xabc123",
                    "from": "0xsender",
                    "to": "0x742d35Cc6634C0532925a3b844Bc454e4438f44e",
                    "value": "999.0",
                    "asset": "USDC",
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["code"], "NO_MATCHING_QUOTE");
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let app = test_router();

        app.clone()
            .oneshot(json_request(
                "POST",
                "/payment/quote",
                json!({"amount": "500", "currency": "USDC"}),
            ))
            .await
            .unwrap();

        let response = app
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("ramppay_quotes_created 1"));
    }
}
