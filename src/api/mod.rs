pub mod checkout;
pub mod health;
pub mod status;
pub mod webhooks;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};

use crate::health::HealthChecker;
use crate::middleware::logging::{request_logging_middleware, UuidRequestId};
use crate::services::payment_orchestrator::PaymentOrchestrator;
use crate::services::transaction_status::TransactionStatusService;
use crate::services::webhook_processor::WebhookProcessor;

/// Shared state for every route
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<PaymentOrchestrator>,
    pub webhooks: Arc<WebhookProcessor>,
    pub status: Arc<TransactionStatusService>,
    pub health: HealthChecker,
}

/// Routes without middleware.
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::live))
        .route("/pago/pse", post(checkout::create_pse_payment))
        .route("/pago/bancos", get(checkout::list_banks))
        .route("/pago/recientes", get(status::list_recent_payments))
        .route("/pago/{reference}", get(status::get_payment_status))
        // Takes the raw body; nothing in front of it may consume or parse it.
        .route("/webhook", post(webhooks::handle_webhook))
        .with_state(state)
}

/// Full application with request id and request logging layers.
pub fn app(state: AppState) -> Router {
    routes(state).layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
            .layer(axum::middleware::from_fn(request_logging_middleware))
            .layer(PropagateRequestIdLayer::x_request_id()),
    )
}
