mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{checkout_request, sign, status_event, test_app, MockProcessor, SECRET};
use pse_checkout::api::{self, AppState};
use pse_checkout::database::error::{DatabaseError, DatabaseErrorKind};
use pse_checkout::database::repository::TransactionStore;
use pse_checkout::database::transaction::{
    NewTransaction, StatusChange, StatusUpdate, Transaction,
};
use pse_checkout::health::HealthChecker;
use pse_checkout::payments::TransactionStatus;
use pse_checkout::services::payment_orchestrator::PaymentOrchestrator;
use pse_checkout::services::transaction_status::TransactionStatusService;
use pse_checkout::services::webhook_processor::WebhookProcessor;
use std::sync::Arc;
use tower::ServiceExt;

/// Store whose backing database is unreachable.
struct UnreachableStore;

fn connection_refused() -> DatabaseError {
    DatabaseError::new(DatabaseErrorKind::ConnectionError {
        message: "connection refused".to_string(),
    })
}

#[async_trait]
impl TransactionStore for UnreachableStore {
    async fn create(&self, _transaction: NewTransaction) -> Result<Transaction, DatabaseError> {
        Err(connection_refused())
    }
    async fn find_by_reference(
        &self,
        _reference: &str,
    ) -> Result<Option<Transaction>, DatabaseError> {
        Err(connection_refused())
    }
    async fn update_status(
        &self,
        _reference: &str,
        _change: StatusChange,
    ) -> Result<Option<StatusUpdate>, DatabaseError> {
        Err(connection_refused())
    }
    async fn list_recent(&self, _limit: usize) -> Result<Vec<Transaction>, DatabaseError> {
        Err(connection_refused())
    }
    async fn list_pending(
        &self,
        _created_before: DateTime<Utc>,
        _limit: usize,
    ) -> Result<Vec<Transaction>, DatabaseError> {
        Err(connection_refused())
    }
    async fn ping(&self) -> Result<(), DatabaseError> {
        Err(connection_refused())
    }
}

fn webhook(body: Vec<u8>, signature: Option<String>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json");
    if let Some(signature) = signature {
        builder = builder.header("x-integrity", signature);
    }
    builder.body(Body::from(body)).unwrap()
}

async fn deliver(app: &common::TestApp, body: Vec<u8>, signature: Option<String>) -> StatusCode {
    app.router
        .clone()
        .oneshot(webhook(body, signature))
        .await
        .unwrap()
        .status()
}

async fn pending_reference(app: &common::TestApp) -> String {
    app.orchestrator
        .initiate(checkout_request(50_000))
        .await
        .unwrap()
        .reference
}

#[tokio::test]
async fn test_declined_webhook_records_reason() {
    let app = test_app(MockProcessor::default());
    let reference = pending_reference(&app).await;

    let body = status_event(&reference, "DECLINED");
    let signature = sign(&body);
    assert_eq!(deliver(&app, body, Some(signature)).await, StatusCode::OK);

    let tx = app.store.find_by_reference(&reference).await.unwrap().unwrap();
    assert_eq!(tx.status, TransactionStatus::Declined);
    assert_eq!(tx.reject_reason.as_deref(), Some("Transacción rechazada"));
}

#[tokio::test]
async fn test_missing_signature_is_unauthorized() {
    let app = test_app(MockProcessor::default());
    let reference = pending_reference(&app).await;

    let status = deliver(&app, status_event(&reference, "APPROVED"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let tx = app.store.find_by_reference(&reference).await.unwrap().unwrap();
    assert_eq!(tx.status, TransactionStatus::Pending);
}

#[tokio::test]
async fn test_signature_over_different_bytes_is_rejected() {
    let app = test_app(MockProcessor::default());
    let reference = pending_reference(&app).await;

    // Same JSON, different whitespace: the signature covers raw bytes.
    let signed = status_event(&reference, "APPROVED");
    let signature = sign(&signed);
    let reformatted = serde_json::to_vec_pretty(
        &serde_json::from_slice::<serde_json::Value>(&signed).unwrap(),
    )
    .unwrap();

    let status = deliver(&app, reformatted, Some(signature)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_redelivery_is_idempotent() {
    let app = test_app(MockProcessor::default());
    let reference = pending_reference(&app).await;

    let body = status_event(&reference, "APPROVED");
    let signature = sign(&body);
    assert_eq!(
        deliver(&app, body.clone(), Some(signature.clone())).await,
        StatusCode::OK
    );
    let first = app.store.find_by_reference(&reference).await.unwrap().unwrap();

    assert_eq!(deliver(&app, body, Some(signature)).await, StatusCode::OK);
    let second = app.store.find_by_reference(&reference).await.unwrap().unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_terminal_status_survives_conflicting_webhook() {
    let app = test_app(MockProcessor::default());
    let reference = pending_reference(&app).await;

    let approved = status_event(&reference, "APPROVED");
    let signature = sign(&approved);
    deliver(&app, approved, Some(signature)).await;

    let declined = status_event(&reference, "DECLINED");
    let signature = sign(&declined);
    assert_eq!(deliver(&app, declined, Some(signature)).await, StatusCode::OK);

    let tx = app.store.find_by_reference(&reference).await.unwrap().unwrap();
    assert_eq!(tx.status, TransactionStatus::Approved);
    assert_eq!(tx.reject_reason, None);
}

#[tokio::test]
async fn test_other_events_are_acknowledged_without_writes() {
    let app = test_app(MockProcessor::default());
    let reference = pending_reference(&app).await;

    let body = serde_json::to_vec(&serde_json::json!({
        "event": "nequi_token.updated",
        "data": { "transaction": { "reference": reference, "status": "APPROVED" } }
    }))
    .unwrap();
    let signature = sign(&body);
    assert_eq!(deliver(&app, body, Some(signature)).await, StatusCode::OK);

    let tx = app.store.find_by_reference(&reference).await.unwrap().unwrap();
    assert_eq!(tx.status, TransactionStatus::Pending);
}

#[tokio::test]
async fn test_signed_payload_missing_fields_is_bad_request() {
    let app = test_app(MockProcessor::default());

    let body = br#"{"event":"transaction.updated","data":{"transaction":{"status":"APPROVED"}}}"#
        .to_vec();
    let signature = sign(&body);
    assert_eq!(
        deliver(&app, body, Some(signature)).await,
        StatusCode::BAD_REQUEST
    );

    let body = b"not json".to_vec();
    let signature = sign(&body);
    assert_eq!(
        deliver(&app, body, Some(signature)).await,
        StatusCode::BAD_REQUEST
    );
}

#[tokio::test]
async fn test_unknown_reference_is_acknowledged() {
    let app = test_app(MockProcessor::default());

    let body = status_event("PAGO_0_deadbeef", "APPROVED");
    let signature = sign(&body);
    assert_eq!(deliver(&app, body, Some(signature)).await, StatusCode::OK);
    assert!(app.store.is_empty().await);
}

#[tokio::test]
async fn test_store_failure_asks_processor_to_redeliver() {
    let store: Arc<dyn TransactionStore> = Arc::new(UnreachableStore);
    let router = api::app(AppState {
        orchestrator: Arc::new(PaymentOrchestrator::new(
            Arc::new(MockProcessor::default()),
            store.clone(),
            common::orchestrator_config(),
        )),
        webhooks: Arc::new(WebhookProcessor::new(store.clone(), SECRET)),
        status: Arc::new(TransactionStatusService::new(store.clone())),
        health: HealthChecker::new(store),
    });

    let body = status_event("PAGO_1", "APPROVED");
    let signature = sign(&body);
    let response = router
        .oneshot(webhook(body, Some(signature)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
