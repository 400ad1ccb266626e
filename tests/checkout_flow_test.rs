mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{checkout_body, sign, status_event, test_app, MockProcessor, PAYMENT_URL};
use pse_checkout::database::repository::TransactionStore;
use pse_checkout::payments::TransactionStatus;
use serde_json::Value;
use tower::ServiceExt;

async fn send(router: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

fn post_webhook(body: Vec<u8>, signature: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json")
        .header("x-integrity", signature)
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_checkout_then_signed_webhook_approves() {
    let app = test_app(MockProcessor::default());

    let (status, session) = send(&app.router, post_json("/pago/pse", &checkout_body(50_000))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["payment_url"], PAYMENT_URL);
    assert_eq!(session["status"], "PENDING");
    let reference = session["reference"].as_str().unwrap().to_string();

    let stored = app.store.find_by_reference(&reference).await.unwrap().unwrap();
    assert_eq!(stored.status, TransactionStatus::Pending);
    assert_eq!(stored.attempts, 1);

    let body = status_event(&reference, "APPROVED");
    let signature = sign(&body);
    let (status, ack) = send(&app.router, post_webhook(body, &signature)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["status"], "ok");

    let stored = app.store.find_by_reference(&reference).await.unwrap().unwrap();
    assert_eq!(stored.status, TransactionStatus::Approved);
    assert!(stored.updated_by_webhook);
    assert_eq!(stored.cus.as_deref(), Some("CUS-99"));

    let (status, view) = send(&app.router, get(&format!("/pago/{}", reference))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["status"], "APPROVED");
    assert_eq!(view["customer_email"], "c*****e@example.com");
}

#[tokio::test]
async fn test_webhook_with_bad_signature_leaves_transaction_pending() {
    let app = test_app(MockProcessor::default());

    let (_, session) = send(&app.router, post_json("/pago/pse", &checkout_body(50_000))).await;
    let reference = session["reference"].as_str().unwrap().to_string();

    let body = status_event(&reference, "APPROVED");
    let forged = "0".repeat(64);
    let (status, _) = send(&app.router, post_webhook(body, &forged)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let stored = app.store.find_by_reference(&reference).await.unwrap().unwrap();
    assert_eq!(stored.status, TransactionStatus::Pending);
    assert!(!stored.updated_by_webhook);
}

#[tokio::test]
async fn test_amount_below_minimum_is_rejected_without_side_effects() {
    let app = test_app(MockProcessor::default());

    let (status, error) = send(&app.router, post_json("/pago/pse", &checkout_body(1_000))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["error"], "VALIDATION_ERROR");
    assert_eq!(error["details"]["field"], "amount_in_cents");

    assert!(app.store.is_empty().await);
    assert_eq!(app.processor.total_calls(), 0);
}

#[tokio::test]
async fn test_malformed_checkout_body_is_a_validation_error() {
    let app = test_app(MockProcessor::default());

    let request = Request::builder()
        .method("POST")
        .uri("/pago/pse")
        .header("content-type", "application/json")
        .body(Body::from("{\"amount_in_cents\": \"lots\"}"))
        .unwrap();
    let (status, error) = send(&app.router, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["error"], "VALIDATION_ERROR");
    assert_eq!(app.processor.total_calls(), 0);
}

#[tokio::test]
async fn test_unknown_reference_is_not_found() {
    let app = test_app(MockProcessor::default());

    let (status, error) = send(&app.router, get("/pago/PAGO_missing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["error"], "TRANSACTION_NOT_FOUND");
}

#[tokio::test]
async fn test_recent_payments_are_newest_first_and_masked() {
    let app = test_app(MockProcessor::default());

    let mut references = Vec::new();
    for _ in 0..3 {
        let (_, session) = send(&app.router, post_json("/pago/pse", &checkout_body(50_000))).await;
        references.push(session["reference"].as_str().unwrap().to_string());
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }

    let (status, recent) = send(&app.router, get("/pago/recientes?limit=2")).await;
    assert_eq!(status, StatusCode::OK);
    let recent = recent.as_array().unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0]["reference"], references[2].as_str());
    assert_eq!(recent[1]["reference"], references[1].as_str());
    assert_eq!(recent[0]["email"], "c*****e@example.com");
}

#[tokio::test]
async fn test_sandbox_bank_list() {
    let app = test_app(MockProcessor::default());

    let (status, banks) = send(&app.router, get("/pago/bancos")).await;
    assert_eq!(status, StatusCode::OK);
    let banks = banks.as_array().unwrap();
    assert_eq!(banks.len(), 2);
    assert_eq!(banks[0]["codigo"], "1");
    assert_eq!(banks[0]["nombre"], "Banco que aprueba (Sandbox PSE)");
    assert_eq!(banks[1]["nombre"], "Banco que rechaza (Sandbox PSE)");
}

#[tokio::test]
async fn test_health_and_request_id() {
    let app = test_app(MockProcessor::default());

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "req-abc")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-request-id"], "req-abc");

    let (status, live) = send(&app.router, get("/health/live")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(live["status"], "alive");
}
