mod common;

use common::{checkout_request, test_app, MockProcessor, PAYMENT_URL};
use pse_checkout::database::repository::TransactionStore;
use pse_checkout::payments::{PaymentError, TransactionStatus};
use pse_checkout::services::payment_orchestrator::CheckoutError;
use std::sync::atomic::Ordering;

#[tokio::test]
async fn test_validation_failures_never_reach_the_processor() {
    let app = test_app(MockProcessor::default());

    let mut bad_email = checkout_request(50_000);
    bad_email.customer_email = "not-an-email".to_string();
    let mut bad_bank = checkout_request(50_000);
    bad_bank.bank_code = "1022".to_string();
    let mut bad_phone = checkout_request(50_000);
    bad_phone.customer_phone = "12".to_string();

    for request in [checkout_request(1_000), bad_email, bad_bank, bad_phone] {
        let err = app.orchestrator.initiate(request).await.unwrap_err();
        assert!(err.is_validation(), "expected validation error, got {:?}", err);
    }

    assert_eq!(app.processor.total_calls(), 0);
    assert!(app.store.is_empty().await);
}

#[tokio::test]
async fn test_acceptance_token_failure_persists_nothing() {
    let app = test_app(MockProcessor {
        fail_token: true,
        ..MockProcessor::default()
    });

    let err = app
        .orchestrator
        .initiate(checkout_request(50_000))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CheckoutError::Processor(PaymentError::UpstreamUnavailable { .. })
    ));
    assert_eq!(app.processor.create_calls.load(Ordering::SeqCst), 0);
    assert!(app.store.is_empty().await);
}

#[tokio::test]
async fn test_processor_rejection_persists_nothing() {
    let app = test_app(MockProcessor {
        fail_create: Some(PaymentError::ProcessorRejected {
            reason: "financial_institution_code: no válido".to_string(),
            provider_code: Some("422".to_string()),
        }),
        ..MockProcessor::default()
    });

    let err = app
        .orchestrator
        .initiate(checkout_request(50_000))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CheckoutError::Processor(PaymentError::ProcessorRejected { .. })
    ));
    assert!(app.store.is_empty().await);
}

#[tokio::test]
async fn test_payment_url_found_by_polling() {
    let app = test_app(MockProcessor {
        url_on_read: 3,
        ..MockProcessor::default()
    });

    let session = app
        .orchestrator
        .initiate(checkout_request(50_000))
        .await
        .unwrap();

    assert_eq!(session.payment_url, PAYMENT_URL);
    assert_eq!(app.processor.get_calls.load(Ordering::SeqCst), 3);
    let stored = app
        .store
        .find_by_reference(&session.reference)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, TransactionStatus::Pending);
    assert_eq!(stored.processor_transaction_id.as_deref(), Some("11-1"));
}

#[tokio::test]
async fn test_payment_url_never_appearing_persists_nothing() {
    let app = test_app(MockProcessor {
        url_on_read: 10,
        ..MockProcessor::default()
    });

    let err = app
        .orchestrator
        .initiate(checkout_request(50_000))
        .await
        .unwrap_err();

    match err {
        CheckoutError::Processor(PaymentError::PaymentUrlUnavailable {
            transaction_id,
            attempts,
            last_status,
        }) => {
            assert_eq!(transaction_id, "11-1");
            assert_eq!(attempts, 3);
            assert_eq!(last_status, Some(TransactionStatus::Pending));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(app.store.is_empty().await);
}

#[tokio::test]
async fn test_failed_read_back_names_the_processor_transaction() {
    let app = test_app(MockProcessor {
        url_on_read: 2,
        fail_get: Some(PaymentError::upstream("HTTP 503")),
        ..MockProcessor::default()
    });

    let err = app
        .orchestrator
        .initiate(checkout_request(50_000))
        .await
        .unwrap_err();

    match err {
        CheckoutError::PaymentUrlLookup {
            transaction_id,
            status,
            source,
        } => {
            assert_eq!(transaction_id, "11-1");
            assert_eq!(status, TransactionStatus::Pending);
            assert!(matches!(source, PaymentError::UpstreamUnavailable { .. }));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(app.processor.get_calls.load(Ordering::SeqCst), 1);
    assert!(app.store.is_empty().await);
}

#[tokio::test]
async fn test_repeated_checkouts_are_independent() {
    let app = test_app(MockProcessor::default());

    let first = app
        .orchestrator
        .initiate(checkout_request(50_000))
        .await
        .unwrap();
    let second = app
        .orchestrator
        .initiate(checkout_request(50_000))
        .await
        .unwrap();

    assert_ne!(first.reference, second.reference);
    assert_ne!(
        first.processor_transaction_id,
        second.processor_transaction_id
    );
    assert_eq!(app.store.len().await, 2);
    assert_eq!(app.processor.create_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_processor_request_carries_checkout_data() {
    let app = test_app(MockProcessor::default());

    let session = app
        .orchestrator
        .initiate(checkout_request(50_000))
        .await
        .unwrap();

    let created = app.processor.created.lock().unwrap();
    assert_eq!(created.len(), 1);
    let request = &created[0];
    assert_eq!(request.reference, session.reference);
    assert_eq!(request.amount_in_cents, 50_000);
    assert_eq!(request.currency, "COP");
    assert_eq!(request.acceptance_token, "acceptance_token_123");
    assert_eq!(request.payment_method.financial_institution_code, "1");
    assert_eq!(request.payment_method.user_legal_id_type, "CC");
}
