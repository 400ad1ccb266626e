#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use pse_checkout::api::{self, AppState};
use pse_checkout::database::memory::InMemoryTransactionStore;
use pse_checkout::health::HealthChecker;
use pse_checkout::payments::signature::sign_body;
use pse_checkout::payments::{
    AcceptanceToken, CreateTransactionRequest, FinancialInstitution, PaymentError,
    PaymentProcessor, PaymentResult, PollPolicy, ProcessorTransaction, TransactionStatus,
};
use pse_checkout::services::payment_orchestrator::{
    CheckoutRequest, OrchestratorConfig, PaymentOrchestrator,
};
use pse_checkout::services::transaction_status::TransactionStatusService;
use pse_checkout::services::webhook_processor::WebhookProcessor;
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SECRET: &str = "test_integrity_secret";
pub const PAYMENT_URL: &str = "https://sandbox.pse.example/redirect?id=11-1";

/// Scripted processor that counts every call it receives.
pub struct MockProcessor {
    pub token_calls: AtomicU32,
    pub create_calls: AtomicU32,
    pub get_calls: AtomicU32,
    pub fail_token: bool,
    pub fail_create: Option<PaymentError>,
    pub fail_get: Option<PaymentError>,
    /// Read on which the URL appears; `0` means the create response has it.
    pub url_on_read: u32,
    pub created: Mutex<Vec<CreateTransactionRequest>>,
}

impl Default for MockProcessor {
    fn default() -> Self {
        Self {
            token_calls: AtomicU32::new(0),
            create_calls: AtomicU32::new(0),
            get_calls: AtomicU32::new(0),
            fail_token: false,
            fail_create: None,
            fail_get: None,
            url_on_read: 0,
            created: Mutex::new(Vec::new()),
        }
    }
}

impl MockProcessor {
    pub fn total_calls(&self) -> u32 {
        self.token_calls.load(Ordering::SeqCst)
            + self.create_calls.load(Ordering::SeqCst)
            + self.get_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentProcessor for MockProcessor {
    async fn get_acceptance_token(&self) -> PaymentResult<AcceptanceToken> {
        self.token_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_token {
            return Err(PaymentError::upstream("merchant lookup failed"));
        }
        Ok(AcceptanceToken {
            token: "acceptance_token_123".to_string(),
            contract_id: "1".to_string(),
            permalink: None,
        })
    }

    async fn create_transaction(
        &self,
        request: CreateTransactionRequest,
    ) -> PaymentResult<ProcessorTransaction> {
        let n = self.create_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(err) = &self.fail_create {
            return Err(err.clone());
        }
        let reference = request.reference.clone();
        self.created.lock().unwrap().push(request);
        Ok(ProcessorTransaction {
            id: format!("11-{}", n),
            reference: Some(reference),
            status: TransactionStatus::Pending,
            status_message: None,
            payment_url: (self.url_on_read == 0).then(|| PAYMENT_URL.to_string()),
        })
    }

    async fn get_transaction(&self, transaction_id: &str) -> PaymentResult<ProcessorTransaction> {
        let n = self.get_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(err) = &self.fail_get {
            return Err(err.clone());
        }
        let ready = self.url_on_read != 0 && n >= self.url_on_read;
        Ok(ProcessorTransaction {
            id: transaction_id.to_string(),
            reference: None,
            status: TransactionStatus::Pending,
            status_message: None,
            payment_url: ready.then(|| PAYMENT_URL.to_string()),
        })
    }

    async fn list_financial_institutions(&self) -> PaymentResult<Vec<FinancialInstitution>> {
        Ok(vec![])
    }

    fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(5),
            max_attempts: 3,
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryTransactionStore>,
    pub processor: Arc<MockProcessor>,
    pub orchestrator: Arc<PaymentOrchestrator>,
}

pub fn orchestrator_config() -> OrchestratorConfig {
    OrchestratorConfig {
        min_amount_in_cents: 1500,
        ..OrchestratorConfig::default()
    }
}

pub fn test_app(processor: MockProcessor) -> TestApp {
    let store = Arc::new(InMemoryTransactionStore::new());
    let processor = Arc::new(processor);
    let orchestrator = Arc::new(PaymentOrchestrator::new(
        processor.clone(),
        store.clone(),
        orchestrator_config(),
    ));

    let router = api::app(AppState {
        orchestrator: orchestrator.clone(),
        webhooks: Arc::new(WebhookProcessor::new(store.clone(), SECRET)),
        status: Arc::new(TransactionStatusService::new(store.clone())),
        health: HealthChecker::new(store.clone()),
    });

    TestApp {
        router,
        store,
        processor,
        orchestrator,
    }
}

pub fn checkout_request(amount_in_cents: i64) -> CheckoutRequest {
    serde_json::from_value(checkout_body(amount_in_cents)).unwrap()
}

pub fn checkout_body(amount_in_cents: i64) -> serde_json::Value {
    json!({
        "amount_in_cents": amount_in_cents,
        "customer_email": "cliente@example.com",
        "customer_name": "Ana Pérez",
        "customer_phone": "3001234567",
        "customer_document": "1234567890",
        "customer_document_type": "CC",
        "bank_code": "1",
    })
}

pub fn status_event(reference: &str, status: &str) -> Vec<u8> {
    let status_message = if status == "DECLINED" {
        "Transacción rechazada"
    } else {
        ""
    };
    serde_json::to_vec(&json!({
        "event": "transaction.updated",
        "data": {
            "transaction": {
                "id": "11-1",
                "reference": reference,
                "status": status,
                "status_message": status_message,
                "cus": "CUS-99",
            }
        },
        "sent_at": "2026-01-01T00:00:00.000Z",
    }))
    .unwrap()
}

pub fn sign(body: &[u8]) -> String {
    sign_body(body, SECRET)
}
