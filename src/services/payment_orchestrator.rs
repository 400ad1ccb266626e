//! Payment Orchestrator Service
//!
//! Drives a PSE checkout from the payer's request to a bank redirect URL,
//! persisting the transaction only once the processor has accepted it and
//! produced that URL. Also hosts the read-back reconciliation of a single
//! transaction against the processor.

use crate::config::{CheckoutConfig, ProcessorConfig};
use crate::database::error::DatabaseError;
use crate::database::repository::TransactionStore;
use crate::database::transaction::{NewTransaction, StatusChange, StatusUpdate, UpdateSource};
use crate::logging::{mask_document, mask_email};
use crate::payments::error::PaymentError;
use crate::payments::provider::PaymentProcessor;
use crate::payments::types::{
    CreateTransactionRequest, FinancialInstitution, LineItem, PsePaymentDetails,
    TransactionStatus, UserType,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

/// Colombian mobile number, optionally prefixed with the country code.
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\+?57)?3\d{9}$").expect("valid phone regex"));

static DOCUMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]{4,20}$").expect("valid document regex"));

/// Identity document types the processor accepts for PSE.
pub const DOCUMENT_TYPES: &[&str] = &["CC", "CE", "NIT", "PP", "TI", "DNI", "RG", "OTHER"];

const REFERENCE_PREFIX: &str = "PAGO";

// ============================================================================
// Request / Response Types
// ============================================================================

/// Checkout request as sent by the storefront
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub amount_in_cents: i64,
    pub customer_email: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_document: String,
    pub customer_document_type: String,
    pub bank_code: String,
    #[serde(default)]
    pub bank_name: Option<String>,
    #[serde(default)]
    pub user_type: UserType,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
}

/// What the payer needs to continue at the bank
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckoutSession {
    pub reference: String,
    pub payment_url: String,
    pub status: TransactionStatus,
    pub processor_transaction_id: String,
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Clone, Error)]
pub enum CheckoutError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("missing required field: {field}")]
    MissingField { field: String },

    #[error("amount {amount} is below the minimum of {minimum}")]
    AmountBelowMinimum { amount: i64, minimum: i64 },

    #[error("transaction not found: {reference}")]
    NotFound { reference: String },

    #[error(transparent)]
    Processor(#[from] PaymentError),

    /// Reading the processor transaction back failed after it was created.
    #[error("payment URL lookup failed for processor transaction {transaction_id} ({status}): {source}")]
    PaymentUrlLookup {
        transaction_id: String,
        status: TransactionStatus,
        #[source]
        source: PaymentError,
    },

    #[error("transaction store failure: {0}")]
    Store(#[from] DatabaseError),
}

impl CheckoutError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        CheckoutError::Validation {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CheckoutError::Validation { .. }
                | CheckoutError::MissingField { .. }
                | CheckoutError::AmountBelowMinimum { .. }
        )
    }
}

pub type CheckoutResult<T> = Result<T, CheckoutError>;

// ============================================================================
// Configuration
// ============================================================================

/// Checkout rules and processor request defaults
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub min_amount_in_cents: i64,
    /// Whitelisted bank codes; `None` outside sandbox mode.
    pub sandbox_bank_codes: Option<Vec<String>>,
    pub currency: String,
    pub redirect_base_url: Option<String>,
    pub payment_description: String,
}

impl OrchestratorConfig {
    pub fn new(checkout: &CheckoutConfig, processor: &ProcessorConfig) -> Self {
        Self {
            min_amount_in_cents: checkout.min_amount_in_cents,
            sandbox_bank_codes: processor
                .environment
                .is_sandbox()
                .then(|| checkout.sandbox_bank_codes.clone()),
            currency: processor.currency.clone(),
            redirect_base_url: processor.redirect_base_url.clone(),
            payment_description: processor.payment_description.clone(),
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            min_amount_in_cents: 150_000,
            sandbox_bank_codes: Some(vec!["1".to_string(), "2".to_string()]),
            currency: "COP".to_string(),
            redirect_base_url: None,
            payment_description: "Pago a Tienda Wompi".to_string(),
        }
    }
}

// ============================================================================
// Main Payment Orchestrator
// ============================================================================

pub struct PaymentOrchestrator {
    processor: Arc<dyn PaymentProcessor>,
    store: Arc<dyn TransactionStore>,
    config: OrchestratorConfig,
}

impl PaymentOrchestrator {
    pub fn new(
        processor: Arc<dyn PaymentProcessor>,
        store: Arc<dyn TransactionStore>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            processor,
            store,
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Check the request without touching the network.
    pub fn validate(&self, request: &CheckoutRequest) -> CheckoutResult<()> {
        if request.amount_in_cents < self.config.min_amount_in_cents {
            return Err(CheckoutError::AmountBelowMinimum {
                amount: request.amount_in_cents,
                minimum: self.config.min_amount_in_cents,
            });
        }

        let email = required("customer_email", &request.customer_email)?;
        if !EMAIL_RE.is_match(email) {
            return Err(CheckoutError::invalid(
                "customer_email",
                "not a valid email address",
            ));
        }

        required("customer_name", &request.customer_name)?;

        let phone = normalize_phone(required("customer_phone", &request.customer_phone)?);
        if !PHONE_RE.is_match(&phone) {
            return Err(CheckoutError::invalid(
                "customer_phone",
                "expected a Colombian mobile number such as 3001234567",
            ));
        }

        let document = required("customer_document", &request.customer_document)?;
        if !DOCUMENT_RE.is_match(document) {
            return Err(CheckoutError::invalid(
                "customer_document",
                "expected 4 to 20 letters or digits",
            ));
        }

        let document_type = required("customer_document_type", &request.customer_document_type)?;
        if !DOCUMENT_TYPES.contains(&document_type) {
            return Err(CheckoutError::invalid(
                "customer_document_type",
                format!("must be one of {}", DOCUMENT_TYPES.join(", ")),
            ));
        }

        let bank_code = required("bank_code", &request.bank_code)?;
        if let Some(allowed) = &self.config.sandbox_bank_codes {
            if !allowed.iter().any(|code| code == bank_code) {
                return Err(CheckoutError::invalid(
                    "bank_code",
                    format!("sandbox only accepts bank codes {}", allowed.join(", ")),
                ));
            }
        }

        validate_line_items(&request.line_items, request.amount_in_cents)?;

        Ok(())
    }

    /// Fresh reference: `PAGO_{unix_millis}_{8 hex chars}`.
    pub fn generate_reference() -> String {
        let millis = chrono::Utc::now().timestamp_millis();
        let suffix = Uuid::new_v4().simple().to_string();
        format!("{}_{}_{}", REFERENCE_PREFIX, millis, &suffix[..8])
    }

    /// Start a PSE payment and return the bank redirect URL.
    ///
    /// Nothing is persisted unless every processor step succeeds, so a failed
    /// checkout never leaves a row behind. Each call creates a new reference
    /// and a new processor transaction; identical carts are not deduplicated.
    pub async fn initiate(&self, request: CheckoutRequest) -> CheckoutResult<CheckoutSession> {
        self.validate(&request)?;

        let reference = Self::generate_reference();
        let customer_phone = normalize_phone(&request.customer_phone);

        info!(
            reference = %reference,
            amount_in_cents = request.amount_in_cents,
            customer_email = %mask_email(&request.customer_email),
            customer_document = %mask_document(&request.customer_document),
            bank_code = %request.bank_code,
            processor = self.processor.name(),
            "Initiating PSE checkout"
        );

        let acceptance = self.processor.get_acceptance_token().await.map_err(|e| {
            error!(reference = %reference, error = %e, "Could not obtain acceptance token");
            e
        })?;

        let processor_request = CreateTransactionRequest {
            acceptance_token: acceptance.token,
            amount_in_cents: request.amount_in_cents,
            currency: self.config.currency.clone(),
            reference: reference.clone(),
            customer_email: request.customer_email.trim().to_string(),
            customer_full_name: request.customer_name.trim().to_string(),
            customer_phone: customer_phone.clone(),
            redirect_url: self.redirect_url(&reference),
            payment_method: PsePaymentDetails {
                user_type: request.user_type,
                user_legal_id: request.customer_document.trim().to_string(),
                user_legal_id_type: request.customer_document_type.trim().to_string(),
                financial_institution_code: request.bank_code.trim().to_string(),
                payment_description: self.config.payment_description.clone(),
            },
        };

        let created = self
            .processor
            .create_transaction(processor_request)
            .await
            .map_err(|e| {
                warn!(reference = %reference, error = %e, "Processor did not create the transaction");
                e
            })?;

        let payment_url = match created.payment_url.clone() {
            Some(url) => url,
            None => self
                .processor
                .await_payment_url(&created.id)
                .await
                .map_err(|e| {
                    warn!(
                        reference = %reference,
                        transaction_id = %created.id,
                        status = %created.status,
                        error = %e,
                        "No payment URL for processor transaction"
                    );
                    match e {
                        PaymentError::PaymentUrlUnavailable { .. } => CheckoutError::Processor(e),
                        other => CheckoutError::PaymentUrlLookup {
                            transaction_id: created.id.clone(),
                            status: created.status,
                            source: other,
                        },
                    }
                })?,
        };

        let stored = self
            .store
            .create(NewTransaction {
                reference: reference.clone(),
                amount_in_cents: request.amount_in_cents,
                currency: self.config.currency.clone(),
                customer_email: request.customer_email.trim().to_string(),
                customer_name: request.customer_name.trim().to_string(),
                customer_phone,
                customer_document: request.customer_document.trim().to_string(),
                customer_document_type: request.customer_document_type.trim().to_string(),
                bank_code: request.bank_code.trim().to_string(),
                bank_name: request.bank_name.clone(),
                user_type: request.user_type,
                line_items: request.line_items,
                processor_transaction_id: Some(created.id.clone()),
            })
            .await
            .map_err(|e| {
                error!(
                    reference = %reference,
                    transaction_id = %created.id,
                    error = %e,
                    "Processor transaction created but could not be persisted"
                );
                e
            })?;

        info!(
            reference = %stored.reference,
            transaction_id = %created.id,
            "PSE checkout ready for bank redirect"
        );

        Ok(CheckoutSession {
            reference: stored.reference,
            payment_url,
            status: stored.status,
            processor_transaction_id: created.id,
        })
    }

    /// Read a PENDING transaction back from the processor and apply a
    /// terminal status if the processor reports one.
    pub async fn reconcile(&self, reference: &str) -> CheckoutResult<StatusUpdate> {
        let transaction = self
            .store
            .find_by_reference(reference)
            .await?
            .ok_or_else(|| CheckoutError::NotFound {
                reference: reference.to_string(),
            })?;

        let processor_id = match (&transaction.processor_transaction_id, transaction.status) {
            (Some(id), TransactionStatus::Pending) => id.clone(),
            _ => return Ok(StatusUpdate::Unchanged(transaction)),
        };

        let remote = self.processor.get_transaction(&processor_id).await?;
        if !remote.status.is_terminal() {
            return Ok(StatusUpdate::Unchanged(transaction));
        }

        let change = StatusChange::new(remote.status, UpdateSource::ReadBack)
            .with_reject_reason(remote.status_message)
            .with_processor_transaction_id(Some(remote.id));

        let outcome = self
            .store
            .update_status(reference, change)
            .await?
            .ok_or_else(|| CheckoutError::NotFound {
                reference: reference.to_string(),
            })?;

        match &outcome {
            StatusUpdate::Applied(tx) => info!(
                reference = %reference,
                status = %tx.status,
                "Transaction reconciled from processor read-back"
            ),
            StatusUpdate::Conflict { current, attempted } => warn!(
                reference = %reference,
                current = %current.status,
                attempted = %attempted,
                "Read-back disagrees with terminal status; keeping stored status"
            ),
            StatusUpdate::Unchanged(_) => {}
        }

        Ok(outcome)
    }

    /// Banks the payer can choose from.
    pub async fn list_banks(&self) -> CheckoutResult<Vec<FinancialInstitution>> {
        if let Some(codes) = &self.config.sandbox_bank_codes {
            return Ok(codes
                .iter()
                .map(|code| FinancialInstitution {
                    code: code.clone(),
                    name: sandbox_bank_name(code),
                })
                .collect());
        }

        Ok(self.processor.list_financial_institutions().await?)
    }

    fn redirect_url(&self, reference: &str) -> Option<String> {
        self.config
            .redirect_base_url
            .as_ref()
            .map(|base| format!("{}/{}", base.trim_end_matches('/'), reference))
    }
}

fn required<'a>(field: &str, value: &'a str) -> CheckoutResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CheckoutError::MissingField {
            field: field.to_string(),
        });
    }
    Ok(trimmed)
}

fn normalize_phone(phone: &str) -> String {
    phone
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '(' && *c != ')')
        .collect()
}

fn validate_line_items(items: &[LineItem], amount_in_cents: i64) -> CheckoutResult<()> {
    if items.is_empty() {
        return Ok(());
    }

    let mut total: i64 = 0;
    for item in items {
        if item.name.trim().is_empty() {
            return Err(CheckoutError::invalid("line_items", "item name is empty"));
        }
        if item.quantity == 0 || item.unit_price < 0 {
            return Err(CheckoutError::invalid(
                "line_items",
                format!("invalid quantity or price for '{}'", item.name),
            ));
        }
        total = item
            .unit_price
            .checked_mul(i64::from(item.quantity))
            .and_then(|line| total.checked_add(line))
            .ok_or_else(|| CheckoutError::invalid("line_items", "cart total overflows"))?;
    }

    if total != amount_in_cents {
        return Err(CheckoutError::invalid(
            "line_items",
            format!(
                "items add up to {} but amount_in_cents is {}",
                total, amount_in_cents
            ),
        ));
    }

    Ok(())
}

fn sandbox_bank_name(code: &str) -> String {
    match code {
        "1" => "Banco que aprueba (Sandbox PSE)".to_string(),
        "2" => "Banco que rechaza (Sandbox PSE)".to_string(),
        other => format!("Banco de pruebas {}", other),
    }
}
