use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::database::error::DatabaseError;
use crate::database::repository::TransactionStore;
use crate::database::transaction::{StatusChange, StatusUpdate, UpdateSource};
use crate::payments::signature;
use crate::payments::types::TransactionStatus;

/// The one event type that carries transaction status changes.
pub const STATUS_EVENT: &str = "transaction.updated";

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("request body was not available as raw bytes")]
    BodyUnavailable,
    #[error("invalid webhook signature")]
    InvalidSignature,
    #[error("malformed webhook payload: {0}")]
    MalformedPayload(String),
    #[error("transaction store failure: {0}")]
    Store(#[from] DatabaseError),
}

impl WebhookError {
    /// Status code returned to the processor. Only signature and payload
    /// problems, plus store failures worth a redelivery, are non-2xx.
    pub fn status_code(&self) -> u16 {
        match self {
            WebhookError::BodyUnavailable => 500,
            WebhookError::InvalidSignature => 401,
            WebhookError::MalformedPayload(_) => 400,
            WebhookError::Store(_) => 500,
        }
    }
}

/// What happened to an authenticated notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Applied {
        reference: String,
        status: TransactionStatus,
    },
    Unchanged {
        reference: String,
        status: TransactionStatus,
    },
    /// The stored terminal status was kept.
    Conflict {
        reference: String,
        current: TransactionStatus,
        attempted: TransactionStatus,
    },
    UnknownReference {
        reference: String,
    },
    IgnoredEvent {
        event: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    event: Option<String>,
    #[serde(default)]
    data: JsonValue,
}

#[derive(Debug, Default, Deserialize)]
struct StatusEventData {
    transaction: Option<WebhookTransaction>,
}

#[derive(Debug, Default, Deserialize)]
struct WebhookTransaction {
    id: Option<String>,
    reference: Option<String>,
    status: Option<String>,
    status_message: Option<String>,
    reject_reason: Option<String>,
    cus: Option<String>,
}

/// Validated content of a status-change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
struct StatusNotification {
    reference: String,
    status: TransactionStatus,
    change: StatusChange,
}

pub struct WebhookProcessor {
    store: Arc<dyn TransactionStore>,
    shared_secret: String,
}

impl WebhookProcessor {
    pub fn new(store: Arc<dyn TransactionStore>, shared_secret: impl Into<String>) -> Self {
        Self {
            store,
            shared_secret: shared_secret.into(),
        }
    }

    /// Verify, parse and apply one webhook delivery.
    ///
    /// `raw_body` must be the exact bytes received; the signature is checked
    /// before anything is parsed and a failed check never touches the store.
    pub async fn process(
        &self,
        raw_body: &[u8],
        signature_header: Option<&str>,
    ) -> Result<WebhookOutcome, WebhookError> {
        let provided = signature_header.unwrap_or_default();
        if !signature::verify(raw_body, provided, &self.shared_secret) {
            warn!(
                body_len = raw_body.len(),
                signature_present = signature_header.is_some(),
                "Rejected webhook with invalid signature"
            );
            return Err(WebhookError::InvalidSignature);
        }

        let notification = match parse_notification(raw_body)? {
            Some(notification) => notification,
            None => {
                let event = event_name(raw_body);
                info!(event = ?event, "Ignoring webhook event");
                return Ok(WebhookOutcome::IgnoredEvent { event });
            }
        };

        let reference = notification.reference;
        let update = self
            .store
            .update_status(&reference, notification.change)
            .await
            .map_err(|e| {
                error!(reference = %reference, error = %e, "Failed to apply webhook update");
                e
            })?;

        let outcome = match update {
            None => {
                // Webhook raced ahead of checkout persistence, or the reference
                // never existed here. Acknowledge so the processor stops.
                error!(
                    reference = %reference,
                    status = %notification.status,
                    "Webhook for unknown transaction reference"
                );
                WebhookOutcome::UnknownReference { reference }
            }
            Some(StatusUpdate::Applied(tx)) => {
                info!(
                    reference = %reference,
                    status = %tx.status,
                    cus = ?tx.cus,
                    "Transaction status updated from webhook"
                );
                WebhookOutcome::Applied {
                    reference,
                    status: tx.status,
                }
            }
            Some(StatusUpdate::Unchanged(tx)) => {
                info!(reference = %reference, status = %tx.status, "Duplicate webhook status");
                WebhookOutcome::Unchanged {
                    reference,
                    status: tx.status,
                }
            }
            Some(StatusUpdate::Conflict { current, attempted }) => {
                warn!(
                    reference = %reference,
                    current = %current.status,
                    attempted = %attempted,
                    "Webhook tried to change a terminal status; keeping stored status"
                );
                WebhookOutcome::Conflict {
                    reference,
                    current: current.status,
                    attempted,
                }
            }
        };

        Ok(outcome)
    }
}

/// `Ok(None)` for events other than [`STATUS_EVENT`].
fn parse_notification(raw_body: &[u8]) -> Result<Option<StatusNotification>, WebhookError> {
    let envelope: WebhookEnvelope = serde_json::from_slice(raw_body)
        .map_err(|e| WebhookError::MalformedPayload(format!("invalid JSON: {}", e)))?;

    if envelope.event.as_deref() != Some(STATUS_EVENT) {
        return Ok(None);
    }

    let data: StatusEventData = if envelope.data.is_null() {
        StatusEventData::default()
    } else {
        serde_json::from_value(envelope.data)
            .map_err(|e| WebhookError::MalformedPayload(format!("invalid event data: {}", e)))?
    };
    let transaction = data.transaction.unwrap_or_default();

    let reference = transaction
        .reference
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| WebhookError::MalformedPayload("missing transaction reference".into()))?;
    let raw_status = transaction
        .status
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| WebhookError::MalformedPayload("missing transaction status".into()))?;
    let status = TransactionStatus::from_processor(&raw_status).ok_or_else(|| {
        WebhookError::MalformedPayload(format!("unknown transaction status: {}", raw_status))
    })?;

    let change = StatusChange::new(status, UpdateSource::Webhook)
        .with_reject_reason(transaction.reject_reason.or(transaction.status_message))
        .with_cus(transaction.cus)
        .with_processor_transaction_id(transaction.id);

    Ok(Some(StatusNotification {
        reference,
        status,
        change,
    }))
}

fn event_name(raw_body: &[u8]) -> Option<String> {
    serde_json::from_slice::<WebhookEnvelope>(raw_body)
        .ok()
        .and_then(|envelope| envelope.event)
}
