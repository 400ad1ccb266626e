//! Unified error handling for the checkout service
//!
//! Every layer has its own `thiserror` enum; handlers convert them into
//! `AppError`, which carries the HTTP status, a machine-readable code and a
//! message that is safe to show to the payer.

use crate::payments::error::PaymentError;
use crate::payments::types::TransactionStatus;
use crate::services::payment_orchestrator::CheckoutError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    // Domain errors (4xx)
    #[serde(rename = "TRANSACTION_NOT_FOUND")]
    TransactionNotFound,
    #[serde(rename = "DUPLICATE_REFERENCE")]
    DuplicateReference,

    // Infrastructure errors (5xx)
    #[serde(rename = "DATABASE_ERROR")]
    DatabaseError,
    #[serde(rename = "CONFIGURATION_ERROR")]
    ConfigurationError,

    // External errors
    #[serde(rename = "PROCESSOR_UNAVAILABLE")]
    ProcessorUnavailable,
    #[serde(rename = "PROCESSOR_REJECTED")]
    ProcessorRejected,
    #[serde(rename = "PAYMENT_URL_UNAVAILABLE")]
    PaymentUrlUnavailable,

    // Generic
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
    #[serde(rename = "VALIDATION_ERROR")]
    ValidationError,
}

/// Domain-specific business logic errors
#[derive(Debug, Clone)]
pub enum DomainError {
    /// No transaction with the given reference
    TransactionNotFound { reference: String },
    /// Reference collision on create
    DuplicateReference { reference: String },
}

/// Infrastructure-level errors (database, configuration)
#[derive(Debug, Clone)]
pub enum InfrastructureError {
    Database { message: String, is_retryable: bool },
    Configuration { message: String },
}

/// Payment processor errors
#[derive(Debug, Clone)]
pub enum ExternalError {
    /// Processor unreachable, timed out or answered garbage
    ProcessorUnavailable { message: String, timed_out: bool },
    /// Processor understood the request and declined it
    ProcessorRejected {
        reason: String,
        provider_code: Option<String>,
    },
    /// Processor created the transaction but reading it back failed
    PaymentUrlLookupFailed {
        transaction_id: String,
        status: TransactionStatus,
        message: String,
    },
    /// Processor accepted the transaction but never produced a bank URL
    PaymentUrlUnavailable {
        transaction_id: String,
        attempts: u32,
        last_status: Option<TransactionStatus>,
    },
}

/// Input validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    /// Field present but unacceptable
    InvalidField { field: String, reason: String },
    /// Required field missing
    MissingField { field: String },
    /// Field value out of acceptable range
    OutOfRange {
        field: String,
        min: Option<String>,
        max: Option<String>,
    },
}

/// Unified application error type
#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub request_id: Option<String>,
}

#[derive(Debug, Clone)]
pub enum AppErrorKind {
    Domain(DomainError),
    Infrastructure(InfrastructureError),
    External(ExternalError),
    Validation(ValidationError),
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            request_id: None,
        }
    }

    pub fn not_found(reference: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Domain(DomainError::TransactionNotFound {
            reference: reference.into(),
        }))
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Attach the request id when one is known
    pub fn with_request_id_opt(self, request_id: Option<String>) -> Self {
        match request_id {
            Some(id) => self.with_request_id(id),
            None => self,
        }
    }

    /// Map error to HTTP status code
    pub fn status_code(&self) -> u16 {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::TransactionNotFound { .. } => 404,
                DomainError::DuplicateReference { .. } => 409,
            },
            AppErrorKind::Infrastructure(_) => 500,
            AppErrorKind::External(err) => match err {
                ExternalError::ProcessorUnavailable { .. } => 503,
                ExternalError::PaymentUrlLookupFailed { .. } => 502,
                ExternalError::ProcessorRejected { .. } => 422,
                ExternalError::PaymentUrlUnavailable { .. } => 504,
            },
            AppErrorKind::Validation(_) => 400,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> ErrorCode {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::TransactionNotFound { .. } => ErrorCode::TransactionNotFound,
                DomainError::DuplicateReference { .. } => ErrorCode::DuplicateReference,
            },
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { .. } => ErrorCode::DatabaseError,
                InfrastructureError::Configuration { .. } => ErrorCode::ConfigurationError,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::ProcessorUnavailable { .. }
                | ExternalError::PaymentUrlLookupFailed { .. } => ErrorCode::ProcessorUnavailable,
                ExternalError::ProcessorRejected { .. } => ErrorCode::ProcessorRejected,
                ExternalError::PaymentUrlUnavailable { .. } => ErrorCode::PaymentUrlUnavailable,
            },
            AppErrorKind::Validation(_) => ErrorCode::ValidationError,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::TransactionNotFound { reference } => {
                    format!("Transaction '{}' not found", reference)
                }
                DomainError::DuplicateReference { reference } => {
                    format!("Transaction '{}' already exists", reference)
                }
            },
            AppErrorKind::Infrastructure(_) => {
                "Service temporarily unavailable. Please try again later".to_string()
            }
            AppErrorKind::External(err) => match err {
                ExternalError::ProcessorUnavailable { timed_out, .. } => {
                    if *timed_out {
                        "The payment processor took too long to respond. Please try again"
                            .to_string()
                    } else {
                        "The payment processor is temporarily unavailable. Please try again"
                            .to_string()
                    }
                }
                ExternalError::ProcessorRejected { reason, .. } => {
                    format!("The payment was rejected by the processor: {}", reason)
                }
                ExternalError::PaymentUrlLookupFailed { .. } => {
                    "The payment was created but the bank link could not be retrieved. Please try again"
                        .to_string()
                }
                ExternalError::PaymentUrlUnavailable { .. } => {
                    "The bank did not return a payment link in time. Please try again".to_string()
                }
            },
            AppErrorKind::Validation(err) => match err {
                ValidationError::InvalidField { field, reason } => {
                    format!("Invalid value for '{}': {}", field, reason)
                }
                ValidationError::MissingField { field } => {
                    format!("Required field '{}' is missing", field)
                }
                ValidationError::OutOfRange { field, min, max } => match (min, max) {
                    (Some(min), Some(max)) => {
                        format!("Field '{}' must be between {} and {}", field, min, max)
                    }
                    (Some(min), None) => {
                        format!("Field '{}' must be at least {}", field, min)
                    }
                    (None, Some(max)) => {
                        format!("Field '{}' must be at most {}", field, max)
                    }
                    (None, None) => {
                        format!("Field '{}' is out of acceptable range", field)
                    }
                },
            },
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            AppErrorKind::Domain(_) => false,
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { is_retryable, .. } => *is_retryable,
                InfrastructureError::Configuration { .. } => false,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::ProcessorUnavailable { .. } => true,
                ExternalError::PaymentUrlLookupFailed { .. } => true,
                ExternalError::ProcessorRejected { .. } => false,
                ExternalError::PaymentUrlUnavailable { .. } => true,
            },
            AppErrorKind::Validation(_) => false,
        }
    }

    /// Structured extras for the error body
    pub fn details(&self) -> Option<serde_json::Value> {
        match &self.kind {
            AppErrorKind::Validation(ValidationError::InvalidField { field, .. })
            | AppErrorKind::Validation(ValidationError::MissingField { field })
            | AppErrorKind::Validation(ValidationError::OutOfRange { field, .. }) => {
                Some(serde_json::json!({ "field": field }))
            }
            AppErrorKind::External(ExternalError::ProcessorRejected { provider_code, .. }) => {
                provider_code
                    .as_ref()
                    .map(|code| serde_json::json!({ "provider_code": code }))
            }
            AppErrorKind::External(ExternalError::PaymentUrlLookupFailed {
                transaction_id,
                status,
                ..
            }) => Some(serde_json::json!({
                "transaction_id": transaction_id,
                "status": status,
            })),
            AppErrorKind::External(ExternalError::PaymentUrlUnavailable {
                transaction_id,
                attempts,
                last_status,
            }) => Some(serde_json::json!({
                "transaction_id": transaction_id,
                "attempts": attempts,
                "status": last_status,
            })),
            _ => None,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for AppError {}

// Conversions from specific error types
// Note: From<DatabaseError> is implemented in database/error.rs

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        let kind = match err {
            PaymentError::UpstreamUnavailable { message, timed_out } => {
                ExternalError::ProcessorUnavailable { message, timed_out }
            }
            PaymentError::ProcessorRejected {
                reason,
                provider_code,
            } => ExternalError::ProcessorRejected {
                reason,
                provider_code,
            },
            PaymentError::PaymentUrlUnavailable {
                transaction_id,
                attempts,
                last_status,
            } => ExternalError::PaymentUrlUnavailable {
                transaction_id,
                attempts,
                last_status,
            },
        };
        AppError::new(AppErrorKind::External(kind))
    }
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::Validation { field, reason } => {
                AppError::new(AppErrorKind::Validation(ValidationError::InvalidField {
                    field,
                    reason,
                }))
            }
            CheckoutError::MissingField { field } => {
                AppError::new(AppErrorKind::Validation(ValidationError::MissingField { field }))
            }
            CheckoutError::AmountBelowMinimum { minimum, .. } => {
                AppError::new(AppErrorKind::Validation(ValidationError::OutOfRange {
                    field: "amount_in_cents".to_string(),
                    min: Some(minimum.to_string()),
                    max: None,
                }))
            }
            CheckoutError::NotFound { reference } => AppError::not_found(reference),
            CheckoutError::Processor(err) => err.into(),
            CheckoutError::PaymentUrlLookup {
                transaction_id,
                status,
                source,
            } => AppError::new(AppErrorKind::External(ExternalError::PaymentUrlLookupFailed {
                transaction_id,
                status,
                message: source.to_string(),
            })),
            CheckoutError::Store(err) => err.into(),
        }
    }
}

impl From<crate::config::ConfigError> for AppError {
    fn from(err: crate::config::ConfigError) -> Self {
        AppError::new(AppErrorKind::Infrastructure(
            InfrastructureError::Configuration {
                message: err.to_string(),
            },
        ))
    }
}

/// Result type for operations that can fail with AppError
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error() {
        let error = AppError::not_found("PAGO_1");

        assert_eq!(error.status_code(), 404);
        assert_eq!(error.error_code(), ErrorCode::TransactionNotFound);
        assert!(error.user_message().contains("PAGO_1"));
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_processor_errors_map_to_distinct_codes() {
        let unavailable: AppError = PaymentError::upstream("connection refused").into();
        assert_eq!(unavailable.status_code(), 503);
        assert_eq!(unavailable.error_code(), ErrorCode::ProcessorUnavailable);
        assert!(unavailable.is_retryable());

        let rejected: AppError = PaymentError::ProcessorRejected {
            reason: "Código de banco no válido".to_string(),
            provider_code: Some("422".to_string()),
        }
        .into();
        assert_eq!(rejected.status_code(), 422);
        assert_eq!(rejected.error_code(), ErrorCode::ProcessorRejected);
        assert!(rejected.user_message().contains("Código de banco no válido"));
        assert!(!rejected.is_retryable());

        let no_url: AppError = PaymentError::PaymentUrlUnavailable {
            transaction_id: "11-1".to_string(),
            attempts: 5,
            last_status: Some(TransactionStatus::Pending),
        }
        .into();
        assert_eq!(no_url.status_code(), 504);
        assert_eq!(no_url.error_code(), ErrorCode::PaymentUrlUnavailable);
        assert!(no_url.is_retryable());
        assert_eq!(no_url.details().unwrap()["status"], "PENDING");
    }

    #[test]
    fn test_payment_url_lookup_failure_names_the_processor_transaction() {
        let error: AppError = CheckoutError::PaymentUrlLookup {
            transaction_id: "11-1".to_string(),
            status: TransactionStatus::Pending,
            source: PaymentError::upstream("HTTP 503"),
        }
        .into();

        assert_eq!(error.status_code(), 502);
        assert_eq!(error.error_code(), ErrorCode::ProcessorUnavailable);
        assert!(error.is_retryable());
        let details = error.details().unwrap();
        assert_eq!(details["transaction_id"], "11-1");
        assert_eq!(details["status"], "PENDING");
    }

    #[test]
    fn test_validation_error() {
        let error: AppError = CheckoutError::AmountBelowMinimum {
            amount: 1000,
            minimum: 1500,
        }
        .into();

        assert_eq!(error.status_code(), 400);
        assert_eq!(error.error_code(), ErrorCode::ValidationError);
        assert!(error.user_message().contains("1500"));
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_error_code_serialization() {
        let json = serde_json::to_string(&ErrorCode::PaymentUrlUnavailable).unwrap();
        assert_eq!(json, "\"PAYMENT_URL_UNAVAILABLE\"");
    }
}
