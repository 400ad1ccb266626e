use crate::payments::types::TransactionStatus;
use thiserror::Error;

pub type PaymentResult<T> = Result<T, PaymentError>;

/// Failures of the processor client. Nothing from reqwest or serde crosses
/// this boundary in raw form.
#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    #[error("Processor unavailable: {message}")]
    UpstreamUnavailable { message: String, timed_out: bool },

    #[error("Processor rejected the request: {reason}")]
    ProcessorRejected {
        reason: String,
        provider_code: Option<String>,
    },

    #[error(
        "Payment URL unavailable for transaction {transaction_id} after {attempts} attempt(s)"
    )]
    PaymentUrlUnavailable {
        transaction_id: String,
        attempts: u32,
        last_status: Option<TransactionStatus>,
    },
}

impl PaymentError {
    pub fn upstream(message: impl Into<String>) -> Self {
        PaymentError::UpstreamUnavailable {
            message: message.into(),
            timed_out: false,
        }
    }

    /// True only for per-call timeouts; the payment URL poller keeps going
    /// after these and stops on everything else.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            PaymentError::UpstreamUnavailable {
                timed_out: true,
                ..
            }
        )
    }
}
