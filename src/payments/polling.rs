use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::PaymentProcessor;
use crate::payments::types::TransactionStatus;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Fixed-interval, bounded polling budget for the payment URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_attempts: 5,
        }
    }
}

/// Read the processor transaction until it exposes a non-empty payment URL.
///
/// Per-call timeouts count as a spent attempt and polling continues. Any
/// other processor error ends the loop at once. A transaction that reaches a
/// terminal status without a URL will never get one, so that also ends the
/// loop early. The caller is waiting synchronously, so the loop never runs
/// more than `policy.max_attempts` reads.
pub async fn poll_for_payment_url<P>(
    processor: &P,
    transaction_id: &str,
    policy: PollPolicy,
) -> PaymentResult<String>
where
    P: PaymentProcessor + ?Sized,
{
    let mut attempts = 0;
    let mut last_status: Option<TransactionStatus> = None;

    while attempts < policy.max_attempts {
        if attempts > 0 {
            tokio::time::sleep(policy.interval).await;
        }
        attempts += 1;

        match processor.get_transaction(transaction_id).await {
            Ok(transaction) => {
                last_status = Some(transaction.status);
                if let Some(url) = transaction
                    .payment_url
                    .filter(|url| !url.trim().is_empty())
                {
                    info!(
                        transaction_id = %transaction_id,
                        attempts,
                        "payment URL available"
                    );
                    return Ok(url);
                }
                if transaction.status.is_terminal() {
                    warn!(
                        transaction_id = %transaction_id,
                        status = %transaction.status,
                        "transaction finished before exposing a payment URL"
                    );
                    break;
                }
                debug!(
                    transaction_id = %transaction_id,
                    attempt = attempts,
                    max_attempts = policy.max_attempts,
                    "payment URL not ready yet"
                );
            }
            Err(err) if err.is_timeout() => {
                warn!(
                    transaction_id = %transaction_id,
                    attempt = attempts,
                    error = %err,
                    "payment URL poll timed out"
                );
            }
            Err(err) => {
                warn!(
                    transaction_id = %transaction_id,
                    attempt = attempts,
                    error = %err,
                    "payment URL polling aborted"
                );
                return Err(err);
            }
        }
    }

    Err(PaymentError::PaymentUrlUnavailable {
        transaction_id: transaction_id.to_string(),
        attempts,
        last_status,
    })
}
