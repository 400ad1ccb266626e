use crate::payments::error::PaymentResult;
use crate::payments::polling::{poll_for_payment_url, PollPolicy};
use crate::payments::types::{
    AcceptanceToken, CreateTransactionRequest, FinancialInstitution, ProcessorTransaction,
};
use async_trait::async_trait;

/// Everything the checkout core needs from the external payment processor.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Fetch the merchant acceptance token required before creating a
    /// transaction.
    async fn get_acceptance_token(&self) -> PaymentResult<AcceptanceToken>;

    /// Submit a new transaction. Not idempotent: every call creates a new
    /// transaction on the processor side.
    async fn create_transaction(
        &self,
        request: CreateTransactionRequest,
    ) -> PaymentResult<ProcessorTransaction>;

    /// Read back a transaction. Idempotent.
    async fn get_transaction(&self, transaction_id: &str) -> PaymentResult<ProcessorTransaction>;

    /// Banks currently offered for PSE.
    async fn list_financial_institutions(&self) -> PaymentResult<Vec<FinancialInstitution>>;

    fn poll_policy(&self) -> PollPolicy;

    /// Poll `get_transaction` until the bank redirect URL shows up or the
    /// attempt budget in `poll_policy` runs out.
    async fn await_payment_url(&self, transaction_id: &str) -> PaymentResult<String> {
        poll_for_payment_url(self, transaction_id, self.poll_policy()).await
    }

    fn name(&self) -> &'static str;
}
