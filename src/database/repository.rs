use crate::database::error::DatabaseError;
use crate::database::transaction::{NewTransaction, StatusChange, StatusUpdate, Transaction};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Durable record of checkout attempts keyed by reference.
///
/// Implementations serialize writes per reference: a webhook update and a
/// read-back update for the same reference never interleave.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Insert a new PENDING transaction. Fails with `DuplicateReference` when
    /// the reference is taken.
    async fn create(&self, transaction: NewTransaction) -> Result<Transaction, DatabaseError>;

    async fn find_by_reference(&self, reference: &str)
        -> Result<Option<Transaction>, DatabaseError>;

    /// Apply `change` under the monotone transition rule. `Ok(None)` means
    /// the reference is unknown.
    async fn update_status(
        &self,
        reference: &str,
        change: StatusChange,
    ) -> Result<Option<StatusUpdate>, DatabaseError>;

    /// Newest first.
    async fn list_recent(&self, limit: usize) -> Result<Vec<Transaction>, DatabaseError>;

    /// PENDING transactions created before `created_before` that carry a
    /// processor transaction id, oldest first.
    async fn list_pending(
        &self,
        created_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Transaction>, DatabaseError>;

    /// Cheap reachability check used by the health endpoint.
    async fn ping(&self) -> Result<(), DatabaseError>;
}
