use std::sync::Arc;

use crate::database::error::DatabaseError;
use crate::database::repository::TransactionStore;
use crate::database::transaction::Transaction;

pub const DEFAULT_RECENT_LIMIT: usize = 5;
pub const MAX_RECENT_LIMIT: usize = 50;

/// Read path for payers polling their transaction. Never calls the processor.
pub struct TransactionStatusService {
    store: Arc<dyn TransactionStore>,
}

impl TransactionStatusService {
    pub fn new(store: Arc<dyn TransactionStore>) -> Self {
        Self { store }
    }

    /// `Ok(None)` when the reference is unknown. PENDING is a normal answer.
    pub async fn get_status(&self, reference: &str) -> Result<Option<Transaction>, DatabaseError> {
        self.store.find_by_reference(reference).await
    }

    /// Most recent transactions, newest first. The limit is clamped to
    /// `1..=MAX_RECENT_LIMIT`.
    pub async fn recent(&self, limit: Option<usize>) -> Result<Vec<Transaction>, DatabaseError> {
        let limit = limit
            .unwrap_or(DEFAULT_RECENT_LIMIT)
            .clamp(1, MAX_RECENT_LIMIT);
        self.store.list_recent(limit).await
    }
}
