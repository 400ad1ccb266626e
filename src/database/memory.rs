use crate::database::error::DatabaseError;
use crate::database::repository::TransactionStore;
use crate::database::transaction::{NewTransaction, StatusChange, StatusUpdate, Transaction};
use crate::payments::types::TransactionStatus;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Process-local store used by tests and by `SKIP_EXTERNALS` runs.
#[derive(Default)]
pub struct InMemoryTransactionStore {
    transactions: RwLock<HashMap<String, Transaction>>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.transactions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.transactions.read().await.is_empty()
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn create(&self, transaction: NewTransaction) -> Result<Transaction, DatabaseError> {
        let mut transactions = self.transactions.write().await;
        if transactions.contains_key(&transaction.reference) {
            return Err(DatabaseError::duplicate_reference(transaction.reference));
        }
        let stored = transaction.into_pending(Utc::now());
        transactions.insert(stored.reference.clone(), stored.clone());
        Ok(stored)
    }

    async fn find_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Transaction>, DatabaseError> {
        Ok(self.transactions.read().await.get(reference).cloned())
    }

    async fn update_status(
        &self,
        reference: &str,
        change: StatusChange,
    ) -> Result<Option<StatusUpdate>, DatabaseError> {
        // The write lock spans the read-check-write.
        let mut transactions = self.transactions.write().await;
        Ok(transactions
            .get_mut(reference)
            .map(|tx| tx.apply(&change, Utc::now())))
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<Transaction>, DatabaseError> {
        let transactions = self.transactions.read().await;
        let mut recent: Vec<Transaction> = transactions.values().cloned().collect();
        recent.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.reference.cmp(&a.reference))
        });
        recent.truncate(limit);
        Ok(recent)
    }

    async fn list_pending(
        &self,
        created_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Transaction>, DatabaseError> {
        let transactions = self.transactions.read().await;
        let mut pending: Vec<Transaction> = transactions
            .values()
            .filter(|tx| {
                tx.status == TransactionStatus::Pending
                    && tx.created_at < created_before
                    && tx.processor_transaction_id.is_some()
            })
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        pending.truncate(limit);
        Ok(pending)
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}
