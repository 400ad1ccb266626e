use crate::database::error::DatabaseError;
use crate::database::repository::TransactionStore;
use crate::database::transaction::{
    transition, NewTransaction, StatusChange, StatusUpdate, Transaction, Transition,
    UpdateSource,
};
use crate::payments::types::{LineItem, PaymentMethod, TransactionStatus, UserType};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::debug;

const COLUMNS: &str = "reference, status, amount_in_cents, currency, customer_email, \
     customer_name, customer_phone, customer_document, customer_document_type, \
     payment_method, bank_code, bank_name, user_type, line_items, attempts, reject_reason, \
     processor_transaction_id, cus, updated_by_webhook, created_at, updated_at";

/// Raw `payment_transactions` row
#[derive(Debug, Clone, FromRow)]
struct TransactionRow {
    reference: String,
    status: String,
    amount_in_cents: i64,
    currency: String,
    customer_email: String,
    customer_name: String,
    customer_phone: String,
    customer_document: String,
    customer_document_type: String,
    payment_method: String,
    bank_code: String,
    bank_name: Option<String>,
    user_type: String,
    line_items: Json<Vec<LineItem>>,
    attempts: i32,
    reject_reason: Option<String>,
    processor_transaction_id: Option<String>,
    cus: Option<String>,
    updated_by_webhook: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = DatabaseError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<TransactionStatus>()
            .map_err(DatabaseError::decode)?;
        let payment_method = match row.payment_method.as_str() {
            "PSE" => PaymentMethod::Pse,
            other => {
                return Err(DatabaseError::decode(format!(
                    "unknown payment method: {}",
                    other
                )))
            }
        };
        let user_type = match row.user_type.as_str() {
            "natural" => UserType::Natural,
            "legal" => UserType::Legal,
            other => {
                return Err(DatabaseError::decode(format!(
                    "unknown user type: {}",
                    other
                )))
            }
        };

        Ok(Transaction {
            reference: row.reference,
            status,
            amount_in_cents: row.amount_in_cents,
            currency: row.currency,
            customer_email: row.customer_email,
            customer_name: row.customer_name,
            customer_phone: row.customer_phone,
            customer_document: row.customer_document,
            customer_document_type: row.customer_document_type,
            payment_method,
            bank_code: row.bank_code,
            bank_name: row.bank_name,
            user_type,
            line_items: row.line_items.0,
            attempts: row.attempts,
            reject_reason: row.reject_reason,
            processor_transaction_id: row.processor_transaction_id,
            cus: row.cus,
            updated_by_webhook: row.updated_by_webhook,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Postgres implementation of [`TransactionStore`]
pub struct PgTransactionStore {
    pool: PgPool,
}

impl PgTransactionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionStore for PgTransactionStore {
    async fn create(&self, transaction: NewTransaction) -> Result<Transaction, DatabaseError> {
        let reference = transaction.reference.clone();
        let tx = transaction.into_pending(Utc::now());

        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "INSERT INTO payment_transactions
             (reference, status, amount_in_cents, currency, customer_email, customer_name,
              customer_phone, customer_document, customer_document_type, payment_method,
              bank_code, bank_name, user_type, line_items, attempts, processor_transaction_id,
              updated_by_webhook)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
             RETURNING {}",
            COLUMNS
        ))
        .bind(&tx.reference)
        .bind(tx.status.as_str())
        .bind(tx.amount_in_cents)
        .bind(&tx.currency)
        .bind(&tx.customer_email)
        .bind(&tx.customer_name)
        .bind(&tx.customer_phone)
        .bind(&tx.customer_document)
        .bind(&tx.customer_document_type)
        .bind(tx.payment_method.as_str())
        .bind(&tx.bank_code)
        .bind(&tx.bank_name)
        .bind(tx.user_type.as_str())
        .bind(Json(&tx.line_items))
        .bind(tx.attempts)
        .bind(&tx.processor_transaction_id)
        .bind(tx.updated_by_webhook)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db) = &e {
                if db.is_unique_violation() {
                    return DatabaseError::duplicate_reference(reference.clone());
                }
            }
            DatabaseError::from_sqlx(e)
        })?;

        Transaction::try_from(row)
    }

    async fn find_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Transaction>, DatabaseError> {
        sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM payment_transactions WHERE reference = $1",
            COLUMNS
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?
        .map(Transaction::try_from)
        .transpose()
    }

    async fn update_status(
        &self,
        reference: &str,
        change: StatusChange,
    ) -> Result<Option<StatusUpdate>, DatabaseError> {
        // Single conditional statement: only a PENDING row moves, and only to
        // a terminal status. Postgres row locking serializes racing writers.
        let updated = sqlx::query_as::<_, TransactionRow>(&format!(
            "UPDATE payment_transactions
             SET status = $2,
                 reject_reason = $3,
                 cus = COALESCE($4, cus),
                 processor_transaction_id = COALESCE($5, processor_transaction_id),
                 updated_by_webhook = $6,
                 updated_at = NOW()
             WHERE reference = $1 AND status = 'PENDING' AND $2 <> 'PENDING'
             RETURNING {}",
            COLUMNS
        ))
        .bind(reference)
        .bind(change.status.as_str())
        .bind(&change.reject_reason)
        .bind(&change.cus)
        .bind(&change.processor_transaction_id)
        .bind(change.source == UpdateSource::Webhook)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if let Some(row) = updated {
            return Ok(Some(StatusUpdate::Applied(Transaction::try_from(row)?)));
        }

        let Some(current) = self.find_by_reference(reference).await? else {
            return Ok(None);
        };

        debug!(
            reference = %reference,
            current = %current.status,
            attempted = %change.status,
            "conditional status update matched no row"
        );

        Ok(Some(match transition(current.status, change.status) {
            Transition::Conflict => StatusUpdate::Conflict {
                current,
                attempted: change.status,
            },
            // A PENDING row only misses the UPDATE when the incoming status is
            // PENDING too.
            Transition::Unchanged | Transition::Apply => StatusUpdate::Unchanged(current),
        }))
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<Transaction>, DatabaseError> {
        sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM payment_transactions ORDER BY created_at DESC, reference DESC LIMIT $1",
            COLUMNS
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?
        .into_iter()
        .map(Transaction::try_from)
        .collect()
    }

    async fn list_pending(
        &self,
        created_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Transaction>, DatabaseError> {
        sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM payment_transactions
             WHERE status = 'PENDING'
               AND created_at < $1
               AND processor_transaction_id IS NOT NULL
             ORDER BY created_at ASC
             LIMIT $2",
            COLUMNS
        ))
        .bind(created_before)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?
        .into_iter()
        .map(Transaction::try_from)
        .collect()
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        crate::database::ping(&self.pool).await
    }
}
