//! Transaction entity and the status transition rule every store applies.

use crate::payments::types::{LineItem, PaymentMethod, TransactionStatus, UserType};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One checkout attempt, as persisted.
///
/// Everything except `status`, `reject_reason`, `cus`,
/// `processor_transaction_id`, `updated_by_webhook` and `updated_at` is a
/// snapshot taken at creation and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub reference: String,
    pub status: TransactionStatus,
    pub amount_in_cents: i64,
    pub currency: String,
    pub customer_email: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_document: String,
    pub customer_document_type: String,
    pub payment_method: PaymentMethod,
    pub bank_code: String,
    pub bank_name: Option<String>,
    pub user_type: UserType,
    pub line_items: Vec<LineItem>,
    pub attempts: i32,
    pub reject_reason: Option<String>,
    pub processor_transaction_id: Option<String>,
    /// Bank tracking code (CUS) reported once the payer finishes at the bank.
    pub cus: Option<String>,
    pub updated_by_webhook: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Snapshot handed to [`TransactionStore::create`](crate::database::repository::TransactionStore::create).
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub reference: String,
    pub amount_in_cents: i64,
    pub currency: String,
    pub customer_email: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_document: String,
    pub customer_document_type: String,
    pub bank_code: String,
    pub bank_name: Option<String>,
    pub user_type: UserType,
    pub line_items: Vec<LineItem>,
    pub processor_transaction_id: Option<String>,
}

impl NewTransaction {
    /// Every transaction starts out pending, on its first attempt.
    pub fn into_pending(self, now: DateTime<Utc>) -> Transaction {
        Transaction {
            reference: self.reference,
            status: TransactionStatus::Pending,
            amount_in_cents: self.amount_in_cents,
            currency: self.currency,
            customer_email: self.customer_email,
            customer_name: self.customer_name,
            customer_phone: self.customer_phone,
            customer_document: self.customer_document,
            customer_document_type: self.customer_document_type,
            payment_method: PaymentMethod::Pse,
            bank_code: self.bank_code,
            bank_name: self.bank_name,
            user_type: self.user_type,
            line_items: self.line_items,
            attempts: 1,
            reject_reason: None,
            processor_transaction_id: self.processor_transaction_id,
            cus: None,
            updated_by_webhook: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Who is reporting a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateSource {
    /// Signed notification from the processor.
    Webhook,
    /// Our own read-back of the processor transaction.
    ReadBack,
}

/// Requested status mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub status: TransactionStatus,
    pub reject_reason: Option<String>,
    pub cus: Option<String>,
    pub processor_transaction_id: Option<String>,
    pub source: UpdateSource,
}

impl StatusChange {
    pub fn new(status: TransactionStatus, source: UpdateSource) -> Self {
        Self {
            status,
            reject_reason: None,
            cus: None,
            processor_transaction_id: None,
            source,
        }
    }

    /// Reject reasons only make sense for declined transactions; others drop it.
    pub fn with_reject_reason(mut self, reason: Option<String>) -> Self {
        self.reject_reason = if self.status == TransactionStatus::Declined {
            reason.filter(|r| !r.trim().is_empty())
        } else {
            None
        };
        self
    }

    pub fn with_cus(mut self, cus: Option<String>) -> Self {
        self.cus = cus.filter(|c| !c.trim().is_empty());
        self
    }

    pub fn with_processor_transaction_id(mut self, id: Option<String>) -> Self {
        self.processor_transaction_id = id.filter(|i| !i.trim().is_empty());
        self
    }
}

/// What a status mutation did to the stored row.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusUpdate {
    /// The row moved from PENDING to the requested terminal status.
    Applied(Transaction),
    /// The row already had the requested status; nothing was written.
    Unchanged(Transaction),
    /// The row is terminal with a different status and was left untouched.
    Conflict {
        current: Transaction,
        attempted: TransactionStatus,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Apply,
    Unchanged,
    Conflict,
}

/// Monotone transition rule: only PENDING may move, and only to a terminal
/// status.
pub fn transition(current: TransactionStatus, incoming: TransactionStatus) -> Transition {
    if current == incoming {
        Transition::Unchanged
    } else if current.is_terminal() {
        Transition::Conflict
    } else if incoming.is_terminal() {
        Transition::Apply
    } else {
        Transition::Unchanged
    }
}

impl Transaction {
    /// Apply `change` in place under the transition rule. Callers must hold
    /// whatever lock serializes writes for this reference.
    pub fn apply(&mut self, change: &StatusChange, now: DateTime<Utc>) -> StatusUpdate {
        match transition(self.status, change.status) {
            Transition::Apply => {
                self.status = change.status;
                self.reject_reason = change.reject_reason.clone();
                if change.cus.is_some() {
                    self.cus = change.cus.clone();
                }
                if change.processor_transaction_id.is_some() {
                    self.processor_transaction_id = change.processor_transaction_id.clone();
                }
                self.updated_by_webhook = change.source == UpdateSource::Webhook;
                self.updated_at = now;
                StatusUpdate::Applied(self.clone())
            }
            Transition::Unchanged => StatusUpdate::Unchanged(self.clone()),
            Transition::Conflict => StatusUpdate::Conflict {
                current: self.clone(),
                attempted: change.status,
            },
        }
    }
}
