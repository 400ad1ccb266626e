use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::database::transaction::Transaction;
use crate::error::{AppError, AppResult};
use crate::logging::mask_email;
use crate::middleware::error::get_request_id_from_headers;
use crate::payments::types::{LineItem, TransactionStatus, UserType};

/// Transaction as shown to the payer. Contact data is masked and the
/// identity document is left out.
#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionView {
    pub reference: String,
    pub status: TransactionStatus,
    pub amount_in_cents: i64,
    pub currency: String,
    pub customer_email: String,
    pub payment_method: String,
    pub bank_code: String,
    pub bank_name: Option<String>,
    pub user_type: UserType,
    pub line_items: Vec<LineItem>,
    pub attempts: i32,
    pub reject_reason: Option<String>,
    pub cus: Option<String>,
    pub updated_by_webhook: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Transaction> for TransactionView {
    fn from(tx: Transaction) -> Self {
        Self {
            customer_email: mask_email(&tx.customer_email),
            payment_method: tx.payment_method.as_str().to_string(),
            reference: tx.reference,
            status: tx.status,
            amount_in_cents: tx.amount_in_cents,
            currency: tx.currency,
            bank_code: tx.bank_code,
            bank_name: tx.bank_name,
            user_type: tx.user_type,
            line_items: tx.line_items,
            attempts: tx.attempts,
            reject_reason: tx.reject_reason,
            cus: tx.cus,
            updated_by_webhook: tx.updated_by_webhook,
            created_at: tx.created_at,
            updated_at: tx.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecentPayment {
    pub reference: String,
    pub status: TransactionStatus,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// GET /pago/{reference}
pub async fn get_payment_status(
    State(state): State<AppState>,
    Path(reference): Path<String>,
    headers: HeaderMap,
) -> AppResult<Json<TransactionView>> {
    let request_id = get_request_id_from_headers(&headers);

    let transaction = state
        .status
        .get_status(&reference)
        .await
        .map_err(|e| AppError::from(e).with_request_id_opt(request_id.clone()))?
        .ok_or_else(|| AppError::not_found(&reference).with_request_id_opt(request_id))?;

    Ok(Json(transaction.into()))
}

/// GET /pago/recientes?limit=N
pub async fn list_recent_payments(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Vec<RecentPayment>>> {
    let recent = state.status.recent(query.limit).await.map_err(|e| {
        AppError::from(e).with_request_id_opt(get_request_id_from_headers(&headers))
    })?;

    Ok(Json(
        recent
            .into_iter()
            .map(|tx| RecentPayment {
                email: mask_email(&tx.customer_email),
                reference: tx.reference,
                status: tx.status,
                created_at: tx.created_at,
            })
            .collect(),
    ))
}
