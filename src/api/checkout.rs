use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    Json,
};
use tracing::info;

use super::AppState;
use crate::error::{AppError, AppErrorKind, AppResult, ValidationError};
use crate::middleware::error::get_request_id_from_headers;
use crate::payments::types::FinancialInstitution;
use crate::services::payment_orchestrator::{CheckoutRequest, CheckoutSession};

/// POST /pago/pse
pub async fn create_pse_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> AppResult<Json<CheckoutSession>> {
    let request_id = get_request_id_from_headers(&headers);

    let Json(request) = payload.map_err(|rejection| {
        AppError::new(AppErrorKind::Validation(ValidationError::InvalidField {
            field: "body".to_string(),
            reason: rejection.body_text(),
        }))
        .with_request_id_opt(request_id.clone())
    })?;

    let session = state
        .orchestrator
        .initiate(request)
        .await
        .map_err(|e| AppError::from(e).with_request_id_opt(request_id.clone()))?;

    info!(
        reference = %session.reference,
        request_id = ?request_id,
        "Checkout session created"
    );

    Ok(Json(session))
}

/// GET /pago/bancos
pub async fn list_banks(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<Vec<FinancialInstitution>>> {
    let banks = state.orchestrator.list_banks().await.map_err(|e| {
        AppError::from(e).with_request_id_opt(get_request_id_from_headers(&headers))
    })?;
    Ok(Json(banks))
}
