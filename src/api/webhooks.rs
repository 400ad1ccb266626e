use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, info, warn};

use super::AppState;
use crate::payments::signature::SIGNATURE_HEADER;
use crate::services::webhook_processor::{WebhookError, WebhookOutcome};

/// POST /webhook
///
/// The body is taken as raw bytes so the signature is checked against
/// exactly what the processor sent.
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            error!(error = %rejection, "Webhook body unavailable");
            return error_response(&WebhookError::BodyUnavailable);
        }
    };

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    match state.webhooks.process(&body, signature).await {
        Ok(outcome) => {
            match &outcome {
                WebhookOutcome::Applied { reference, status } => {
                    info!(reference = %reference, status = %status, "Webhook applied")
                }
                WebhookOutcome::Conflict {
                    reference,
                    current,
                    attempted,
                } => warn!(
                    reference = %reference,
                    current = %current,
                    attempted = %attempted,
                    "Webhook conflicts with terminal status"
                ),
                _ => info!(outcome = ?outcome, "Webhook acknowledged"),
            }
            (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response()
        }
        Err(e) => {
            match &e {
                WebhookError::InvalidSignature => warn!("Invalid webhook signature"),
                WebhookError::MalformedPayload(reason) => {
                    warn!(reason = %reason, "Malformed webhook payload")
                }
                _ => error!(error = %e, "Webhook processing failed"),
            }
            error_response(&e)
        }
    }
}

fn error_response(err: &WebhookError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = match err {
        WebhookError::InvalidSignature => json!({ "error": "invalid signature" }),
        WebhookError::MalformedPayload(reason) => {
            json!({ "error": "malformed payload", "details": reason })
        }
        _ => json!({ "error": "internal error" }),
    };
    (status, Json(body)).into_response()
}
