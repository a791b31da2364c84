use crate::domain::lenient;
use crate::domain::mpesa::{CallbackEnvelope, CHECKOUT_ID_LEN};
use crate::error::AppError;
use crate::service::stk_service::StkPushBody;
use crate::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct VerifyBody {
    #[serde(default, deserialize_with = "lenient::string")]
    pub receipt: Option<String>,
}

pub async fn stk_push(
    State(state): State<AppState>,
    body: Result<Json<StkPushBody>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(body) = body.map_err(|e| AppError::validation(e.body_text()))?;
    let resp = state.stk_service.initiate(body).await?;
    Ok(Json(resp))
}

pub async fn verify(
    State(state): State<AppState>,
    body: Result<Json<VerifyBody>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(body) = body.map_err(|e| AppError::validation(e.body_text()))?;
    let checkout_id = checkout_id(body.receipt)?;
    let (resp, _) = state.verification_service.verify_once(&checkout_id).await?;
    Ok(Json(resp))
}

/// The body is only a trigger; tickets move on the provider's own answer.
pub async fn callback(
    State(state): State<AppState>,
    body: Result<Json<CallbackEnvelope>, JsonRejection>,
) -> impl IntoResponse {
    match body {
        Ok(Json(envelope)) => {
            let cb = envelope.body.stk_callback;
            tracing::info!(
                checkout_id = %cb.checkout_request_id,
                claimed = ?cb.outcome(),
                "M-PESA callback received"
            );
            match state.verification_service.verify_once(&cb.checkout_request_id).await {
                Ok((_, rec)) => {
                    tracing::info!(checkout_id = %cb.checkout_request_id, outcome = ?rec.outcome, "callback confirmed with provider")
                }
                Err(e) => {
                    tracing::error!(checkout_id = %cb.checkout_request_id, "failed to confirm callback: {}", e)
                }
            }
        }
        Err(e) => tracing::warn!("ignoring malformed M-PESA callback: {}", e.body_text()),
    }

    Json(json!({"ResultCode": 0, "ResultDesc": "Accepted"}))
}

pub fn checkout_id(receipt: Option<String>) -> Result<String, AppError> {
    match receipt {
        Some(id) if id.len() == CHECKOUT_ID_LEN => Ok(id),
        _ => Err(AppError::validation("Invalid CheckoutRequestID format")),
    }
}
