use crate::error::AppError;
use crate::http::handlers::mpesa::{checkout_id, VerifyBody};
use crate::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use uuid::Uuid;

pub async fn start_session(
    State(state): State<AppState>,
    body: Result<Json<VerifyBody>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(body) = body.map_err(|e| AppError::validation(e.body_text()))?;
    let checkout_id = checkout_id(body.receipt)?;
    let session_id = state.verification_sessions.start(checkout_id.clone()).await;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "sessionId": session_id,
            "checkoutRequestId": checkout_id,
            "maxRetries": state.verification_sessions.policy.max_retries,
            "retryDelayMs": state.verification_sessions.policy.delay.as_millis() as u64
        })),
    ))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state
        .verification_sessions
        .status(session_id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Verification session".to_string()))
}

pub async fn cancel_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    if state.verification_sessions.cancel(session_id).await {
        Ok(Json(json!({"sessionId": session_id, "cancelled": true})))
    } else {
        Err(AppError::NotFound("Verification session".to_string()))
    }
}
