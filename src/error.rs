use crate::domain::phone::InvalidPhoneNumber;
use crate::gateways::GatewayError;
use crate::repo::json_file::StoreError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

pub const PHONE_EXAMPLE: &str = "0712345678";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid input")]
    Validation(Vec<String>),
    #[error("Invalid phone number")]
    InvalidPhone(#[from] InvalidPhoneNumber),
    #[error("{0} not found")]
    NotFound(String),
    #[error("payment provider authentication failed: {0}")]
    UpstreamAuth(String),
    #[error("M-PESA payment failed: {0}")]
    Provider(#[source] GatewayError),
    #[error("storage failure: {0}")]
    Persistence(#[from] StoreError),
    #[error("payment verification timed out after {retries} retries")]
    VerificationTimedOut { retries: u32 },
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(vec![message.into()])
    }
}

impl From<GatewayError> for AppError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::TokenAcquisition(cause) => AppError::UpstreamAuth(cause),
            other => AppError::Provider(other),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
    pub details: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
}

impl ErrorBody {
    fn new(error: &str, code: &'static str, details: Value) -> Self {
        Self {
            error: error.to_string(),
            code,
            details,
            solution: None,
            example: None,
        }
    }

    fn solution(mut self, solution: &str) -> Self {
        self.solution = Some(solution.to_string());
        self
    }

    fn example(mut self, example: &str) -> Self {
        self.example = Some(example.to_string());
        self
    }
}

impl AppError {
    pub fn status_and_body(&self) -> (StatusCode, ErrorBody) {
        match self {
            AppError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                ErrorBody::new("Invalid input", "VALIDATION_ERROR", json!(errors)),
            ),
            AppError::InvalidPhone(e) => (
                StatusCode::BAD_REQUEST,
                ErrorBody::new("Invalid phone number", "INVALID_PHONE_NUMBER", json!(e.to_string()))
                    .example(PHONE_EXAMPLE),
            ),
            AppError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                ErrorBody::new(&format!("{what} not found"), "NOT_FOUND", Value::Null),
            ),
            AppError::UpstreamAuth(_) => (
                StatusCode::BAD_GATEWAY,
                ErrorBody::new(
                    "Payment provider authentication failed",
                    "UPSTREAM_AUTH_ERROR",
                    json!("Failed to get M-PESA token"),
                )
                .solution("Check CONSUMER_KEY and CONSUMER_SECRET."),
            ),
            AppError::Provider(e) => provider_error(e),
            AppError::Persistence(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody::new(
                    "Failed to process request",
                    "PERSISTENCE_ERROR",
                    json!("ticket storage is unavailable"),
                ),
            ),
            AppError::VerificationTimedOut { retries } => (
                StatusCode::GATEWAY_TIMEOUT,
                ErrorBody::new(
                    "Payment verification timed out",
                    "VERIFICATION_TIMEOUT",
                    json!(format!("no final result after {retries} retries")),
                )
                .solution("Please contact support with your M-PESA confirmation message."),
            ),
        }
    }
}

fn provider_error(e: &GatewayError) -> (StatusCode, ErrorBody) {
    match e {
        GatewayError::MerchantNotFound { .. } => (
            StatusCode::BAD_REQUEST,
            ErrorBody::new(
                "M-PESA payment failed",
                "MERCHANT_NOT_FOUND",
                json!("Merchant does not exist. Please check your TILL number configuration."),
            )
            .solution(
                "For sandbox testing, use TILL_NUMBER=174379. For production, ensure your TILL number is registered with Safaricom.",
            ),
        ),
        GatewayError::InvalidTimestamp { .. } => (
            StatusCode::BAD_REQUEST,
            ErrorBody::new(
                "M-PESA payment failed",
                "INVALID_TIMESTAMP",
                json!("Invalid timestamp. Please try again."),
            )
            .solution("This is usually a temporary issue. Please retry the payment."),
        ),
        GatewayError::Timeout => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorBody::new(
                "Payment processing failed",
                "PROVIDER_TIMEOUT",
                json!("M-PESA did not respond in time"),
            ),
        ),
        other => {
            let details = other
                .provider_body()
                .and_then(|b| b.get("errorMessage").cloned())
                .unwrap_or_else(|| json!(other.to_string()));
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody::new("Payment processing failed", "PROVIDER_ERROR", details).solution(
                    "If this error persists, please check your M-PESA credentials and try again.",
                ),
            )
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        if status.is_server_error() {
            tracing::error!(code = body.code, "request failed: {}", self);
        } else {
            tracing::warn!(code = body.code, "request rejected: {}", self);
        }
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_failure_maps_to_upstream_auth() {
        let e: AppError = GatewayError::TokenAcquisition("HTTP 400".to_string()).into();
        let (status, body) = e.status_and_body();
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body.code, "UPSTREAM_AUTH_ERROR");
    }

    #[test]
    fn merchant_error_is_actionable() {
        let e: AppError = GatewayError::MerchantNotFound { body: json!({}) }.into();
        let (status, body) = e.status_and_body();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.solution.unwrap().contains("174379"));
    }

    #[test]
    fn phone_error_carries_example() {
        let e: AppError = crate::domain::phone::normalize("123").unwrap_err().into();
        let (status, body) = e.status_and_body();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.example.as_deref(), Some(PHONE_EXAMPLE));
    }
}
