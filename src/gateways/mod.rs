use crate::domain::mpesa::StkPush;
use serde_json::Value;
use thiserror::Error;

pub mod daraja;
pub mod simulated;
pub mod token;

pub const MERCHANT_NOT_FOUND: &str = "500.001.1001";
pub const INVALID_TIMESTAMP: &str = "400.002.02";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to get M-PESA token: {0}")]
    TokenAcquisition(String),
    #[error("merchant does not exist")]
    MerchantNotFound { body: Value },
    #[error("invalid timestamp")]
    InvalidTimestamp { body: Value },
    #[error("provider rejected request with HTTP {status}")]
    Rejected { status: u16, body: Value },
    #[error("provider request timed out")]
    Timeout,
    #[error("provider unreachable: {0}")]
    Transport(String),
    #[error("unreadable provider response: {0}")]
    Decode(String),
}

impl GatewayError {
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::Timeout | GatewayError::Transport(_) | GatewayError::InvalidTimestamp { .. } => true,
            GatewayError::Rejected { status, .. } => *status >= 500,
            GatewayError::TokenAcquisition(_) => true,
            GatewayError::MerchantNotFound { .. } | GatewayError::Decode(_) => false,
        }
    }

    pub fn provider_body(&self) -> Option<&Value> {
        match self {
            GatewayError::MerchantNotFound { body }
            | GatewayError::InvalidTimestamp { body }
            | GatewayError::Rejected { body, .. } => Some(body),
            _ => None,
        }
    }
}

pub fn classify_error(status: u16, body: Value) -> GatewayError {
    match body.get("errorCode").and_then(Value::as_str) {
        Some(MERCHANT_NOT_FOUND) => GatewayError::MerchantNotFound { body },
        Some(INVALID_TIMESTAMP) => GatewayError::InvalidTimestamp { body },
        _ => GatewayError::Rejected { status, body },
    }
}

#[async_trait::async_trait]
pub trait MpesaGateway: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_simulated(&self) -> bool {
        false
    }

    async fn stk_push(&self, push: &StkPush) -> Result<Value, GatewayError>;

    async fn stk_query(&self, checkout_request_id: &str) -> Result<Value, GatewayError>;
}
