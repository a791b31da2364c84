use crate::domain::mpesa::StkPush;
use crate::gateways::{GatewayError, MpesaGateway};
use chrono::Utc;
use serde_json::{json, Value};

pub const SIMULATED_MERCHANT_REQUEST_ID: &str = "29115-34620561-1";

#[derive(Debug, Clone, Default)]
pub struct SimulatedGateway;

impl SimulatedGateway {
    pub fn checkout_request_id() -> String {
        let suffix = uuid::Uuid::new_v4().as_u128() % 1_000_000_000;
        format!("ws_CO_{}{:09}", Utc::now().format("%d%m%Y%H%M%S%3f"), suffix)
    }
}

#[async_trait::async_trait]
impl MpesaGateway for SimulatedGateway {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn is_simulated(&self) -> bool {
        true
    }

    async fn stk_push(&self, push: &StkPush) -> Result<Value, GatewayError> {
        tracing::info!(phone = %push.phone, amount = push.amount, "simulated STK push");
        Ok(json!({
            "MerchantRequestID": SIMULATED_MERCHANT_REQUEST_ID,
            "CheckoutRequestID": Self::checkout_request_id(),
            "ResponseCode": "0",
            "ResponseDescription": "Success (Simulation Mode)",
            "CustomerMessage": "Success. Request accepted for processing"
        }))
    }

    async fn stk_query(&self, checkout_request_id: &str) -> Result<Value, GatewayError> {
        Ok(json!({
            "ResponseCode": "0",
            "CheckoutRequestID": checkout_request_id,
            "ResultCode": "0",
            "ResultDesc": "Success (Simulation Mode)",
            "MpesaReceiptNumber": format!("SIM{}", Utc::now().timestamp_millis())
        }))
    }
}
