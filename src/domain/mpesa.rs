use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const TRANSACTION_TYPE: &str = "CustomerPayBillOnline";
pub const ACCOUNT_REFERENCE: &str = "PROM2025";
pub const TRANSACTION_DESC: &str = "Prom Tickets";
pub const CHECKOUT_ID_LEN: usize = 32;

#[derive(Debug, Clone, Serialize)]
pub struct StkPushRequest {
    #[serde(rename = "BusinessShortCode")]
    pub business_short_code: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "TransactionType")]
    pub transaction_type: &'static str,
    #[serde(rename = "Amount")]
    pub amount: u64,
    #[serde(rename = "PartyA")]
    pub party_a: String,
    #[serde(rename = "PartyB")]
    pub party_b: String,
    #[serde(rename = "PhoneNumber")]
    pub phone_number: String,
    #[serde(rename = "CallBackURL")]
    pub callback_url: String,
    #[serde(rename = "AccountReference")]
    pub account_reference: &'static str,
    #[serde(rename = "TransactionDesc")]
    pub transaction_desc: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct StkQueryRequest {
    #[serde(rename = "BusinessShortCode")]
    pub business_short_code: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
}

#[derive(Debug, Clone)]
pub struct StkPush {
    pub phone: String,
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryOutcome {
    Succeeded { receipt: Option<String> },
    ProviderFailed { code: i64, description: String },
    Pending,
}

impl QueryOutcome {
    pub fn classify(resp: &Value) -> Self {
        match resp.get("ResultCode").and_then(parse_result_code) {
            Some(0) => QueryOutcome::Succeeded {
                receipt: str_field(resp, "MpesaReceiptNumber"),
            },
            Some(code) => QueryOutcome::ProviderFailed {
                code,
                description: str_field(resp, "ResultDesc")
                    .or_else(|| str_field(resp, "ResultDescription"))
                    .unwrap_or_else(|| "payment was not completed".to_string()),
            },
            None => QueryOutcome::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, QueryOutcome::Pending)
    }
}

pub fn parse_result_code(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn str_field(v: &Value, key: &str) -> Option<String> {
    v.get(key).and_then(Value::as_str).map(ToString::to_string)
}

pub fn request_ids(resp: &Value) -> (Option<String>, Option<String>) {
    (
        str_field(resp, "CheckoutRequestID"),
        str_field(resp, "MerchantRequestID"),
    )
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackEnvelope {
    #[serde(rename = "Body")]
    pub body: CallbackBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackBody {
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID", default)]
    pub merchant_request_id: Option<String>,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResultCode")]
    pub result_code: Value,
    #[serde(rename = "ResultDesc", default)]
    pub result_desc: Option<String>,
    #[serde(rename = "CallbackMetadata", default)]
    pub callback_metadata: Option<CallbackMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item", default)]
    pub items: Vec<CallbackItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value", default)]
    pub value: Option<Value>,
}

impl StkCallback {
    pub fn metadata(&self, name: &str) -> Option<&Value> {
        self.callback_metadata
            .as_ref()?
            .items
            .iter()
            .find(|item| item.name == name)?
            .value
            .as_ref()
    }

    pub fn outcome(&self) -> QueryOutcome {
        match parse_result_code(&self.result_code) {
            Some(0) => QueryOutcome::Succeeded {
                receipt: self
                    .metadata("MpesaReceiptNumber")
                    .and_then(Value::as_str)
                    .map(ToString::to_string),
            },
            Some(code) => QueryOutcome::ProviderFailed {
                code,
                description: self
                    .result_desc
                    .clone()
                    .unwrap_or_else(|| "payment was not completed".to_string()),
            },
            None => QueryOutcome::Pending,
        }
    }
}
