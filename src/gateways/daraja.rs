use crate::config::MpesaCredentials;
use crate::domain::mpesa::{
    StkPush, StkPushRequest, StkQueryRequest, ACCOUNT_REFERENCE, TRANSACTION_DESC, TRANSACTION_TYPE,
};
use crate::gateways::token::TokenClient;
use crate::gateways::{classify_error, GatewayError, MpesaGateway, MERCHANT_NOT_FOUND};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

const STK_PUSH_PATH: &str = "/mpesa/stkpush/v1/processrequest";
const STK_QUERY_PATH: &str = "/mpesa/stkpushquery/v1/query";
/// Daraja validates timestamps in East Africa Time.
const PROVIDER_UTC_OFFSET_HOURS: i64 = 3;

pub struct DarajaGateway {
    pub base_url: String,
    pub short_code: String,
    passkey: String,
    pub callback_url: String,
    pub timeout: Duration,
    pub client: reqwest::Client,
    pub token: TokenClient,
}

impl DarajaGateway {
    pub fn new(
        base_url: &str,
        credentials: &MpesaCredentials,
        callback_url: &str,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::new();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            short_code: credentials.short_code.clone(),
            passkey: credentials.passkey.clone(),
            callback_url: callback_url.to_string(),
            timeout,
            token: TokenClient::new(
                base_url.trim_end_matches('/'),
                credentials.consumer_key.clone(),
                credentials.consumer_secret.clone(),
                timeout,
                client.clone(),
            ),
            client,
        }
    }

    async fn post_json<B: Serialize>(&self, path: &str, body: &B) -> Result<(u16, Value), GatewayError> {
        let (status, value) = self.send_json(path, body).await?;
        if status != 401 {
            return Ok((status, value));
        }

        tracing::warn!(path, "provider rejected access token, refreshing");
        self.token.invalidate().await;
        self.send_json(path, body).await
    }

    async fn send_json<B: Serialize>(&self, path: &str, body: &B) -> Result<(u16, Value), GatewayError> {
        let token = self.token.access_token().await?;

        let resp = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .json(body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status().as_u16();
        let text = resp.text().await.map_err(transport_error)?;
        let value = serde_json::from_str::<Value>(&text)
            .unwrap_or_else(|_| Value::String(text.chars().take(200).collect()));
        Ok((status, value))
    }
}

#[async_trait::async_trait]
impl MpesaGateway for DarajaGateway {
    fn name(&self) -> &'static str {
        "daraja"
    }

    async fn stk_push(&self, push: &StkPush) -> Result<Value, GatewayError> {
        let ts = timestamp(Utc::now());
        let body = StkPushRequest {
            business_short_code: self.short_code.clone(),
            password: password(&self.short_code, &self.passkey, &ts),
            timestamp: ts,
            transaction_type: TRANSACTION_TYPE,
            amount: push.amount,
            party_a: push.phone.clone(),
            party_b: self.short_code.clone(),
            phone_number: push.phone.clone(),
            callback_url: self.callback_url.clone(),
            account_reference: ACCOUNT_REFERENCE,
            transaction_desc: TRANSACTION_DESC,
        };

        let (status, value) = self.post_json(STK_PUSH_PATH, &body).await?;
        if !(200..300).contains(&status) {
            return Err(classify_error(status, value));
        }
        if !value.is_object() {
            return Err(GatewayError::Decode(value.to_string()));
        }
        Ok(value)
    }

    async fn stk_query(&self, checkout_request_id: &str) -> Result<Value, GatewayError> {
        let ts = timestamp(Utc::now());
        let body = StkQueryRequest {
            business_short_code: self.short_code.clone(),
            password: password(&self.short_code, &self.passkey, &ts),
            timestamp: ts,
            checkout_request_id: checkout_request_id.to_string(),
        };

        let (status, value) = self.post_json(STK_QUERY_PATH, &body).await?;
        if (200..300).contains(&status) {
            return Ok(value);
        }

        // On the query endpoint this code means the payer has not answered yet.
        if value.get("errorCode").and_then(Value::as_str) == Some(MERCHANT_NOT_FOUND) {
            return Ok(value);
        }

        Err(classify_error(status, value))
    }
}

pub fn timestamp(now: DateTime<Utc>) -> String {
    (now + chrono::Duration::hours(PROVIDER_UTC_OFFSET_HOURS))
        .format("%Y%m%d%H%M%S")
        .to_string()
}

pub fn password(short_code: &str, passkey: &str, timestamp: &str) -> String {
    STANDARD.encode(format!("{short_code}{passkey}{timestamp}"))
}

fn transport_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Transport(e.to_string())
    }
}
