#![allow(dead_code)]

use prom_tickets::config::AppConfig;
use prom_tickets::domain::mpesa::StkPush;
use prom_tickets::domain::ticket::NewTicket;
use prom_tickets::gateways::{GatewayError, MpesaGateway};
use prom_tickets::http::routes::router;
use prom_tickets::AppState;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

pub const CHECKOUT_ID: &str = "ws_CO_19122019102036392512345678";

pub fn test_config(dir: &Path, extra: &[(&str, &str)]) -> AppConfig {
    let mut env: HashMap<String, String> = HashMap::new();
    env.insert("DATA_DIR".to_string(), dir.join("data").display().to_string());
    env.insert(
        "PAYMENTS_FILE".to_string(),
        dir.join("payments.json").display().to_string(),
    );
    env.insert("STK_RETRY_DELAY_MS".to_string(), "0".to_string());
    env.insert("VERIFY_RETRY_DELAY_MS".to_string(), "0".to_string());
    env.insert("VERIFY_MAX_RETRIES".to_string(), "3".to_string());
    for (k, v) in extra {
        env.insert(k.to_string(), v.to_string());
    }
    AppConfig::from_lookup(|key| env.get(key).cloned())
}

#[derive(Default)]
pub struct ScriptedGateway {
    pushes: Mutex<VecDeque<Result<Value, GatewayError>>>,
    queries: Mutex<VecDeque<Result<Value, GatewayError>>>,
    pub push_calls: AtomicU32,
    pub query_calls: AtomicU32,
}

impl ScriptedGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_result(&self, result: Result<Value, GatewayError>) {
        self.pushes.lock().unwrap().push_back(result);
    }

    pub fn query_result(&self, result: Result<Value, GatewayError>) {
        self.queries.lock().unwrap().push_back(result);
    }

    pub fn pushes(&self) -> u32 {
        self.push_calls.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> u32 {
        self.query_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl MpesaGateway for ScriptedGateway {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn stk_push(&self, _push: &StkPush) -> Result<Value, GatewayError> {
        self.push_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.pushes.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(accepted_push(CHECKOUT_ID)))
    }

    async fn stk_query(&self, _checkout_request_id: &str) -> Result<Value, GatewayError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.queries.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(still_processing()))
    }
}

pub fn accepted_push(checkout_id: &str) -> Value {
    json!({
        "MerchantRequestID": "29115-34620561-1",
        "CheckoutRequestID": checkout_id,
        "ResponseCode": "0",
        "ResponseDescription": "Success. Request accepted for processing",
        "CustomerMessage": "Success. Request accepted for processing"
    })
}

pub fn still_processing() -> Value {
    json!({
        "requestId": "1234-5678",
        "errorCode": "500.001.1001",
        "errorMessage": "The transaction is being processed"
    })
}

pub fn paid(receipt: &str) -> Value {
    json!({
        "ResponseCode": "0",
        "ResultCode": "0",
        "ResultDesc": "The service request is processed successfully.",
        "MpesaReceiptNumber": receipt
    })
}

pub fn new_ticket(phone: &str, amount: f64, method: &str) -> NewTicket {
    NewTicket {
        full_name: "Jane Doe".to_string(),
        email: "jane@x.com".to_string(),
        phone: phone.to_string(),
        ticket_type: "Regular".to_string(),
        quantity: 2,
        amount,
        payment_method: method.to_string(),
    }
}

pub async fn spawn_app(state: AppState) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    format!("http://{addr}")
}
