use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use prom_tickets::config::MpesaCredentials;
use prom_tickets::domain::mpesa::{QueryOutcome, StkPush};
use prom_tickets::gateways::daraja::DarajaGateway;
use prom_tickets::gateways::{GatewayError, MpesaGateway};
use prom_tickets::repo::tickets_repo::TicketsRepo;
use prom_tickets::service::retry_orchestrator::RetryPolicy;
use prom_tickets::service::stk_service::{StkPushBody, StkService};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct FakeDaraja {
    token_status: Mutex<Option<u16>>,
    token_calls: AtomicU32,
    pushes: Mutex<VecDeque<(u16, Value)>>,
    queries: Mutex<VecDeque<(u16, Value)>>,
    last_push: Mutex<Option<Value>>,
    last_auth: Mutex<Option<String>>,
}

type Shared = Arc<FakeDaraja>;

async fn token(State(fake): State<Shared>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    let n = fake.token_calls.fetch_add(1, Ordering::SeqCst) + 1;
    let basic = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(basic.starts_with("Basic "), "token request must use basic auth");

    let status = fake.token_status.lock().unwrap().unwrap_or(200);
    if status != 200 {
        return (
            StatusCode::from_u16(status).unwrap(),
            Json(json!({"errorMessage": "Invalid credentials"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({"access_token": format!("token-{n}"), "expires_in": "3599"})),
    )
}

fn reply(queue: &Mutex<VecDeque<(u16, Value)>>, fallback: Value) -> (StatusCode, Json<Value>) {
    let (status, body) = queue.lock().unwrap().pop_front().unwrap_or((200, fallback));
    (StatusCode::from_u16(status).unwrap(), Json(body))
}

async fn stk_push(State(fake): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    *fake.last_auth.lock().unwrap() = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);
    *fake.last_push.lock().unwrap() = Some(body);
    reply(
        &fake.pushes,
        json!({
            "MerchantRequestID": "29115-34620561-1",
            "CheckoutRequestID": "ws_CO_19122019102036392512345678",
            "ResponseCode": "0",
            "ResponseDescription": "Success. Request accepted for processing"
        }),
    )
}

async fn stk_query(State(fake): State<Shared>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    assert!(body.get("CheckoutRequestID").is_some());
    reply(
        &fake.queries,
        json!({"ResponseCode": "0", "ResultCode": "0", "ResultDesc": "The service request is processed successfully."}),
    )
}

async fn start_fake() -> (Shared, DarajaGateway) {
    let fake: Shared = Arc::new(FakeDaraja::default());
    let app = Router::new()
        .route("/oauth/v1/generate", get(token))
        .route("/mpesa/stkpush/v1/processrequest", post(stk_push))
        .route("/mpesa/stkpushquery/v1/query", post(stk_query))
        .with_state(fake.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let creds = MpesaCredentials {
        consumer_key: "key".to_string(),
        consumer_secret: "secret".to_string(),
        short_code: "174379".to_string(),
        passkey: "passkey".to_string(),
    };
    let gateway = DarajaGateway::new(
        &format!("http://{addr}/"),
        &creds,
        "https://example.test/callback",
        Duration::from_secs(5),
    );
    (fake, gateway)
}

fn push() -> StkPush {
    StkPush {
        phone: "254712345678".to_string(),
        amount: 2000,
    }
}

#[tokio::test]
async fn push_sends_signed_request_and_reuses_token() {
    let (fake, gateway) = start_fake().await;

    let resp = gateway.stk_push(&push()).await.unwrap();
    assert_eq!(resp["ResponseCode"], "0");
    gateway.stk_push(&push()).await.unwrap();

    assert_eq!(fake.token_calls.load(Ordering::SeqCst), 1);
    assert_eq!(fake.last_auth.lock().unwrap().as_deref(), Some("Bearer token-1"));

    let sent = fake.last_push.lock().unwrap().clone().unwrap();
    let ts = sent["Timestamp"].as_str().unwrap();
    assert_eq!(ts.len(), 14);
    let password = STANDARD.decode(sent["Password"].as_str().unwrap()).unwrap();
    assert_eq!(String::from_utf8(password).unwrap(), format!("174379passkey{ts}"));
    assert_eq!(sent["BusinessShortCode"], "174379");
    assert_eq!(sent["PartyB"], "174379");
    assert_eq!(sent["PartyA"], "254712345678");
    assert_eq!(sent["PhoneNumber"], "254712345678");
    assert_eq!(sent["Amount"], 2000);
    assert_eq!(sent["TransactionType"], "CustomerPayBillOnline");
    assert_eq!(sent["CallBackURL"], "https://example.test/callback");
    assert_eq!(sent["AccountReference"], "PROM2025");
}

#[tokio::test]
async fn push_maps_provider_error_codes() {
    let (fake, gateway) = start_fake().await;
    fake.pushes.lock().unwrap().extend([
        (500, json!({"errorCode": "500.001.1001", "errorMessage": "Merchant does not exist"})),
        (400, json!({"errorCode": "400.002.02", "errorMessage": "Bad Request - Invalid Timestamp"})),
        (503, json!({"errorCode": "503.001.01", "errorMessage": "Service unavailable"})),
    ]);

    assert!(matches!(
        gateway.stk_push(&push()).await,
        Err(GatewayError::MerchantNotFound { .. })
    ));
    assert!(matches!(
        gateway.stk_push(&push()).await,
        Err(GatewayError::InvalidTimestamp { .. })
    ));
    assert!(matches!(
        gateway.stk_push(&push()).await,
        Err(GatewayError::Rejected { status: 503, .. })
    ));
}

#[tokio::test]
async fn unauthorized_response_refreshes_token_and_resends() {
    let (fake, gateway) = start_fake().await;
    fake.pushes
        .lock()
        .unwrap()
        .push_back((401, json!({"errorMessage": "Invalid Access Token"})));

    let resp = gateway.stk_push(&push()).await.unwrap();
    assert_eq!(resp["ResponseCode"], "0");

    assert_eq!(fake.token_calls.load(Ordering::SeqCst), 2);
    assert_eq!(fake.last_auth.lock().unwrap().as_deref(), Some("Bearer token-2"));
}

#[tokio::test]
async fn push_service_survives_expired_token() {
    let dir = tempfile::tempdir().unwrap();
    let (fake, gateway) = start_fake().await;
    fake.pushes
        .lock()
        .unwrap()
        .push_back((401, json!({"errorMessage": "Invalid Access Token"})));
    let service = StkService {
        gateway: Arc::new(gateway),
        tickets_repo: TicketsRepo::new(dir.path().join("tickets.json")),
        retry: RetryPolicy {
            max_attempts: 1,
            delay: Duration::ZERO,
        },
    };

    let resp = service
        .initiate(StkPushBody {
            phone: Some("0712345678".to_string()),
            amount: Some(2000.0),
            ticket_id: None,
        })
        .await
        .unwrap();
    assert_eq!(resp["CheckoutRequestID"], "ws_CO_19122019102036392512345678");
}

#[tokio::test]
async fn repeated_unauthorized_is_reported() {
    let (fake, gateway) = start_fake().await;
    for _ in 0..2 {
        fake.pushes
            .lock()
            .unwrap()
            .push_back((401, json!({"errorMessage": "Invalid Access Token"})));
    }

    assert!(matches!(
        gateway.stk_push(&push()).await,
        Err(GatewayError::Rejected { status: 401, .. })
    ));
    assert_eq!(fake.token_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn rejected_credentials_are_a_token_error() {
    let (fake, gateway) = start_fake().await;
    *fake.token_status.lock().unwrap() = Some(400);

    let err = gateway.stk_push(&push()).await.unwrap_err();
    assert!(matches!(err, GatewayError::TokenAcquisition(_)));
    assert!(fake.last_push.lock().unwrap().is_none());
}

#[tokio::test]
async fn query_still_processing_is_pending_not_error() {
    let (fake, gateway) = start_fake().await;
    fake.queries.lock().unwrap().push_back((
        500,
        json!({"requestId": "1234-5678", "errorCode": "500.001.1001", "errorMessage": "The transaction is being processed"}),
    ));

    let resp = gateway.stk_query("ws_CO_19122019102036392512345678").await.unwrap();
    assert_eq!(QueryOutcome::classify(&resp), QueryOutcome::Pending);

    let resp = gateway.stk_query("ws_CO_19122019102036392512345678").await.unwrap();
    assert_eq!(QueryOutcome::classify(&resp), QueryOutcome::Succeeded { receipt: None });
}

#[tokio::test]
async fn query_other_errors_are_reported() {
    let (fake, gateway) = start_fake().await;
    fake.queries
        .lock()
        .unwrap()
        .push_back((400, json!({"errorCode": "400.002.02", "errorMessage": "Invalid Timestamp"})));

    assert!(matches!(
        gateway.stk_query("ws_CO_19122019102036392512345678").await,
        Err(GatewayError::InvalidTimestamp { .. })
    ));
}

#[tokio::test]
async fn unreachable_provider_is_transient() {
    let creds = MpesaCredentials {
        consumer_key: "key".to_string(),
        consumer_secret: "secret".to_string(),
        short_code: "174379".to_string(),
        passkey: "passkey".to_string(),
    };
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let gateway = DarajaGateway::new(&format!("http://{addr}"), &creds, "http://cb", Duration::from_secs(2));
    let err = gateway.stk_push(&push()).await.unwrap_err();
    assert!(matches!(err, GatewayError::TokenAcquisition(_)));
    assert!(err.is_transient());
}
