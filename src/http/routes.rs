use crate::http::handlers::{mpesa, ops, payments, tickets, verification_sessions};
use crate::AppState;
use axum::routing::{get, post};
use axum::Router;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(ops::health))
        .route("/api/payments", get(payments::catalogue))
        .route("/api/purchase-ticket", post(tickets::purchase_ticket))
        .route("/api/tickets/:ticket_id", get(tickets::get_ticket))
        .route("/stkpush", post(mpesa::stk_push))
        .route("/verify", post(mpesa::verify))
        .route("/callback", post(mpesa::callback))
        .route("/verify/sessions", post(verification_sessions::start_session))
        .route(
            "/verify/sessions/:session_id",
            get(verification_sessions::get_session).delete(verification_sessions::cancel_session),
        )
        .fallback(ops::not_found)
        .with_state(state)
}
