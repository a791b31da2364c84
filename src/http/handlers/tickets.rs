use crate::domain::ticket::{PurchaseTicketRequest, PurchaseTicketResponse};
use crate::error::AppError;
use crate::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use uuid::Uuid;

pub async fn purchase_ticket(
    State(state): State<AppState>,
    body: Result<Json<PurchaseTicketRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = body.map_err(|e| AppError::validation(e.body_text()))?;
    let ticket = state.purchase_service.purchase(req).await?;

    Ok((
        StatusCode::CREATED,
        Json(PurchaseTicketResponse {
            message: "Ticket purchase initiated!".to_string(),
            ticket_id: ticket.id,
            payment_status: ticket.payment_status,
        }),
    ))
}

pub async fn get_ticket(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let ticket = state
        .tickets_repo
        .find_by_id(ticket_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Ticket".to_string()))?;
    Ok(Json(ticket))
}
