use crate::domain::mpesa::{request_ids, StkPush};
use crate::domain::{lenient, phone};
use crate::error::AppError;
use crate::gateways::MpesaGateway;
use crate::repo::tickets_repo::{accepts_push, TicketsRepo};
use crate::service::retry_orchestrator::{retry_fixed, RetryPolicy};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StkPushBody {
    #[serde(default, deserialize_with = "lenient::string_or_number")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub amount: Option<f64>,
    pub ticket_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct StkService {
    pub gateway: Arc<dyn MpesaGateway>,
    pub tickets_repo: TicketsRepo,
    pub retry: RetryPolicy,
}

impl StkService {
    pub async fn initiate(&self, body: StkPushBody) -> Result<Value, AppError> {
        let amount = whole_shillings(body.amount)
            .ok_or_else(|| AppError::validation("Amount must be a positive number"))?;
        let phone = phone::normalize(body.phone.as_deref().unwrap_or_default())?;

        if let Some(ticket_id) = body.ticket_id {
            let ticket = self
                .tickets_repo
                .find_by_id(ticket_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Ticket".to_string()))?;
            if !accepts_push(&ticket) {
                return Err(AppError::validation(format!(
                    "Ticket is {}, not awaiting M-PESA payment",
                    ticket.payment_status.as_str()
                )));
            }
        }

        let push = StkPush { phone, amount };
        tracing::info!(
            gateway = self.gateway.name(),
            phone = %push.phone,
            amount,
            "initiating M-PESA STK push"
        );

        let push_ref = &push;
        let resp = retry_fixed(&self.retry, |attempt| {
            tracing::debug!(attempt, "sending STK push");
            self.gateway.stk_push(push_ref)
        })
        .await?;

        let (checkout_id, merchant_id) = request_ids(&resp);
        match (body.ticket_id, checkout_id) {
            (Some(ticket_id), Some(checkout_id)) => {
                let linked = self
                    .tickets_repo
                    .attach_checkout(ticket_id, &checkout_id, merchant_id.as_deref())
                    .await?;
                if linked.is_some() {
                    tracing::info!(%ticket_id, %checkout_id, "STK push linked to ticket");
                } else {
                    tracing::warn!(%ticket_id, %checkout_id, "ticket changed state before it could be linked");
                }
            }
            (None, Some(checkout_id)) => {
                let linked = self
                    .tickets_repo
                    .attach_checkout_by_payer(&push.phone, push.amount, &checkout_id, merchant_id.as_deref())
                    .await?;
                match linked {
                    Some(ticket) => {
                        tracing::info!(ticket_id = %ticket.id, %checkout_id, "STK push linked to ticket by payer")
                    }
                    None => tracing::warn!(%checkout_id, "no in-flight ticket matches this STK push"),
                }
            }
            (_, None) => {
                tracing::warn!("provider response carried no CheckoutRequestID");
            }
        }

        Ok(resp)
    }
}

fn whole_shillings(amount: Option<f64>) -> Option<u64> {
    let amount = amount.filter(|a| a.is_finite() && *a > 0.0)?;
    let rounded = amount.round();
    (rounded >= 1.0).then_some(rounded as u64)
}
