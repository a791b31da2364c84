use crate::domain::ticket::{NewTicket, PaymentStatus, StatusFields, Ticket};
use crate::repo::json_file::{JsonFile, StoreError};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Clone)]
pub struct TicketsRepo {
    pub file: JsonFile<Ticket>,
}

impl TicketsRepo {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: JsonFile::new(path),
        }
    }

    pub async fn create(&self, new_ticket: NewTicket) -> Result<Ticket, StoreError> {
        let ticket = new_ticket.into_ticket(Uuid::new_v4(), Utc::now());
        self.file.append(ticket).await
    }

    pub async fn list(&self) -> Result<Vec<Ticket>, StoreError> {
        self.file.load().await
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Ticket>, StoreError> {
        Ok(self.file.load().await?.into_iter().find(|t| t.id == id))
    }

    pub async fn find_by_status(&self, status: PaymentStatus) -> Result<Vec<Ticket>, StoreError> {
        Ok(self
            .file
            .load()
            .await?
            .into_iter()
            .filter(|t| t.payment_status == status)
            .collect())
    }

    pub async fn find_awaiting_verification(&self) -> Result<Vec<Ticket>, StoreError> {
        Ok(self
            .find_by_status(PaymentStatus::MpesaInitiated)
            .await?
            .into_iter()
            .filter(|t| t.checkout_request_id.is_some())
            .collect())
    }

    /// A FAILED ticket is reopened so the payer can try again.
    pub async fn attach_checkout(
        &self,
        ticket_id: Uuid,
        checkout_request_id: &str,
        merchant_request_id: Option<&str>,
    ) -> Result<Option<Ticket>, StoreError> {
        let updated = self
            .file
            .update_where(
                |t| t.id == ticket_id && accepts_push(t),
                |t| link(t, checkout_request_id, merchant_request_id),
            )
            .await?;
        Ok(updated.into_iter().next())
    }

    pub async fn attach_checkout_by_payer(
        &self,
        phone: &str,
        amount: u64,
        checkout_request_id: &str,
        merchant_request_id: Option<&str>,
    ) -> Result<Option<Ticket>, StoreError> {
        self.file
            .update_last_where(
                |t| {
                    let open = match t.payment_status {
                        PaymentStatus::MpesaInitiated => t.checkout_request_id.is_none(),
                        PaymentStatus::Failed => true,
                        _ => false,
                    };
                    open && t.phone == phone && t.amount.round() as u64 == amount
                },
                |t| link(t, checkout_request_id, merchant_request_id),
            )
            .await
    }

    pub async fn update_status<P>(
        &self,
        predicate: P,
        new_status: PaymentStatus,
        fields: StatusFields,
    ) -> Result<Vec<Ticket>, StoreError>
    where
        P: Fn(&Ticket) -> bool,
    {
        self.file
            .update_where(predicate, |t| {
                t.payment_status = new_status;
                if let Some(receipt) = &fields.mpesa_receipt {
                    t.mpesa_receipt = Some(receipt.clone());
                }
                if let Some(paid_at) = fields.payment_date {
                    t.payment_date = Some(paid_at);
                }
                if let Some(reason) = &fields.failure_reason {
                    t.failure_reason = Some(reason.clone());
                }
            })
            .await
    }

    pub async fn mark_paid(
        &self,
        checkout_request_id: &str,
        receipt: &str,
        paid_at: DateTime<Utc>,
    ) -> Result<Vec<Ticket>, StoreError> {
        self.update_status(
            |t| awaiting(t, checkout_request_id),
            PaymentStatus::Paid,
            StatusFields {
                mpesa_receipt: Some(receipt.to_string()),
                payment_date: Some(paid_at),
                failure_reason: None,
            },
        )
        .await
    }

    pub async fn mark_failed(
        &self,
        checkout_request_id: &str,
        reason: &str,
    ) -> Result<Vec<Ticket>, StoreError> {
        self.update_status(
            |t| awaiting(t, checkout_request_id),
            PaymentStatus::Failed,
            StatusFields {
                failure_reason: Some(reason.to_string()),
                ..StatusFields::default()
            },
        )
        .await
    }
}

pub fn accepts_push(ticket: &Ticket) -> bool {
    matches!(
        ticket.payment_status,
        PaymentStatus::MpesaInitiated | PaymentStatus::Failed
    )
}

fn link(ticket: &mut Ticket, checkout_request_id: &str, merchant_request_id: Option<&str>) {
    ticket.payment_status = PaymentStatus::MpesaInitiated;
    ticket.checkout_request_id = Some(checkout_request_id.to_string());
    ticket.merchant_request_id = merchant_request_id.map(ToString::to_string);
    ticket.failure_reason = None;
}

fn awaiting(ticket: &Ticket, checkout_request_id: &str) -> bool {
    ticket.payment_status == PaymentStatus::MpesaInitiated
        && ticket.checkout_request_id.as_deref() == Some(checkout_request_id)
}
