use crate::domain::phone;
use crate::domain::ticket::{validate_purchase, NewTicket, PurchaseTicketRequest, Ticket};
use crate::error::AppError;
use crate::repo::tickets_repo::TicketsRepo;

#[derive(Clone)]
pub struct PurchaseService {
    pub tickets_repo: TicketsRepo,
}

impl PurchaseService {
    pub async fn purchase(&self, req: PurchaseTicketRequest) -> Result<Ticket, AppError> {
        let errors = validate_purchase(&req);
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        let phone = phone::normalize(req.phone.as_deref().unwrap_or_default())?;

        // validate_purchase has already checked every field below
        let new_ticket = NewTicket {
            full_name: req.full_name.unwrap_or_default().trim().to_string(),
            email: req.email.unwrap_or_default(),
            phone,
            ticket_type: req.ticket_type.unwrap_or_default(),
            quantity: req.quantity.unwrap_or_default(),
            amount: req.amount.unwrap_or_default(),
            payment_method: req.payment_method.unwrap_or_default(),
        };

        let ticket = self.tickets_repo.create(new_ticket).await?;
        tracing::info!(
            ticket_id = %ticket.id,
            status = ticket.payment_status.as_str(),
            "ticket purchase recorded"
        );
        Ok(ticket)
    }
}
