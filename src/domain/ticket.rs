use crate::domain::lenient;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MPESA_METHOD: &str = "M-PESA";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "M-PESA_INITIATED")]
    MpesaInitiated,
    #[serde(rename = "PAID")]
    Paid,
    #[serde(rename = "FAILED")]
    Failed,
}

impl PaymentStatus {
    pub fn for_method(payment_method: &str) -> Self {
        if payment_method == MPESA_METHOD {
            PaymentStatus::MpesaInitiated
        } else {
            PaymentStatus::Pending
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::MpesaInitiated => "M-PESA_INITIATED",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Failed => "FAILED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub ticket_type: String,
    pub quantity: u32,
    pub amount: f64,
    pub payment_method: String,
    pub purchase_date: DateTime<Utc>,
    pub payment_status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkout_request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mpesa_receipt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewTicket {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub ticket_type: String,
    pub quantity: u32,
    pub amount: f64,
    pub payment_method: String,
}

impl NewTicket {
    pub fn into_ticket(self, id: Uuid, purchase_date: DateTime<Utc>) -> Ticket {
        let payment_status = PaymentStatus::for_method(&self.payment_method);
        Ticket {
            id,
            full_name: self.full_name,
            email: self.email,
            phone: self.phone,
            ticket_type: self.ticket_type,
            quantity: self.quantity,
            amount: self.amount,
            payment_method: self.payment_method,
            purchase_date,
            payment_status,
            checkout_request_id: None,
            merchant_request_id: None,
            mpesa_receipt: None,
            payment_date: None,
            failure_reason: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StatusFields {
    pub mpesa_receipt: Option<String>,
    pub payment_date: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseTicketRequest {
    #[serde(default, deserialize_with = "lenient::string")]
    pub full_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_or_number")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub ticket_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::count")]
    pub quantity: Option<u32>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub payment_method: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub amount: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseTicketResponse {
    pub message: String,
    pub ticket_id: Uuid,
    pub payment_status: PaymentStatus,
}

pub fn validate_purchase(req: &PurchaseTicketRequest) -> Vec<String> {
    let mut errors = Vec::new();

    if is_blank(&req.full_name) {
        errors.push("fullName must be a string".to_string());
    }
    if !req.email.as_deref().is_some_and(is_valid_email) {
        errors.push("Invalid email format".to_string());
    }
    if is_blank(&req.ticket_type) {
        errors.push("ticketType must be a string".to_string());
    }
    if !req.quantity.is_some_and(|q| q > 0) {
        errors.push("quantity must be a positive number".to_string());
    }
    if is_blank(&req.payment_method) {
        errors.push("paymentMethod must be a string".to_string());
    }
    if !req.amount.is_some_and(|a| a.is_finite() && a > 0.0) {
        errors.push("amount must be a positive number".to_string());
    }

    errors
}

fn is_blank(v: &Option<String>) -> bool {
    v.as_deref().map_or(true, |s| s.trim().is_empty())
}

pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    if local.is_empty() {
        return false;
    }
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}
