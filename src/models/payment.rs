use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::vnpay::to_minor_units;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

/// One payment attempt for a storefront order, keyed by the gateway
/// transaction reference.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: String,
    pub txn_ref: String,
    /// VND, major units.
    pub amount: i64,
    pub status: PaymentStatus,
    pub order_info: String,
    pub client_ip: String,
    pub create_date: String,
    pub transaction_no: Option<String>,
    pub response_code: Option<String>,
    pub bank_code: Option<String>,
    pub pay_date: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn amount_minor(&self) -> AppResult<u64> {
        to_minor_units(self.amount)
    }
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub order_id: String,
    pub txn_ref: String,
    pub amount: i64,
    pub order_info: String,
    pub client_ip: String,
    pub create_date: String,
}

/// Gateway-reported details stored when a payment leaves `pending`.
#[derive(Debug, Clone, Default)]
pub struct GatewayResult {
    pub transaction_no: Option<String>,
    pub response_code: String,
    pub bank_code: Option<String>,
    pub pay_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub order_id: String,
    pub txn_ref: String,
    pub status: PaymentStatus,
    pub amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_no: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<Payment> for PaymentResponse {
    fn from(payment: Payment) -> Self {
        Self {
            id: payment.id,
            order_id: payment.order_id,
            txn_ref: payment.txn_ref,
            status: payment.status,
            amount: payment.amount,
            transaction_no: payment.transaction_no,
            response_code: payment.response_code,
            completed_at: payment.completed_at,
            created_at: payment.created_at,
        }
    }
}
