use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::db::PaymentStore;
use crate::error::{AppError, AppResult};
use crate::models::{
    CallbackEvent, GatewayResult, NewCallbackEvent, NewPayment, Payment, PaymentStatus,
};

/// Process-local store for development and tests. Payments are keyed by
/// transaction reference; the shard lock held by `get_mut` makes
/// `settle_pending` a compare-and-swap.
#[derive(Default)]
pub struct InMemoryPaymentStore {
    payments: DashMap<String, Payment>,
    ids: DashMap<Uuid, String>,
    callbacks: DashMap<Uuid, CallbackEvent>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn create_payment(&self, new: NewPayment) -> AppResult<Payment> {
        let now = Utc::now();

        match self.payments.entry(new.txn_ref.clone()) {
            Entry::Occupied(_) => Err(AppError::Payment(format!(
                "Transaction reference {} already exists",
                new.txn_ref
            ))),
            Entry::Vacant(slot) => {
                let payment = Payment {
                    id: Uuid::new_v4(),
                    order_id: new.order_id,
                    txn_ref: new.txn_ref,
                    amount: new.amount,
                    status: PaymentStatus::Pending,
                    order_info: new.order_info,
                    client_ip: new.client_ip,
                    create_date: new.create_date,
                    transaction_no: None,
                    response_code: None,
                    bank_code: None,
                    pay_date: None,
                    completed_at: None,
                    created_at: now,
                    updated_at: now,
                };
                self.ids.insert(payment.id, payment.txn_ref.clone());
                slot.insert(payment.clone());
                Ok(payment)
            }
        }
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Payment> {
        self.ids
            .get(&id)
            .and_then(|txn_ref| self.payments.get(txn_ref.value()).map(|p| p.clone()))
            .ok_or_else(|| AppError::NotFound(format!("Payment {} not found", id)))
    }

    async fn find_by_txn_ref(&self, txn_ref: &str) -> AppResult<Option<Payment>> {
        Ok(self.payments.get(txn_ref).map(|p| p.clone()))
    }

    async fn settle_pending(
        &self,
        txn_ref: &str,
        status: PaymentStatus,
        result: &GatewayResult,
    ) -> AppResult<Option<Payment>> {
        let Some(mut payment) = self.payments.get_mut(txn_ref) else {
            return Ok(None);
        };

        if payment.status != PaymentStatus::Pending {
            return Ok(None);
        }

        let now = Utc::now();
        payment.status = status;
        payment.transaction_no = result.transaction_no.clone();
        payment.response_code = Some(result.response_code.clone());
        payment.bank_code = result.bank_code.clone();
        payment.pay_date = result.pay_date.clone();
        payment.completed_at = (status == PaymentStatus::Completed).then_some(now);
        payment.updated_at = now;

        Ok(Some(payment.clone()))
    }

    async fn record_callback(&self, event: NewCallbackEvent) -> AppResult<CallbackEvent> {
        let event = CallbackEvent::from_new(event);
        self.callbacks.insert(event.id, event.clone());
        Ok(event)
    }

    async fn callbacks_for(&self, txn_ref: &str) -> AppResult<Vec<CallbackEvent>> {
        let mut events: Vec<CallbackEvent> = self
            .callbacks
            .iter()
            .filter(|e| e.txn_ref.as_deref() == Some(txn_ref))
            .map(|e| e.value().clone())
            .collect();
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(events)
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}
