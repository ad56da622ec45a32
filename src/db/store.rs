use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::repositories::{CallbackRepository, PaymentRepository};
use crate::error::AppResult;
use crate::models::{
    CallbackEvent, GatewayResult, NewCallbackEvent, NewPayment, Payment, PaymentStatus,
};

/// Persistence seam for payment state. Implementations must make
/// `settle_pending` atomic: only a payment still `pending` may change,
/// and the call returns `None` otherwise.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn create_payment(&self, new: NewPayment) -> AppResult<Payment>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Payment>;

    async fn find_by_txn_ref(&self, txn_ref: &str) -> AppResult<Option<Payment>>;

    async fn settle_pending(
        &self,
        txn_ref: &str,
        status: PaymentStatus,
        result: &GatewayResult,
    ) -> AppResult<Option<Payment>>;

    async fn record_callback(&self, event: NewCallbackEvent) -> AppResult<CallbackEvent>;

    async fn callbacks_for(&self, txn_ref: &str) -> AppResult<Vec<CallbackEvent>>;

    async fn is_healthy(&self) -> bool;
}

pub type SharedPaymentStore = Arc<dyn PaymentStore>;

pub struct PgPaymentStore {
    pool: PgPool,
}

impl PgPaymentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentStore for PgPaymentStore {
    async fn create_payment(&self, new: NewPayment) -> AppResult<Payment> {
        PaymentRepository::create(&self.pool, &new).await
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Payment> {
        PaymentRepository::find_by_id(&self.pool, id).await
    }

    async fn find_by_txn_ref(&self, txn_ref: &str) -> AppResult<Option<Payment>> {
        PaymentRepository::find_by_txn_ref(&self.pool, txn_ref).await
    }

    async fn settle_pending(
        &self,
        txn_ref: &str,
        status: PaymentStatus,
        result: &GatewayResult,
    ) -> AppResult<Option<Payment>> {
        PaymentRepository::settle_pending(&self.pool, txn_ref, status, result).await
    }

    async fn record_callback(&self, event: NewCallbackEvent) -> AppResult<CallbackEvent> {
        CallbackRepository::create(&self.pool, event).await
    }

    async fn callbacks_for(&self, txn_ref: &str) -> AppResult<Vec<CallbackEvent>> {
        CallbackRepository::find_by_txn_ref(&self.pool, txn_ref).await
    }

    async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}
