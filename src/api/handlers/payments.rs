use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::db::PaymentStore;
use crate::error::AppResult;
use crate::models::{CallbackEvent, PaymentResponse};
use crate::services::ReconcileResult;
use crate::AppState;

pub async fn get_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
) -> AppResult<Json<PaymentResponse>> {
    let payment = state.store.find_by_id(payment_id).await?;
    Ok(Json(payment.into()))
}

pub async fn get_payment_callbacks(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
) -> AppResult<Json<Vec<CallbackEvent>>> {
    let payment = state.store.find_by_id(payment_id).await?;
    let events = state.store.callbacks_for(&payment.txn_ref).await?;
    Ok(Json(events))
}

/// Queries the gateway (`querydr`) and settles the payment if the gateway
/// reports it paid.
pub async fn reconcile_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
) -> AppResult<Json<ReconcileResult>> {
    let result = state.payment_processor.reconcile(payment_id).await?;
    Ok(Json(result))
}
