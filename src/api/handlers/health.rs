use axum::{extract::State, Json};
use serde::Serialize;

use crate::db::PaymentStore;
use crate::error::AppResult;
use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub store: String,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub version: String,
    pub environment: String,
    pub services: ServiceStatus,
}

#[derive(Serialize)]
pub struct ServiceStatus {
    pub store: bool,
    pub vnpay_gateway: String,
}

pub async fn health_check(State(state): State<AppState>) -> AppResult<Json<HealthResponse>> {
    let store_status = if state.store.is_healthy().await {
        "connected"
    } else {
        "disconnected"
    };

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: store_status.to_string(),
    }))
}

pub async fn service_status(State(state): State<AppState>) -> AppResult<Json<StatusResponse>> {
    let store_ok = state.store.is_healthy().await;

    let gateway_host = url::Url::parse(&state.config.vnpay.payment_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default();

    Ok(Json(StatusResponse {
        status: if store_ok { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: format!("{:?}", state.config.environment).to_lowercase(),
        services: ServiceStatus {
            store: store_ok,
            vnpay_gateway: gateway_host,
        },
    }))
}
