use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{CallbackSource, PaymentStatus};
use crate::services::vnpay::IpnResponse;
use crate::services::{CallbackOutcome, CreatePaymentRequest};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateVnpayPaymentRequest {
    #[validate(length(min = 1, max = 64, message = "Order ID must be 1 to 64 characters"))]
    pub order_id: String,
    /// VND, major units.
    #[validate(range(min = 1, message = "Amount must be positive"))]
    pub amount: i64,
    #[serde(default)]
    #[validate(length(max = 255, message = "Order description too long"))]
    pub order_info: Option<String>,
    #[serde(default)]
    #[validate(length(min = 2, max = 20, message = "Invalid bank code"))]
    pub bank_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateVnpayPaymentResponse {
    pub success: bool,
    pub payment_id: Uuid,
    pub txn_ref: String,
    pub payment_url: String,
    pub expires_at: String,
}

pub async fn create_vnpay_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateVnpayPaymentRequest>,
) -> AppResult<Json<CreateVnpayPaymentResponse>> {
    request
        .validate()
        .map_err(|e| AppError::Validation(format!("Invalid request: {}", e)))?;

    let result = state
        .payment_processor
        .create_payment(&CreatePaymentRequest {
            order_id: request.order_id,
            amount: request.amount,
            order_info: request.order_info,
            bank_code: request.bank_code,
            client_ip: client_ip(&headers),
        })
        .await?;

    Ok(Json(CreateVnpayPaymentResponse {
        success: true,
        payment_id: result.payment_id,
        txn_ref: result.txn_ref,
        payment_url: result.payment_url,
        expires_at: result.expires_at,
    }))
}

#[derive(Debug, Serialize)]
pub struct ReturnResponse {
    pub success: bool,
    pub payment_id: Uuid,
    pub txn_ref: String,
    pub status: PaymentStatus,
    pub message: String,
}

/// Browser redirect back from the gateway.
pub async fn vnpay_return(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> AppResult<Json<ReturnResponse>> {
    let outcome = state
        .payment_processor
        .handle_callback(CallbackSource::Return, &query)
        .await?;

    let payment = match outcome {
        CallbackOutcome::Settled(payment) | CallbackOutcome::AlreadySettled(payment) => payment,
        CallbackOutcome::InvalidSignature => {
            return Err(AppError::InvalidSignature(
                "Payment callback signature verification failed".to_string(),
            ))
        }
        CallbackOutcome::Malformed(reason) => return Err(AppError::MalformedCallback(reason)),
        CallbackOutcome::OrderNotFound(txn_ref) => {
            return Err(AppError::NotFound(format!("Payment {} not found", txn_ref)))
        }
        CallbackOutcome::AmountMismatch { txn_ref, .. } => {
            return Err(AppError::Payment(format!(
                "Amount reported for {} does not match the order",
                txn_ref
            )))
        }
    };

    let (success, message) = match payment.status {
        PaymentStatus::Completed => (true, "Payment completed"),
        PaymentStatus::Failed => (false, "Payment failed"),
        PaymentStatus::Pending => (false, "Payment pending"),
    };

    Ok(Json(ReturnResponse {
        success,
        payment_id: payment.id,
        txn_ref: payment.txn_ref,
        status: payment.status,
        message: message.to_string(),
    }))
}

/// Server-to-server notification. The gateway only reads the `RspCode`
/// body, so every outcome is answered with 200.
pub async fn vnpay_ipn(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<IpnResponse> {
    match state
        .payment_processor
        .handle_callback(CallbackSource::Ipn, &query)
        .await
    {
        Ok(outcome) => Json(outcome.ipn_response()),
        Err(e) => {
            tracing::error!(error = %e, "Failed to process VNPay IPN");
            Json(IpnResponse::unknown_error())
        }
    }
}

/// First `X-Forwarded-For` hop, else `X-Real-IP`.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim);

    let real_ip = headers
        .get("X-Real-IP")
        .and_then(|v| v.to_str().ok())
        .map(str::trim);

    forwarded
        .filter(|ip| !ip.is_empty())
        .or(real_ip.filter(|ip| !ip.is_empty()))
        .and_then(|ip| ip.parse::<std::net::IpAddr>().ok())
        .map(|ip| ip.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_ip_prefers_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Forwarded-For", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        headers.insert("X-Real-IP", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(client_ip(&headers).as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn test_client_ip_fallbacks() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers), None);

        headers.insert("X-Real-IP", HeaderValue::from_static("198.51.100.9"));
        assert_eq!(client_ip(&headers).as_deref(), Some("198.51.100.9"));

        headers.insert("X-Forwarded-For", HeaderValue::from_static("not-an-ip"));
        assert_eq!(client_ip(&headers), None);
    }

    #[test]
    fn test_request_validation() {
        let request = CreateVnpayPaymentRequest {
            order_id: String::new(),
            amount: 0,
            order_info: None,
            bank_code: None,
        };
        assert!(request.validate().is_err());
    }
}
