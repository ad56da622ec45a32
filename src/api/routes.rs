use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::api::handlers;
use crate::api::middleware::{rate_limit, request_logging};
use crate::AppState;

pub fn create_router(state: AppState) -> Router {
    // Public routes
    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/v1/status", get(handlers::service_status));

    // Gateway callbacks (signature verification instead of client auth)
    let callback_routes = Router::new()
        .route("/payments/vnpay/return", get(handlers::vnpay_return))
        .route("/payments/vnpay/ipn", get(handlers::vnpay_ipn));

    let payment_routes = Router::new()
        .route("/vnpay", post(handlers::create_vnpay_payment))
        .route("/:payment_id", get(handlers::get_payment))
        .route("/:payment_id/callbacks", get(handlers::get_payment_callbacks))
        .route("/:payment_id/query", post(handlers::reconcile_payment));

    Router::new()
        .merge(public_routes)
        .merge(callback_routes)
        .nest("/api/v1/payments", payment_routes)
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit))
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(middleware::from_fn(request_logging))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::InMemoryPaymentStore;
    use crate::services::PaymentProcessor;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> Router {
        app_with(::config::Config::builder().build().unwrap())
    }

    fn app_with(settings: ::config::Config) -> Router {
        let config = Config::from_settings(&settings).unwrap();
        let store = Arc::new(InMemoryPaymentStore::new());
        let processor = PaymentProcessor::new(&config, store.clone()).unwrap();
        create_router(AppState::new(config, store, processor))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn create_payment(app: &Router) -> Value {
        let request = Request::post("/api/v1/payments/vnpay")
            .header("content-type", "application/json")
            .header("X-Forwarded-For", "203.0.113.7")
            .body(Body::from(
                json!({ "order_id": "ORD-42", "amount": 250000 }).to_string(),
            ))
            .unwrap();

        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body
    }

    /// Query string a gateway would send back for the given redirect URL:
    /// the signed request fields plus a response code, re-signed.
    fn gateway_reply(payment_url: &str, response_code: &str) -> String {
        let url = url::Url::parse(payment_url).unwrap();
        let mut params: crate::services::vnpay::VnpParams = url
            .query_pairs()
            .into_owned()
            .filter(|(k, _)| k != "vnp_SecureHash")
            .collect();
        params.insert("vnp_ResponseCode", response_code);
        params.insert("vnp_TransactionNo", "14226112");
        let hash = params
            .sign(&crate::config::VnpayConfig::sandbox().hash_secret)
            .unwrap();
        format!("{}&vnp_SecureHash={}", params.canonicalize(), hash)
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&app(), Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["store"], "connected");
    }

    #[tokio::test]
    async fn test_create_payment_returns_signed_url() {
        let app = app();
        let body = create_payment(&app).await;

        let payment_url = body["payment_url"].as_str().unwrap();
        let query: HashMap<String, String> = url::Url::parse(payment_url)
            .unwrap()
            .query_pairs()
            .into_owned()
            .collect();

        assert_eq!(query["vnp_Amount"], "25000000");
        assert_eq!(query["vnp_IpAddr"], "203.0.113.7");
        assert_eq!(query["vnp_OrderInfo"], "Payment for order ORD42");
        assert_eq!(query["vnp_TxnRef"], body["txn_ref"].as_str().unwrap());
        assert_eq!(query["vnp_SecureHash"].len(), 128);
    }

    #[tokio::test]
    async fn test_create_payment_validates_body() {
        let request = Request::post("/api/v1/payments/vnpay")
            .header("content-type", "application/json")
            .body(Body::from(json!({ "order_id": "", "amount": -1 }).to_string()))
            .unwrap();

        let (status, body) = send(&app(), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_ipn_flow_is_idempotent() {
        let app = app();
        let created = create_payment(&app).await;
        let reply = gateway_reply(created["payment_url"].as_str().unwrap(), "00");
        let ipn = format!("/payments/vnpay/ipn?{}", reply);

        let (status, body) = send(&app, Request::get(&ipn).body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "RspCode": "00", "Message": "Confirm Success" }));

        let (_, body) = send(&app, Request::get(&ipn).body(Body::empty()).unwrap()).await;
        assert_eq!(body["RspCode"], "02");

        let payment_id = created["payment_id"].as_str().unwrap();
        let (status, body) = send(
            &app,
            Request::get(format!("/api/v1/payments/{}", payment_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "completed");
        assert_eq!(body["transaction_no"], "14226112");

        let (_, events) = send(
            &app,
            Request::get(format!("/api/v1/payments/{}/callbacks", payment_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(events.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_tampered_ipn_rejected() {
        let app = app();
        let created = create_payment(&app).await;
        let reply = gateway_reply(created["payment_url"].as_str().unwrap(), "24")
            .replace("vnp_ResponseCode=24", "vnp_ResponseCode=00");

        let (status, body) = send(
            &app,
            Request::get(format!("/payments/vnpay/ipn?{}", reply))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["RspCode"], "97");

        let (_, payment) = send(
            &app,
            Request::get(format!("/api/v1/payments/{}", created["payment_id"].as_str().unwrap()))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(payment["status"], "pending");
    }

    #[tokio::test]
    async fn test_return_reports_failure() {
        let app = app();
        let created = create_payment(&app).await;
        let reply = gateway_reply(created["payment_url"].as_str().unwrap(), "24");

        let (status, body) = send(
            &app,
            Request::get(format!("/payments/vnpay/return?{}", reply))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert_eq!(body["status"], "failed");
    }

    #[tokio::test]
    async fn test_return_with_bad_signature() {
        let app = app();
        let created = create_payment(&app).await;
        let payment_url = created["payment_url"].as_str().unwrap();
        let (_, query) = payment_url.split_once('?').unwrap();

        let (status, body) = send(
            &app,
            Request::get(format!("/payments/vnpay/return?{}&vnp_ResponseCode=00", query))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_SIGNATURE");
    }

    #[tokio::test]
    async fn test_ipn_bypasses_rate_limit() {
        let app = app_with(
            ::config::Config::builder()
                .set_override("rate.limit.requests.per.second", 1)
                .unwrap()
                .set_override("rate.limit.burst.size", 1)
                .unwrap()
                .build()
                .unwrap(),
        );
        let status = || Request::get("/api/v1/status").body(Body::empty()).unwrap();

        let (first, _) = send(&app, status()).await;
        assert_eq!(first, StatusCode::OK);
        let (limited, body) = send(&app, status()).await;
        assert_eq!(limited, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"]["code"], "RATE_LIMIT_EXCEEDED");

        for _ in 0..3 {
            let (code, body) = send(
                &app,
                Request::get("/payments/vnpay/ipn?vnp_TxnRef=abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
            assert_eq!(code, StatusCode::OK);
            assert_eq!(body["RspCode"], "97");
        }
    }

    #[tokio::test]
    async fn test_unknown_payment() {
        let (status, body) = send(
            &app(),
            Request::get(format!("/api/v1/payments/{}", uuid::Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }
}
