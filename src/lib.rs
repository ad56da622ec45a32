pub mod api;
pub mod config;
pub mod crypto_utils;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

use std::sync::Arc;

use api::middleware::rate_limit::{create_rate_limiter, SharedRateLimiter};
use config::Config;
use db::SharedPaymentStore;
use services::PaymentProcessor;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: SharedPaymentStore,
    pub payment_processor: Arc<PaymentProcessor>,
    pub rate_limiter: SharedRateLimiter,
}

impl AppState {
    pub fn new(config: Config, store: SharedPaymentStore, payment_processor: PaymentProcessor) -> Self {
        let rate_limiter = create_rate_limiter(
            config.rate_limit.requests_per_second,
            config.rate_limit.burst_size,
        );

        Self {
            config: Arc::new(config),
            store,
            payment_processor: Arc::new(payment_processor),
            rate_limiter,
        }
    }
}
