//! VNPay integration: signed payment redirects, callback verification and
//! the `querydr` reconciliation API.

mod callback;
pub mod client;
pub mod datetime;
mod params;
mod url_builder;

pub use callback::*;
pub use client::*;
pub use params::VnpParams;
pub use url_builder::*;

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::VnpayConfig;
use crate::error::AppResult;

pub const VNP_VERSION: &str = "2.1.0";
pub const VNP_COMMAND_PAY: &str = "pay";
pub const VNP_COMMAND_QUERY: &str = "querydr";
pub const VNP_LOCALE: &str = "vn";
pub const VNP_CURRENCY: &str = "VND";
pub const VNP_ORDER_TYPE: &str = "other";

pub const PARAM_PREFIX: &str = "vnp_";
pub const SECURE_HASH_PARAM: &str = "vnp_SecureHash";
pub const SECURE_HASH_TYPE_PARAM: &str = "vnp_SecureHashType";
pub const RESPONSE_CODE_SUCCESS: &str = "00";

/// Used when the caller cannot determine the shopper's address.
pub const DEFAULT_CLIENT_IP: &str = "127.0.0.1";

pub struct VnpayService {
    config: Arc<VnpayConfig>,
    client: VnpayClient,
}

impl VnpayService {
    pub fn new(config: &VnpayConfig) -> AppResult<Self> {
        let config = Arc::new(config.clone());
        let client = VnpayClient::new(config.clone())?;

        Ok(Self { config, client })
    }

    pub fn client(&self) -> &VnpayClient {
        &self.client
    }

    pub fn build_payment_url(&self, request: &PaymentUrlRequest) -> AppResult<String> {
        build_payment_url(&self.config, request)
    }

    pub fn verify_callback(&self, query: &HashMap<String, String>) -> bool {
        verify_callback(&self.config, query)
    }
}
