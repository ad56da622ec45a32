use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::VnpayConfig;
use crate::crypto_utils::constant_time_eq;
use crate::error::{AppError, AppResult};

use super::params::VnpParams;
use super::{PARAM_PREFIX, RESPONSE_CODE_SUCCESS, SECURE_HASH_PARAM, SECURE_HASH_TYPE_PARAM};

/// Recomputes the secure hash over the `vnp_` parameters of a callback and
/// compares it with the received `vnp_SecureHash`.
///
/// This is a pure predicate. Callers must not touch payment state unless it
/// returns `true`, and must still guard the state change itself against
/// replays of the same (valid) callback.
pub fn verify_callback(config: &VnpayConfig, query: &HashMap<String, String>) -> bool {
    let Some(received) = query.get(SECURE_HASH_PARAM) else {
        return false;
    };

    let params = signed_subset(query);

    match params.sign(&config.hash_secret) {
        Ok(expected) => constant_time_eq(&expected, received),
        Err(e) => {
            tracing::error!(error = %e, "Failed to compute callback signature");
            false
        }
    }
}

/// The parameters the gateway signed: every `vnp_` field except the hash
/// and its type marker.
pub fn signed_subset(query: &HashMap<String, String>) -> VnpParams {
    let mut params: VnpParams = query
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    params.retain(|k, _| k.starts_with(PARAM_PREFIX));
    params.remove(SECURE_HASH_PARAM);
    params.remove(SECURE_HASH_TYPE_PARAM);
    params
}

/// Fields of a verified callback that drive payment state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VnpayCallback {
    pub txn_ref: String,
    pub response_code: String,
    /// Minor units, as echoed by the gateway.
    pub amount: u64,
    pub transaction_no: Option<String>,
    pub transaction_status: Option<String>,
    pub bank_code: Option<String>,
    pub pay_date: Option<String>,
}

impl VnpayCallback {
    pub fn from_params(query: &HashMap<String, String>) -> AppResult<Self> {
        let required = |key: &str| {
            query
                .get(key)
                .filter(|v| !v.is_empty())
                .cloned()
                .ok_or_else(|| AppError::MalformedCallback(format!("Missing {}", key)))
        };
        let optional = |key: &str| query.get(key).filter(|v| !v.is_empty()).cloned();

        let amount = required("vnp_Amount")?
            .parse::<u64>()
            .map_err(|e| AppError::MalformedCallback(format!("Invalid vnp_Amount: {}", e)))?;

        Ok(Self {
            txn_ref: required("vnp_TxnRef")?,
            response_code: required("vnp_ResponseCode")?,
            amount,
            transaction_no: optional("vnp_TransactionNo"),
            transaction_status: optional("vnp_TransactionStatus"),
            bank_code: optional("vnp_BankCode"),
            pay_date: optional("vnp_PayDate"),
        })
    }

    pub fn is_success(&self) -> bool {
        self.response_code == RESPONSE_CODE_SUCCESS
    }
}

/// Acknowledgement body the gateway expects from the IPN endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IpnResponse {
    #[serde(rename = "RspCode")]
    pub rsp_code: String,
    #[serde(rename = "Message")]
    pub message: String,
}

impl IpnResponse {
    fn new(code: &str, message: &str) -> Self {
        Self {
            rsp_code: code.to_string(),
            message: message.to_string(),
        }
    }

    pub fn confirmed() -> Self {
        Self::new("00", "Confirm Success")
    }

    pub fn order_not_found() -> Self {
        Self::new("01", "Order not found")
    }

    pub fn already_confirmed() -> Self {
        Self::new("02", "Order already confirmed")
    }

    pub fn invalid_amount() -> Self {
        Self::new("04", "Invalid amount")
    }

    pub fn invalid_signature() -> Self {
        Self::new("97", "Invalid signature")
    }

    pub fn unknown_error() -> Self {
        Self::new("99", "Unknown error")
    }
}
