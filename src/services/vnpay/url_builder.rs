use crate::config::VnpayConfig;
use crate::error::{AppError, AppResult};

use super::datetime::expire_date_for;
use super::params::VnpParams;
use super::{
    DEFAULT_CLIENT_IP, SECURE_HASH_PARAM, VNP_COMMAND_PAY, VNP_CURRENCY, VNP_LOCALE,
    VNP_ORDER_TYPE, VNP_VERSION,
};

const MAX_TXN_REF_LEN: usize = 100;

/// Caller-supplied fields of a payment redirect.
#[derive(Debug, Clone)]
pub struct PaymentUrlRequest {
    pub txn_ref: String,
    pub order_info: String,
    /// Already in minor units (VND x 100).
    pub amount: u64,
    /// `yyyyMMddHHmmss`, UTC+7.
    pub create_date: String,
    pub ip_addr: Option<String>,
    pub bank_code: Option<String>,
}

/// Gateway amounts are the VND amount times 100.
pub fn to_minor_units(amount: i64) -> AppResult<u64> {
    u64::try_from(amount)
        .ok()
        .and_then(|a| a.checked_mul(100))
        .ok_or_else(|| AppError::Validation(format!("Amount {} cannot be sent to the gateway", amount)))
}

/// Transaction references travel unescaped in gateway logs and reports,
/// so only `[A-Za-z0-9_.-]` is accepted.
pub fn validate_txn_ref(txn_ref: &str) -> AppResult<()> {
    if txn_ref.is_empty() || txn_ref.len() > MAX_TXN_REF_LEN {
        return Err(AppError::Validation(format!(
            "Transaction reference must be 1 to {} characters",
            MAX_TXN_REF_LEN
        )));
    }

    if let Some(bad) = txn_ref
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(AppError::Validation(format!(
            "Transaction reference contains unsupported character '{}'",
            bad
        )));
    }

    Ok(())
}

/// Full parameter set of a payment redirect, before the hash is appended.
pub fn payment_params(config: &VnpayConfig, request: &PaymentUrlRequest) -> AppResult<VnpParams> {
    validate_txn_ref(&request.txn_ref)?;

    let expire_date = expire_date_for(&request.create_date)?;
    let ip_addr = request
        .ip_addr
        .as_deref()
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .unwrap_or(DEFAULT_CLIENT_IP);

    let mut params = VnpParams::new();
    params
        .insert("vnp_Version", VNP_VERSION)
        .insert("vnp_Command", VNP_COMMAND_PAY)
        .insert("vnp_TmnCode", &config.tmn_code)
        .insert("vnp_Locale", VNP_LOCALE)
        .insert("vnp_CurrCode", VNP_CURRENCY)
        .insert("vnp_TxnRef", &request.txn_ref)
        .insert("vnp_OrderInfo", request.order_info.replace('-', ""))
        .insert("vnp_OrderType", VNP_ORDER_TYPE)
        .insert("vnp_Amount", request.amount)
        .insert("vnp_ReturnUrl", &config.return_url)
        .insert("vnp_IpAddr", ip_addr)
        .insert("vnp_CreateDate", &request.create_date)
        .insert("vnp_ExpireDate", expire_date);

    if let Some(bank_code) = request.bank_code.as_deref().filter(|b| !b.is_empty()) {
        params.insert("vnp_BankCode", bank_code);
    }

    Ok(params)
}

/// Absolute redirect URL: `base?canonical&vnp_SecureHash=<hex>`.
pub fn build_payment_url(config: &VnpayConfig, request: &PaymentUrlRequest) -> AppResult<String> {
    let params = payment_params(config, request)?;
    let signature = params.sign(&config.hash_secret)?;

    tracing::debug!(
        txn_ref = %request.txn_ref,
        amount = request.amount,
        "Built signed VNPay payment URL"
    );

    Ok(format!(
        "{}?{}&{}={}",
        config.payment_url,
        params.canonicalize(),
        SECURE_HASH_PARAM,
        signature
    ))
}
