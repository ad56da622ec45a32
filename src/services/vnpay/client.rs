use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::VnpayConfig;
use crate::crypto_utils::HmacSignature;
use crate::error::{AppError, AppResult};

use super::datetime::format_vnp_date;
use super::{DEFAULT_CLIENT_IP, VNP_COMMAND_QUERY, VNP_VERSION};

/// Client for the merchant web API (`vnp_Command=querydr`).
#[derive(Clone)]
pub struct VnpayClient {
    http_client: Client,
    config: Arc<VnpayConfig>,
}

#[derive(Debug, Clone)]
pub struct QueryTransactionRequest {
    pub txn_ref: String,
    pub order_info: String,
    /// `vnp_CreateDate` of the payment request being queried.
    pub transaction_date: String,
    pub transaction_no: Option<String>,
    pub ip_addr: Option<String>,
}

#[derive(Debug, Serialize)]
struct QueryDrBody {
    #[serde(rename = "vnp_RequestId")]
    request_id: String,
    #[serde(rename = "vnp_Version")]
    version: &'static str,
    #[serde(rename = "vnp_Command")]
    command: &'static str,
    #[serde(rename = "vnp_TmnCode")]
    tmn_code: String,
    #[serde(rename = "vnp_TxnRef")]
    txn_ref: String,
    #[serde(rename = "vnp_OrderInfo")]
    order_info: String,
    #[serde(rename = "vnp_TransactionNo", skip_serializing_if = "Option::is_none")]
    transaction_no: Option<String>,
    #[serde(rename = "vnp_TransactionDate")]
    transaction_date: String,
    #[serde(rename = "vnp_CreateDate")]
    create_date: String,
    #[serde(rename = "vnp_IpAddr")]
    ip_addr: String,
    #[serde(rename = "vnp_SecureHash")]
    secure_hash: String,
}

/// Verified `querydr` result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryTransactionResponse {
    pub response_code: String,
    pub message: String,
    pub txn_ref: String,
    pub amount: String,
    pub bank_code: String,
    pub pay_date: String,
    pub transaction_no: String,
    pub transaction_type: String,
    pub transaction_status: String,
}

impl QueryTransactionResponse {
    pub fn is_paid(&self) -> bool {
        self.response_code == "00" && self.transaction_status == "00"
    }
}

pub(crate) const RESPONSE_HASH_FIELDS: [&str; 15] = [
    "vnp_ResponseId",
    "vnp_Command",
    "vnp_ResponseCode",
    "vnp_Message",
    "vnp_TmnCode",
    "vnp_TxnRef",
    "vnp_Amount",
    "vnp_BankCode",
    "vnp_PayDate",
    "vnp_TransactionNo",
    "vnp_TransactionType",
    "vnp_TransactionStatus",
    "vnp_OrderInfo",
    "vnp_PromotionCode",
    "vnp_PromotionAmount",
];

impl VnpayClient {
    pub fn new(config: Arc<VnpayConfig>) -> AppResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            config,
        })
    }

    pub async fn query_transaction(
        &self,
        request: &QueryTransactionRequest,
    ) -> AppResult<QueryTransactionResponse> {
        let request_id = uuid::Uuid::new_v4().simple().to_string();
        let create_date = format_vnp_date(Utc::now());
        let ip_addr = request
            .ip_addr
            .clone()
            .unwrap_or_else(|| DEFAULT_CLIENT_IP.to_string());

        let hash_data = [
            request_id.as_str(),
            VNP_VERSION,
            VNP_COMMAND_QUERY,
            self.config.tmn_code.as_str(),
            request.txn_ref.as_str(),
            request.transaction_date.as_str(),
            create_date.as_str(),
            ip_addr.as_str(),
            request.order_info.as_str(),
        ]
        .join("|");
        let secure_hash =
            HmacSignature::sign_hex(hash_data.as_bytes(), self.config.hash_secret.as_bytes())?;

        let body = QueryDrBody {
            request_id,
            version: VNP_VERSION,
            command: VNP_COMMAND_QUERY,
            tmn_code: self.config.tmn_code.clone(),
            txn_ref: request.txn_ref.clone(),
            order_info: request.order_info.clone(),
            transaction_no: request.transaction_no.clone(),
            transaction_date: request.transaction_date.clone(),
            create_date,
            ip_addr,
            secure_hash,
        };

        let response = self
            .http_client
            .post(&self.config.api_url)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            tracing::error!("VNPay API error: {} - {}", status, text);
            return Err(AppError::Vnpay(format!("API error: {}", status)));
        }

        let fields: HashMap<String, serde_json::Value> = serde_json::from_str(&text).map_err(|e| {
            tracing::error!("Failed to parse VNPay response: {} - Body: {}", e, text);
            AppError::Vnpay(format!("Failed to parse response: {}", e))
        })?;

        self.verify_query_response(&fields)
    }

    fn verify_query_response(
        &self,
        fields: &HashMap<String, serde_json::Value>,
    ) -> AppResult<QueryTransactionResponse> {
        let field = |key: &str| match fields.get(key) {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };

        let hash_data = RESPONSE_HASH_FIELDS
            .iter()
            .map(|&key| field(key))
            .collect::<Vec<_>>()
            .join("|");
        let verified = HmacSignature::verify_hex(
            hash_data.as_bytes(),
            &field("vnp_SecureHash"),
            self.config.hash_secret.as_bytes(),
        )?;

        if !verified {
            tracing::warn!(txn_ref = %field("vnp_TxnRef"), "VNPay query response failed signature check");
            return Err(AppError::InvalidSignature(
                "Query response signature verification failed".to_string(),
            ));
        }

        Ok(QueryTransactionResponse {
            response_code: field("vnp_ResponseCode"),
            message: field("vnp_Message"),
            txn_ref: field("vnp_TxnRef"),
            amount: field("vnp_Amount"),
            bank_code: field("vnp_BankCode"),
            pay_date: field("vnp_PayDate"),
            transaction_no: field("vnp_TransactionNo"),
            transaction_type: field("vnp_TransactionType"),
            transaction_status: field("vnp_TransactionStatus"),
        })
    }
}

/// Signs a `querydr` reply body the way the gateway does.
#[cfg(test)]
pub(crate) fn sign_query_reply(body: &mut serde_json::Value, secret: &str) {
    let hash_data = RESPONSE_HASH_FIELDS
        .iter()
        .map(|k| body[*k].as_str().unwrap_or_default().to_string())
        .collect::<Vec<_>>()
        .join("|");
    body["vnp_SecureHash"] = serde_json::Value::String(
        HmacSignature::sign_hex(hash_data.as_bytes(), secret.as_bytes()).unwrap(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn signed_response(secret: &str, tmn_code: &str, response_code: &str) -> serde_json::Value {
        let mut body = json!({
            "vnp_ResponseId": "4f6c2d1a",
            "vnp_Command": "querydr",
            "vnp_ResponseCode": response_code,
            "vnp_Message": "QueryDR Success",
            "vnp_TmnCode": tmn_code,
            "vnp_TxnRef": "abc-1",
            "vnp_Amount": "1000000",
            "vnp_BankCode": "NCB",
            "vnp_PayDate": "20250101120512",
            "vnp_TransactionNo": "14226112",
            "vnp_TransactionType": "01",
            "vnp_TransactionStatus": "00",
            "vnp_OrderInfo": "Payment for order ORD1",
            "vnp_PromotionCode": "",
            "vnp_PromotionAmount": ""
        });

        sign_query_reply(&mut body, secret);
        body
    }

    async fn client_for(server: &MockServer) -> (VnpayClient, VnpayConfig) {
        let mut config = VnpayConfig::sandbox();
        config.api_url = format!("{}/merchant_webapi/api/transaction", server.uri());
        (VnpayClient::new(Arc::new(config.clone())).unwrap(), config)
    }

    fn query() -> QueryTransactionRequest {
        QueryTransactionRequest {
            txn_ref: "abc-1".to_string(),
            order_info: "Query payment abc-1".to_string(),
            transaction_date: "20250101120000".to_string(),
            transaction_no: None,
            ip_addr: None,
        }
    }

    #[tokio::test]
    async fn test_query_transaction_verified() {
        let server = MockServer::start().await;
        let (client, config) = client_for(&server).await;

        Mock::given(method("POST"))
            .and(path("/merchant_webapi/api/transaction"))
            .and(body_partial_json(json!({
                "vnp_Command": "querydr",
                "vnp_Version": "2.1.0",
                "vnp_TxnRef": "abc-1",
                "vnp_TransactionDate": "20250101120000",
                "vnp_TmnCode": config.tmn_code,
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(signed_response(&config.hash_secret, &config.tmn_code, "00")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let result = tokio_test::assert_ok!(client.query_transaction(&query()).await);
        assert!(result.is_paid());
        assert_eq!(result.amount, "1000000");
        assert_eq!(result.transaction_no, "14226112");
    }

    #[tokio::test]
    async fn test_query_response_with_bad_signature_rejected() {
        let server = MockServer::start().await;
        let (client, config) = client_for(&server).await;

        let mut body = signed_response(&config.hash_secret, &config.tmn_code, "00");
        body["vnp_Amount"] = json!("1");

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let result = client.query_transaction(&query()).await;
        assert!(matches!(result, Err(AppError::InvalidSignature(_))));
    }

    #[tokio::test]
    async fn test_query_http_error() {
        let server = MockServer::start().await;
        let (client, _) = client_for(&server).await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = client.query_transaction(&query()).await;
        assert!(matches!(result, Err(AppError::Vnpay(_))));
    }
}
