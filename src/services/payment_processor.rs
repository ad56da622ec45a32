use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::config::Config;
use crate::db::SharedPaymentStore;
use crate::error::{AppError, AppResult};
use crate::models::{
    CallbackSource, GatewayResult, NewCallbackEvent, NewPayment, Payment, PaymentStatus,
};
use crate::services::vnpay::datetime::{expire_date_for, format_vnp_date};
use crate::services::vnpay::{
    to_minor_units, IpnResponse, PaymentUrlRequest, QueryTransactionRequest,
    QueryTransactionResponse, VnpayCallback, VnpayService, DEFAULT_CLIENT_IP,
};

#[derive(Debug, Clone)]
pub struct CreatePaymentRequest {
    pub order_id: String,
    /// VND, major units.
    pub amount: i64,
    pub order_info: Option<String>,
    pub bank_code: Option<String>,
    pub client_ip: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentCreationResult {
    pub payment_id: Uuid,
    pub txn_ref: String,
    pub payment_url: String,
    pub expires_at: String,
}

/// What a gateway callback did to payment state.
#[derive(Debug, Clone)]
pub enum CallbackOutcome {
    /// Verified and moved the payment out of `pending`.
    Settled(Payment),
    /// Verified, but the payment had already left `pending`.
    AlreadySettled(Payment),
    InvalidSignature,
    Malformed(String),
    OrderNotFound(String),
    AmountMismatch {
        txn_ref: String,
        expected: u64,
        received: u64,
    },
}

impl CallbackOutcome {
    pub fn ipn_response(&self) -> IpnResponse {
        match self {
            CallbackOutcome::Settled(_) => IpnResponse::confirmed(),
            CallbackOutcome::AlreadySettled(_) => IpnResponse::already_confirmed(),
            CallbackOutcome::InvalidSignature => IpnResponse::invalid_signature(),
            CallbackOutcome::Malformed(_) => IpnResponse::unknown_error(),
            CallbackOutcome::OrderNotFound(_) => IpnResponse::order_not_found(),
            CallbackOutcome::AmountMismatch { .. } => IpnResponse::invalid_amount(),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            CallbackOutcome::Settled(p) => format!("settled as {:?}", p.status),
            CallbackOutcome::AlreadySettled(p) => format!("already {:?}", p.status),
            CallbackOutcome::InvalidSignature => "invalid signature".to_string(),
            CallbackOutcome::Malformed(reason) => format!("malformed: {}", reason),
            CallbackOutcome::OrderNotFound(txn_ref) => format!("unknown txn_ref {}", txn_ref),
            CallbackOutcome::AmountMismatch {
                expected, received, ..
            } => format!("amount mismatch: expected {}, received {}", expected, received),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconcileResult {
    pub payment: Payment,
    pub gateway: QueryTransactionResponse,
    pub settled: bool,
}

pub struct PaymentProcessor {
    vnpay: VnpayService,
    store: SharedPaymentStore,
}

impl PaymentProcessor {
    pub fn new(config: &Config, store: SharedPaymentStore) -> AppResult<Self> {
        Ok(Self {
            vnpay: VnpayService::new(&config.vnpay)?,
            store,
        })
    }

    /// Records a pending payment under a fresh transaction reference and
    /// returns the signed gateway redirect for it.
    pub async fn create_payment(
        &self,
        request: &CreatePaymentRequest,
    ) -> AppResult<PaymentCreationResult> {
        let amount = to_minor_units(request.amount)?;
        let txn_ref = Uuid::new_v4().simple().to_string();
        let order_info = request
            .order_info
            .clone()
            .filter(|info| !info.trim().is_empty())
            .unwrap_or_else(|| format!("Payment for order {}", request.order_id))
            .replace('-', "");
        let client_ip = request
            .client_ip
            .clone()
            .unwrap_or_else(|| DEFAULT_CLIENT_IP.to_string());

        // Create and expiry dates both derive from this one instant.
        let create_date = format_vnp_date(Utc::now());
        let expires_at = expire_date_for(&create_date)?;

        let payment_url = self.vnpay.build_payment_url(&PaymentUrlRequest {
            txn_ref: txn_ref.clone(),
            order_info: order_info.clone(),
            amount,
            create_date: create_date.clone(),
            ip_addr: Some(client_ip.clone()),
            bank_code: request.bank_code.clone(),
        })?;

        let payment = self
            .store
            .create_payment(NewPayment {
                order_id: request.order_id.clone(),
                txn_ref: txn_ref.clone(),
                amount: request.amount,
                order_info,
                client_ip,
                create_date,
            })
            .await?;

        tracing::info!(
            payment_id = %payment.id,
            order_id = %payment.order_id,
            txn_ref = %txn_ref,
            amount = request.amount,
            "VNPay payment created"
        );

        Ok(PaymentCreationResult {
            payment_id: payment.id,
            txn_ref,
            payment_url,
            expires_at,
        })
    }

    /// Verifies a callback and applies `pending -> completed | failed` at
    /// most once per transaction reference. Every callback is audited.
    pub async fn handle_callback(
        &self,
        source: CallbackSource,
        query: &HashMap<String, String>,
    ) -> AppResult<CallbackOutcome> {
        let verified = self.vnpay.verify_callback(query);

        let outcome = if verified {
            self.apply_verified(query).await
        } else {
            tracing::warn!(
                source = ?source,
                txn_ref = ?query.get("vnp_TxnRef"),
                "Rejected VNPay callback with invalid signature"
            );
            Ok(CallbackOutcome::InvalidSignature)
        };

        let description = match &outcome {
            Ok(o) => o.describe(),
            Err(e) => format!("error: {}", e),
        };

        let audit = NewCallbackEvent {
            source,
            txn_ref: query.get("vnp_TxnRef").cloned(),
            signature_verified: verified,
            payload: serde_json::to_value(query).unwrap_or_default(),
            outcome: description,
        };
        if let Err(e) = self.store.record_callback(audit).await {
            tracing::error!(error = %e, "Failed to record callback event");
        }

        outcome
    }

    async fn apply_verified(&self, query: &HashMap<String, String>) -> AppResult<CallbackOutcome> {
        let callback = match VnpayCallback::from_params(query) {
            Ok(callback) => callback,
            Err(AppError::MalformedCallback(reason)) => {
                tracing::warn!(reason = %reason, "Malformed VNPay callback");
                return Ok(CallbackOutcome::Malformed(reason));
            }
            Err(e) => return Err(e),
        };

        let Some(payment) = self.store.find_by_txn_ref(&callback.txn_ref).await? else {
            tracing::warn!(txn_ref = %callback.txn_ref, "VNPay callback for unknown transaction");
            return Ok(CallbackOutcome::OrderNotFound(callback.txn_ref));
        };

        let expected = payment.amount_minor()?;
        if expected != callback.amount {
            tracing::warn!(
                txn_ref = %callback.txn_ref,
                expected,
                received = callback.amount,
                "VNPay callback amount does not match payment"
            );
            return Ok(CallbackOutcome::AmountMismatch {
                txn_ref: callback.txn_ref,
                expected,
                received: callback.amount,
            });
        }

        if payment.status != PaymentStatus::Pending {
            return Ok(CallbackOutcome::AlreadySettled(payment));
        }

        let status = if callback.is_success() {
            PaymentStatus::Completed
        } else {
            PaymentStatus::Failed
        };

        let result = GatewayResult {
            transaction_no: callback.transaction_no.clone(),
            response_code: callback.response_code.clone(),
            bank_code: callback.bank_code.clone(),
            pay_date: callback.pay_date.clone(),
        };

        match self.store.settle_pending(&callback.txn_ref, status, &result).await? {
            Some(settled) => {
                tracing::info!(
                    payment_id = %settled.id,
                    txn_ref = %settled.txn_ref,
                    status = ?settled.status,
                    response_code = %callback.response_code,
                    "VNPay payment settled"
                );
                Ok(CallbackOutcome::Settled(settled))
            }
            None => {
                // Lost the race to a concurrent delivery of the same callback.
                let current = self
                    .store
                    .find_by_txn_ref(&callback.txn_ref)
                    .await?
                    .ok_or_else(|| AppError::NotFound(callback.txn_ref.clone()))?;
                Ok(CallbackOutcome::AlreadySettled(current))
            }
        }
    }

    /// Asks the gateway for the transaction's state and settles a still
    /// pending payment the gateway reports as paid.
    pub async fn reconcile(&self, payment_id: Uuid) -> AppResult<ReconcileResult> {
        let payment = self.store.find_by_id(payment_id).await?;

        let gateway = self
            .vnpay
            .client()
            .query_transaction(&QueryTransactionRequest {
                txn_ref: payment.txn_ref.clone(),
                order_info: format!("Query payment {}", payment.txn_ref),
                transaction_date: payment.create_date.clone(),
                transaction_no: payment.transaction_no.clone(),
                ip_addr: Some(payment.client_ip.clone()),
            })
            .await?;

        if gateway.txn_ref != payment.txn_ref {
            tracing::warn!(
                txn_ref = %payment.txn_ref,
                reported = %gateway.txn_ref,
                "Gateway query answered for a different transaction"
            );
            return Err(AppError::Payment(format!(
                "Gateway answered for {}, expected {}",
                gateway.txn_ref, payment.txn_ref
            )));
        }

        if payment.status != PaymentStatus::Pending || !gateway.is_paid() {
            return Ok(ReconcileResult {
                payment,
                gateway,
                settled: false,
            });
        }

        let expected = payment.amount_minor()?;
        if gateway.amount.parse::<u64>().ok() != Some(expected) {
            tracing::warn!(
                txn_ref = %payment.txn_ref,
                expected,
                reported = %gateway.amount,
                "Gateway query amount does not match payment"
            );
            return Err(AppError::Payment(format!(
                "Gateway reports amount {} for {}, expected {}",
                gateway.amount, payment.txn_ref, expected
            )));
        }

        let result = GatewayResult {
            transaction_no: Some(gateway.transaction_no.clone()).filter(|s| !s.is_empty()),
            response_code: gateway.response_code.clone(),
            bank_code: Some(gateway.bank_code.clone()).filter(|s| !s.is_empty()),
            pay_date: Some(gateway.pay_date.clone()).filter(|s| !s.is_empty()),
        };

        let settled = self
            .store
            .settle_pending(&payment.txn_ref, PaymentStatus::Completed, &result)
            .await?;

        Ok(match settled {
            Some(payment) => {
                tracing::info!(txn_ref = %payment.txn_ref, "Payment settled by reconciliation");
                ReconcileResult {
                    payment,
                    gateway,
                    settled: true,
                }
            }
            None => ReconcileResult {
                payment: self.store.find_by_id(payment_id).await?,
                gateway,
                settled: false,
            },
        })
    }
}
