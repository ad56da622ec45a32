use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "callback_source", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CallbackSource {
    /// Shopper's browser redirected back to the storefront.
    Return,
    /// Server-to-server notification.
    Ipn,
}

/// Audit record of one inbound gateway callback, stored whether or not it
/// verified.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CallbackEvent {
    pub id: Uuid,
    pub source: CallbackSource,
    pub txn_ref: Option<String>,
    pub signature_verified: bool,
    pub payload: serde_json::Value,
    pub outcome: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCallbackEvent {
    pub source: CallbackSource,
    pub txn_ref: Option<String>,
    pub signature_verified: bool,
    pub payload: serde_json::Value,
    pub outcome: String,
}

impl CallbackEvent {
    pub fn from_new(event: NewCallbackEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: event.source,
            txn_ref: event.txn_ref,
            signature_verified: event.signature_verified,
            payload: event.payload,
            outcome: event.outcome,
            created_at: Utc::now(),
        }
    }
}
