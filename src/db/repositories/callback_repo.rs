use sqlx::PgPool;

use crate::error::AppResult;
use crate::models::{CallbackEvent, NewCallbackEvent};

pub struct CallbackRepository;

impl CallbackRepository {
    pub async fn create(pool: &PgPool, new: NewCallbackEvent) -> AppResult<CallbackEvent> {
        let event = CallbackEvent::from_new(new);

        let stored = sqlx::query_as::<_, CallbackEvent>(
            r#"
            INSERT INTO callback_events (
                id, source, txn_ref, signature_verified, payload, outcome, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, source, txn_ref, signature_verified, payload, outcome, created_at
            "#,
        )
        .bind(event.id)
        .bind(event.source)
        .bind(&event.txn_ref)
        .bind(event.signature_verified)
        .bind(&event.payload)
        .bind(&event.outcome)
        .bind(event.created_at)
        .fetch_one(pool)
        .await?;

        Ok(stored)
    }

    pub async fn find_by_txn_ref(pool: &PgPool, txn_ref: &str) -> AppResult<Vec<CallbackEvent>> {
        let events = sqlx::query_as::<_, CallbackEvent>(
            r#"
            SELECT id, source, txn_ref, signature_verified, payload, outcome, created_at
            FROM callback_events
            WHERE txn_ref = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(txn_ref)
        .fetch_all(pool)
        .await?;

        Ok(events)
    }
}
