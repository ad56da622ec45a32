use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{GatewayResult, NewPayment, Payment, PaymentStatus};

const PAYMENT_COLUMNS: &str = r#"
    id, order_id, txn_ref, amount, status, order_info, client_ip, create_date,
    transaction_no, response_code, bank_code, pay_date,
    completed_at, created_at, updated_at
"#;

pub struct PaymentRepository;

impl PaymentRepository {
    pub async fn create(pool: &PgPool, new: &NewPayment) -> AppResult<Payment> {
        let now = Utc::now();

        let query = format!(
            r#"
            INSERT INTO payments (
                id, order_id, txn_ref, amount, status, order_info, client_ip,
                create_date, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        );

        let payment = sqlx::query_as::<_, Payment>(&query)
            .bind(Uuid::new_v4())
            .bind(&new.order_id)
            .bind(&new.txn_ref)
            .bind(new.amount)
            .bind(PaymentStatus::Pending)
            .bind(&new.order_info)
            .bind(&new.client_ip)
            .bind(&new.create_date)
            .bind(now)
            .bind(now)
            .fetch_one(pool)
            .await?;

        Ok(payment)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> AppResult<Payment> {
        let query = format!("SELECT {} FROM payments WHERE id = $1", PAYMENT_COLUMNS);

        sqlx::query_as::<_, Payment>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Payment {} not found", id)))
    }

    pub async fn find_by_txn_ref(pool: &PgPool, txn_ref: &str) -> AppResult<Option<Payment>> {
        let query = format!("SELECT {} FROM payments WHERE txn_ref = $1", PAYMENT_COLUMNS);

        let payment = sqlx::query_as::<_, Payment>(&query)
            .bind(txn_ref)
            .fetch_optional(pool)
            .await?;

        Ok(payment)
    }

    /// Moves a payment out of `pending` in a single conditional statement.
    /// Returns `None` when the row was not pending, so concurrent or
    /// replayed callbacks settle a payment at most once.
    pub async fn settle_pending(
        pool: &PgPool,
        txn_ref: &str,
        status: PaymentStatus,
        result: &GatewayResult,
    ) -> AppResult<Option<Payment>> {
        let now = Utc::now();
        let completed_at = (status == PaymentStatus::Completed).then_some(now);

        let query = format!(
            r#"
            UPDATE payments
            SET status = $2, transaction_no = $3, response_code = $4,
                bank_code = $5, pay_date = $6, completed_at = $7, updated_at = $8
            WHERE txn_ref = $1 AND status = 'pending'
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        );

        let payment = sqlx::query_as::<_, Payment>(&query)
            .bind(txn_ref)
            .bind(status)
            .bind(&result.transaction_no)
            .bind(&result.response_code)
            .bind(&result.bank_code)
            .bind(&result.pay_date)
            .bind(completed_at)
            .bind(now)
            .fetch_optional(pool)
            .await?;

        Ok(payment)
    }
}
