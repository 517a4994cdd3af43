use crate::{models::Payment, PGPool};

/// Returns false when the invoice was already recorded.
pub async fn record(payment: &Payment, pool: &PGPool) -> Result<bool, sqlx::Error> {
    let res = sqlx::query(
        "INSERT INTO payments (id, subscription_id, provider_invoice_id, amount_cents, currency, status, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (provider_invoice_id) DO NOTHING",
    )
    .bind(payment.id)
    .bind(payment.subscription_id)
    .bind(&payment.provider_invoice_id)
    .bind(payment.amount_cents)
    .bind(&payment.currency)
    .bind(payment.status)
    .bind(payment.created_at)
    .execute(pool)
    .await?;
    Ok(res.rows_affected() > 0)
}
