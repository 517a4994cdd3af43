use crate::PGPool;

/// Records the event id; returns false if it was seen before.
pub async fn mark_processed(event_id: &str, event_type: &str, pool: &PGPool) -> Result<bool, sqlx::Error> {
    let res = sqlx::query(
        "INSERT INTO processed_webhook_events (event_id, event_type) VALUES ($1, $2)
        ON CONFLICT DO NOTHING",
    )
    .bind(event_id)
    .bind(event_type)
    .execute(pool)
    .await?;
    Ok(res.rows_affected() > 0)
}

/// Forgets the event id so a redelivery is applied again.
pub async fn unmark(event_id: &str, pool: &PGPool) -> Result<u64, sqlx::Error> {
    let res = sqlx::query("DELETE FROM processed_webhook_events WHERE event_id = $1")
        .bind(event_id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}
