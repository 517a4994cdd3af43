use uuid::Uuid;

use crate::{models::Notification, PGPool};

pub async fn create(notification: &Notification, pool: &PGPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO notifications (id, user_id, kind, title, message, booking_id, read, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(notification.id)
    .bind(notification.user_id)
    .bind(notification.kind)
    .bind(&notification.title)
    .bind(&notification.message)
    .bind(notification.booking_id)
    .bind(notification.read)
    .bind(notification.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_for_user(user_id: Uuid, unread_only: bool, pool: &PGPool) -> Result<Vec<Notification>, sqlx::Error> {
    sqlx::query_as::<_, Notification>(
        "SELECT * FROM notifications WHERE user_id = $1 AND (NOT $2 OR NOT read) ORDER BY created_at DESC",
    )
    .bind(user_id)
    .bind(unread_only)
    .fetch_all(pool)
    .await
}

pub async fn mark_read(id: Uuid, user_id: Uuid, pool: &PGPool) -> Result<u64, sqlx::Error> {
    let res = sqlx::query("UPDATE notifications SET read = TRUE WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}

pub async fn mark_all_read(user_id: Uuid, pool: &PGPool) -> Result<u64, sqlx::Error> {
    let res = sqlx::query("UPDATE notifications SET read = TRUE WHERE user_id = $1 AND NOT read")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}
