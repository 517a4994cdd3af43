use uuid::Uuid;

use crate::{dto::OpeningIntervalDto, models::OpeningHours, PGPool};

pub async fn get_for_venue(venue_id: Uuid, pool: &PGPool) -> Result<Vec<OpeningHours>, sqlx::Error> {
    sqlx::query_as::<_, OpeningHours>(
        "SELECT * FROM opening_hours WHERE venue_id = $1 ORDER BY day_of_week, open_time",
    )
    .bind(venue_id)
    .fetch_all(pool)
    .await
}

pub async fn get_for_day(venue_id: Uuid, day_of_week: i16, pool: &PGPool) -> Result<Vec<OpeningHours>, sqlx::Error> {
    sqlx::query_as::<_, OpeningHours>(
        "SELECT * FROM opening_hours WHERE venue_id = $1 AND day_of_week = $2 ORDER BY open_time",
    )
    .bind(venue_id)
    .bind(day_of_week)
    .fetch_all(pool)
    .await
}

/// Replaces the venue's whole schedule in one transaction.
pub async fn replace(venue_id: Uuid, intervals: &[OpeningIntervalDto], pool: &PGPool) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM opening_hours WHERE venue_id = $1")
        .bind(venue_id)
        .execute(&mut *tx)
        .await?;
    for interval in intervals {
        sqlx::query(
            "INSERT INTO opening_hours (id, venue_id, day_of_week, open_time, close_time)
            VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(Uuid::new_v4())
        .bind(venue_id)
        .bind(interval.day_of_week)
        .bind(interval.open_time)
        .bind(interval.close_time)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await
}
