use uuid::Uuid;

use crate::{models::VenueTable, PGPool};

pub async fn create(table: &VenueTable, pool: &PGPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO venue_tables (id, venue_id, label, capacity, active, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(table.id)
    .bind(table.venue_id)
    .bind(&table.label)
    .bind(table.capacity)
    .bind(table.active)
    .bind(table.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_by_id(id: Uuid, pool: &PGPool) -> Result<Option<VenueTable>, sqlx::Error> {
    sqlx::query_as::<_, VenueTable>("SELECT * FROM venue_tables WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn get_for_venue(venue_id: Uuid, pool: &PGPool) -> Result<Vec<VenueTable>, sqlx::Error> {
    sqlx::query_as::<_, VenueTable>("SELECT * FROM venue_tables WHERE venue_id = $1 ORDER BY label")
        .bind(venue_id)
        .fetch_all(pool)
        .await
}

pub async fn update(table: &VenueTable, pool: &PGPool) -> Result<u64, sqlx::Error> {
    let res = sqlx::query("UPDATE venue_tables SET label = $2, capacity = $3, active = $4 WHERE id = $1")
        .bind(table.id)
        .bind(&table.label)
        .bind(table.capacity)
        .bind(table.active)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}
