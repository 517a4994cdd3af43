use uuid::Uuid;

use crate::{models::Venue, PGPool};

pub async fn create(venue: &Venue, pool: &PGPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO venues (id, owner_id, name, address, city, phone, capacity, venue_type, active, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
    )
    .bind(venue.id)
    .bind(venue.owner_id)
    .bind(&venue.name)
    .bind(&venue.address)
    .bind(&venue.city)
    .bind(&venue.phone)
    .bind(venue.capacity)
    .bind(venue.venue_type)
    .bind(venue.active)
    .bind(venue.created_at)
    .bind(venue.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_by_id(id: Uuid, pool: &PGPool) -> Result<Option<Venue>, sqlx::Error> {
    sqlx::query_as::<_, Venue>("SELECT * FROM venues WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn get_active(city: Option<&str>, pool: &PGPool) -> Result<Vec<Venue>, sqlx::Error> {
    sqlx::query_as::<_, Venue>(
        "SELECT * FROM venues
        WHERE active AND ($1::TEXT IS NULL OR lower(city) = lower($1))
        ORDER BY name",
    )
    .bind(city)
    .fetch_all(pool)
    .await
}

pub async fn update(venue: &Venue, pool: &PGPool) -> Result<u64, sqlx::Error> {
    let res = sqlx::query(
        "UPDATE venues
        SET name = $2, address = $3, city = $4, phone = $5, capacity = $6, venue_type = $7, active = $8, updated_at = NOW()
        WHERE id = $1",
    )
    .bind(venue.id)
    .bind(&venue.name)
    .bind(&venue.address)
    .bind(&venue.city)
    .bind(&venue.phone)
    .bind(venue.capacity)
    .bind(venue.venue_type)
    .bind(venue.active)
    .execute(pool)
    .await?;
    Ok(res.rows_affected())
}
