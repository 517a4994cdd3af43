use chrono::{NaiveDate, NaiveTime};
use uuid::Uuid;

use crate::{models::{Booking, BookingStatus}, PGPool};

pub async fn create(booking: &Booking, pool: &PGPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO bookings (id, venue_id, table_id, customer_id, guest_name, guest_email, guest_phone,
            booking_date, booking_time, duration_minutes, party_size, service_type, status, notes, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
    )
    .bind(booking.id)
    .bind(booking.venue_id)
    .bind(booking.table_id)
    .bind(booking.customer_id)
    .bind(&booking.guest_name)
    .bind(&booking.guest_email)
    .bind(&booking.guest_phone)
    .bind(booking.booking_date)
    .bind(booking.booking_time)
    .bind(booking.duration_minutes)
    .bind(booking.party_size)
    .bind(booking.service_type)
    .bind(booking.status)
    .bind(&booking.notes)
    .bind(booking.created_at)
    .bind(booking.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_by_id(id: Uuid, pool: &PGPool) -> Result<Option<Booking>, sqlx::Error> {
    sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Pending and confirmed bookings on one table for one day.
pub async fn active_for_table(table_id: Uuid, date: NaiveDate, pool: &PGPool) -> Result<Vec<Booking>, sqlx::Error> {
    sqlx::query_as::<_, Booking>(
        "SELECT * FROM bookings
        WHERE table_id = $1 AND booking_date = $2 AND status IN ('pending', 'confirmed')
        ORDER BY booking_time",
    )
    .bind(table_id)
    .bind(date)
    .fetch_all(pool)
    .await
}

/// Sum of party sizes of pending and confirmed bookings in one venue slot.
pub async fn active_party_total(venue_id: Uuid, date: NaiveDate, time: NaiveTime, pool: &PGPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COALESCE(SUM(party_size), 0)::BIGINT FROM bookings
        WHERE venue_id = $1 AND booking_date = $2 AND booking_time = $3 AND status IN ('pending', 'confirmed')",
    )
    .bind(venue_id)
    .bind(date)
    .bind(time)
    .fetch_one(pool)
    .await
}

pub async fn get_for_venue(venue_id: Uuid, date: Option<NaiveDate>, pool: &PGPool) -> Result<Vec<Booking>, sqlx::Error> {
    sqlx::query_as::<_, Booking>(
        "SELECT * FROM bookings
        WHERE venue_id = $1 AND ($2::DATE IS NULL OR booking_date = $2)
        ORDER BY booking_date, booking_time",
    )
    .bind(venue_id)
    .bind(date)
    .fetch_all(pool)
    .await
}

pub async fn get_for_customer(customer_id: Uuid, pool: &PGPool) -> Result<Vec<Booking>, sqlx::Error> {
    sqlx::query_as::<_, Booking>(
        "SELECT * FROM bookings WHERE customer_id = $1 ORDER BY booking_date DESC, booking_time DESC",
    )
    .bind(customer_id)
    .fetch_all(pool)
    .await
}

pub async fn set_status(id: Uuid, status: BookingStatus, pool: &PGPool) -> Result<Option<Booking>, sqlx::Error> {
    sqlx::query_as::<_, Booking>(
        "UPDATE bookings SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(status)
    .fetch_optional(pool)
    .await
}
