use chrono::NaiveDate;
use serde::Serialize;
use sqlx::prelude::FromRow;
use uuid::Uuid;

use crate::PGPool;

#[derive(Debug, FromRow, Serialize)]
pub struct LabelCount {
    pub label: String,
    pub count: i64,
}

#[derive(Debug, FromRow, Serialize)]
pub struct DailyBookings {
    pub day: NaiveDate,
    pub bookings: i64,
    pub covers: i64,
}

pub async fn count_users(pool: &PGPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users").fetch_one(pool).await
}

pub async fn count_active_venues(pool: &PGPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM venues WHERE active").fetch_one(pool).await
}

/// Inclusive booking-date range; `None` counts all time.
pub type DateRange = Option<(NaiveDate, NaiveDate)>;

pub async fn bookings_by_status(venue_id: Option<Uuid>, range: DateRange, pool: &PGPool) -> Result<Vec<LabelCount>, sqlx::Error> {
    let (from, to) = range.unzip();
    sqlx::query_as::<_, LabelCount>(
        "SELECT status::TEXT AS label, COUNT(*) AS count FROM bookings
        WHERE ($1::UUID IS NULL OR venue_id = $1)
            AND ($2::DATE IS NULL OR booking_date BETWEEN $2 AND $3)
        GROUP BY status ORDER BY status",
    )
    .bind(venue_id)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await
}

pub async fn bookings_by_service_type(venue_id: Uuid, range: DateRange, pool: &PGPool) -> Result<Vec<LabelCount>, sqlx::Error> {
    let (from, to) = range.unzip();
    sqlx::query_as::<_, LabelCount>(
        "SELECT service_type::TEXT AS label, COUNT(*) AS count FROM bookings
        WHERE venue_id = $1 AND ($2::DATE IS NULL OR booking_date BETWEEN $2 AND $3)
        GROUP BY service_type ORDER BY service_type",
    )
    .bind(venue_id)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await
}

pub async fn subscriptions_by_plan(pool: &PGPool) -> Result<Vec<LabelCount>, sqlx::Error> {
    sqlx::query_as::<_, LabelCount>(
        "SELECT plan::TEXT AS label, COUNT(*) AS count FROM subscriptions
        WHERE status <> 'canceled'
        GROUP BY plan ORDER BY plan",
    )
    .fetch_all(pool)
    .await
}

pub async fn revenue_cents(pool: &PGPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COALESCE(SUM(amount_cents), 0)::BIGINT FROM payments WHERE status = 'succeeded'",
    )
    .fetch_one(pool)
    .await
}

pub async fn daily_bookings(venue_id: Uuid, from: NaiveDate, to: NaiveDate, pool: &PGPool) -> Result<Vec<DailyBookings>, sqlx::Error> {
    sqlx::query_as::<_, DailyBookings>(
        "SELECT booking_date AS day, COUNT(*) AS bookings, COALESCE(SUM(party_size), 0)::BIGINT AS covers
        FROM bookings
        WHERE venue_id = $1 AND booking_date BETWEEN $2 AND $3 AND status NOT IN ('cancelled', 'no_show')
        GROUP BY booking_date ORDER BY booking_date",
    )
    .bind(venue_id)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{self, init_db_pool},
        models::{Booking, BookingStatus, Role, ServiceType, User, Venue, VenueType},
    };
    use chrono::{NaiveTime, Utc};

    fn booking(venue_id: Uuid, date: NaiveDate, service_type: ServiceType) -> Booking {
        let now = Utc::now();
        Booking {
            id: Uuid::new_v4(),
            venue_id,
            table_id: None,
            customer_id: None,
            guest_name: "Guest".to_string(),
            guest_email: "guest@example.com".to_string(),
            guest_phone: None,
            booking_date: date,
            booking_time: NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
            duration_minutes: 120,
            party_size: 2,
            service_type,
            status: BookingStatus::Confirmed,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[actix_rt::test]
    #[ignore = "needs Postgres at DATABASE_URL"]
    async fn breakdowns_only_count_bookings_inside_the_range() {
        let url = std::env::var("DATABASE_URL").unwrap();
        let pool = init_db_pool(&url, 2).await.unwrap();
        let now = Utc::now();
        let owner = User {
            id: Uuid::new_v4(),
            email: format!("{}@example.com", Uuid::new_v4()),
            pwd_hash: String::new(),
            name: "Owner".to_string(),
            role: Role::VenueOwner,
            active: true,
            created_at: now,
            updated_at: now,
        };
        db::user::create(&owner, &pool).await.unwrap();
        let venue = Venue {
            id: Uuid::new_v4(),
            owner_id: owner.id,
            name: "Trattoria".to_string(),
            address: "1 Main St".to_string(),
            city: "Lisbon".to_string(),
            phone: None,
            capacity: 40,
            venue_type: VenueType::Restaurant,
            active: true,
            created_at: now,
            updated_at: now,
        };
        db::venue::create(&venue, &pool).await.unwrap();

        let from = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 3, 30).unwrap();
        let old = NaiveDate::from_ymd_opt(2023, 12, 24).unwrap();
        db::booking::create(&booking(venue.id, from, ServiceType::DineIn), &pool).await.unwrap();
        db::booking::create(&booking(venue.id, to, ServiceType::DineIn), &pool).await.unwrap();
        db::booking::create(&booking(venue.id, old, ServiceType::Event), &pool).await.unwrap();

        let by_type = bookings_by_service_type(venue.id, Some((from, to)), &pool).await.unwrap();
        assert_eq!(by_type.len(), 1);
        assert_eq!(by_type[0].label, "dine_in");
        assert_eq!(by_type[0].count, 2);

        let by_status = bookings_by_status(Some(venue.id), Some((from, to)), &pool).await.unwrap();
        assert_eq!(by_status.iter().map(|c| c.count).sum::<i64>(), 2);

        let all_time = bookings_by_status(Some(venue.id), None, &pool).await.unwrap();
        assert_eq!(all_time.iter().map(|c| c.count).sum::<i64>(), 3);
    }
}
