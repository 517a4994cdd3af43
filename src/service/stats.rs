use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    db::{
        self,
        stats::{DailyBookings, LabelCount},
    },
    errors::ApiError,
    models::Plan,
    service::{auth::UserAuthData, subscription, venue as venue_service},
    PGPool,
};

pub const ANALYTICS_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Serialize)]
pub struct PlatformStats {
    pub users: i64,
    pub active_venues: i64,
    pub bookings_by_status: Vec<LabelCount>,
    pub subscriptions_by_plan: Vec<LabelCount>,
    pub revenue_cents: i64,
}

#[derive(Debug, Serialize)]
pub struct VenueAnalytics {
    pub venue_id: Uuid,
    pub plan: Plan,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub total_bookings: i64,
    pub total_covers: i64,
    pub bookings_by_status: Vec<LabelCount>,
    pub bookings_by_service_type: Vec<LabelCount>,
    pub daily: Vec<DailyBookings>,
    pub monthly_booking_count: i32,
    pub monthly_booking_limit: Option<i32>,
}

/// Inclusive day range ending today.
pub fn analytics_window(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    (today - Duration::days(ANALYTICS_WINDOW_DAYS - 1), today)
}

pub async fn platform(pool: &PGPool) -> Result<PlatformStats, ApiError> {
    let (users, active_venues, bookings_by_status, subscriptions_by_plan, revenue_cents) = tokio::try_join!(
        db::stats::count_users(pool),
        db::stats::count_active_venues(pool),
        db::stats::bookings_by_status(None, None, pool),
        db::stats::subscriptions_by_plan(pool),
        db::stats::revenue_cents(pool),
    )?;
    Ok(PlatformStats {
        users,
        active_venues,
        bookings_by_status,
        subscriptions_by_plan,
        revenue_cents,
    })
}

/// Dashboard numbers for one venue. Free venues get 403.
pub async fn venue_analytics(
    venue_id: Uuid,
    user: &UserAuthData,
    free_limit: i32,
    pool: &PGPool,
) -> Result<VenueAnalytics, ApiError> {
    let venue = venue_service::get_managed(venue_id, user, pool).await?;
    let sub = subscription::get_or_create(venue.id, free_limit, pool).await?;
    if !sub.plan.has_analytics() {
        return Err(ApiError::forbidden("analytics require a paid or premium plan"));
    }

    let (from, to) = analytics_window(Utc::now().date_naive());
    let (bookings_by_status, bookings_by_service_type, daily) = tokio::try_join!(
        db::stats::bookings_by_status(Some(venue.id), Some((from, to)), pool),
        db::stats::bookings_by_service_type(venue.id, Some((from, to)), pool),
        db::stats::daily_bookings(venue.id, from, to, pool),
    )?;
    Ok(VenueAnalytics {
        venue_id: venue.id,
        plan: sub.plan,
        from,
        to,
        total_bookings: daily.iter().map(|d| d.bookings).sum(),
        total_covers: daily.iter().map(|d| d.covers).sum(),
        bookings_by_status,
        bookings_by_service_type,
        daily,
        monthly_booking_count: sub.monthly_booking_count,
        monthly_booking_limit: sub.monthly_booking_limit,
    })
}
