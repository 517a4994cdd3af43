use chrono::{DateTime, Datelike, Months, TimeZone, Utc};
use log::{info, warn};
use uuid::Uuid;

use crate::{
    db,
    errors::ApiError,
    models::{Plan, Subscription, SubscriptionStatus},
    service::{auth::UserAuthData, venue as venue_service},
    PGPool,
};

/// Calendar month containing `now`, as `[start, end)` in UTC.
pub fn month_period(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = Utc
        .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now);
    let end = start.checked_add_months(Months::new(1)).unwrap_or(start);
    (start, end)
}

/// Rolls a billing period forward month by month until it contains `now`.
pub fn next_period(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let (mut start, mut end) = (start, end);
    while end <= now {
        start = end;
        end = match end.checked_add_months(Months::new(1)) {
            Some(next) => next,
            None => break,
        };
    }
    (start, end)
}

pub fn new_free(venue_id: Uuid, free_limit: i32, now: DateTime<Utc>) -> Subscription {
    let (current_period_start, current_period_end) = month_period(now);
    Subscription {
        id: Uuid::new_v4(),
        venue_id,
        plan: Plan::Free,
        status: SubscriptionStatus::Active,
        monthly_booking_count: 0,
        monthly_booking_limit: Plan::Free.booking_limit(free_limit),
        current_period_start,
        current_period_end,
        cancel_at_period_end: false,
        provider_customer_id: None,
        provider_subscription_id: None,
        created_at: now,
        updated_at: now,
    }
}

/// The cap that applies right now. Paid and premium are uncapped while
/// active; a lapsed (past due or canceled) paid plan falls back to the free cap.
pub fn effective_limit(sub: &Subscription, free_limit: i32) -> Option<i32> {
    match (sub.plan, sub.status) {
        (Plan::Free, _) => sub.monthly_booking_limit,
        (_, SubscriptionStatus::Active) => None,
        _ => Some(free_limit),
    }
}

pub fn check_quota(sub: &Subscription, free_limit: i32) -> Result<(), ApiError> {
    match effective_limit(sub, free_limit) {
        Some(limit) if sub.monthly_booking_count >= limit => Err(ApiError::forbidden(format!(
            "monthly booking limit of {limit} reached; upgrade or renew the subscription"
        ))),
        _ => Ok(()),
    }
}

pub async fn get_or_create(venue_id: Uuid, free_limit: i32, pool: &PGPool) -> Result<Subscription, ApiError> {
    if let Some(sub) = db::subscription::get_by_venue(venue_id, pool).await? {
        return Ok(sub);
    }
    let sub = db::subscription::create_if_missing(&new_free(venue_id, free_limit, Utc::now()), pool).await?;
    info!("created free subscription for venue {}", venue_id);
    Ok(sub)
}

pub async fn ensure_can_book(venue_id: Uuid, free_limit: i32, pool: &PGPool) -> Result<Subscription, ApiError> {
    let sub = get_or_create(venue_id, free_limit, pool).await?;
    check_quota(&sub, free_limit)?;
    Ok(sub)
}

/// The subscription of a venue the caller manages.
pub async fn for_venue(venue_id: Uuid, user: &UserAuthData, free_limit: i32, pool: &PGPool) -> Result<Subscription, ApiError> {
    let venue = venue_service::get_managed(venue_id, user, pool).await?;
    get_or_create(venue.id, free_limit, pool).await
}

/// Bumps the monthly counter after a booking was stored. Failure is logged
/// and otherwise ignored, so the counter may drift from the real count.
pub async fn record_booking(venue_id: Uuid, pool: &PGPool) {
    match db::subscription::increment_booking_count(venue_id, pool).await {
        Ok(0) => warn!("no subscription row to count booking for venue {}", venue_id),
        Ok(_) => {}
        Err(err) => warn!("failed to increment booking counter for venue {}: {:?}", venue_id, err),
    }
}

/// Resets usage for every subscription whose billing period has ended.
pub async fn rollover_ended_periods(pool: &PGPool) -> Result<u64, ApiError> {
    let now = Utc::now();
    let mut rolled = 0;
    for sub in db::subscription::get_period_ended(now, pool).await? {
        let (start, end) = next_period(sub.current_period_start, sub.current_period_end, now);
        rolled += db::subscription::reset_usage(sub.id, start, end, pool).await?;
    }
    info!("rolled over {} subscription billing periods", rolled);
    Ok(rolled)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn sub(plan: Plan, count: i32, limit: Option<i32>) -> Subscription {
        Subscription {
            plan,
            monthly_booking_count: count,
            monthly_booking_limit: limit,
            ..new_free(Uuid::new_v4(), 50, at(2024, 5, 10, 12))
        }
    }

    #[test]
    fn month_period_covers_calendar_month() {
        let (start, end) = month_period(at(2024, 2, 14, 9));
        assert_eq!(start, at(2024, 2, 1, 0));
        assert_eq!(end, at(2024, 3, 1, 0));

        let (start, end) = month_period(at(2023, 12, 31, 23));
        assert_eq!(start, at(2023, 12, 1, 0));
        assert_eq!(end, at(2024, 1, 1, 0));
    }

    #[test]
    fn next_period_skips_missed_months() {
        let (start, end) = next_period(at(2024, 1, 1, 0), at(2024, 2, 1, 0), at(2024, 4, 15, 0));
        assert_eq!(start, at(2024, 4, 1, 0));
        assert_eq!(end, at(2024, 5, 1, 0));
    }

    #[test]
    fn new_free_subscription_defaults() {
        let s = new_free(Uuid::new_v4(), 50, at(2024, 5, 10, 12));
        assert_eq!(s.plan, Plan::Free);
        assert_eq!(s.monthly_booking_limit, Some(50));
        assert_eq!(s.monthly_booking_count, 0);
        assert_eq!(s.current_period_start, at(2024, 5, 1, 0));
    }

    #[test]
    fn fifty_first_free_booking_is_rejected() {
        assert!(check_quota(&sub(Plan::Free, 49, Some(50)), 50).is_ok());
        assert!(matches!(check_quota(&sub(Plan::Free, 50, Some(50)), 50), Err(ApiError::Forbidden(_))));
        assert!(check_quota(&sub(Plan::Free, 75, Some(50)), 50).is_err());
    }

    #[test]
    fn paid_tiers_are_never_capped() {
        assert!(check_quota(&sub(Plan::Paid, 10_000, Some(50)), 50).is_ok());
        assert!(check_quota(&sub(Plan::Premium, 10_000, None), 50).is_ok());
    }

    #[test]
    fn lapsed_paid_plans_fall_back_to_the_free_cap() {
        let past_due = Subscription {
            status: SubscriptionStatus::PastDue,
            ..sub(Plan::Paid, 50, None)
        };
        assert_eq!(effective_limit(&past_due, 50), Some(50));
        assert!(matches!(check_quota(&past_due, 50), Err(ApiError::Forbidden(_))));

        let canceled = Subscription {
            status: SubscriptionStatus::Canceled,
            ..sub(Plan::Premium, 10, None)
        };
        assert!(check_quota(&canceled, 50).is_ok());
        assert!(check_quota(&Subscription { monthly_booking_count: 50, ..canceled }, 50).is_err());
    }

    #[test]
    fn free_without_limit_is_uncapped() {
        assert!(check_quota(&sub(Plan::Free, 500, None), 50).is_ok());
    }
}
