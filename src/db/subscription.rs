use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{models::{Plan, Subscription, SubscriptionStatus}, PGPool};

/// Inserts the row unless the venue already has one, then returns the stored row.
pub async fn create_if_missing(sub: &Subscription, pool: &PGPool) -> Result<Subscription, sqlx::Error> {
    sqlx::query(
        "INSERT INTO subscriptions (id, venue_id, plan, status, monthly_booking_count, monthly_booking_limit,
            current_period_start, current_period_end, cancel_at_period_end, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (venue_id) DO NOTHING",
    )
    .bind(sub.id)
    .bind(sub.venue_id)
    .bind(sub.plan)
    .bind(sub.status)
    .bind(sub.monthly_booking_count)
    .bind(sub.monthly_booking_limit)
    .bind(sub.current_period_start)
    .bind(sub.current_period_end)
    .bind(sub.cancel_at_period_end)
    .bind(sub.created_at)
    .bind(sub.updated_at)
    .execute(pool)
    .await?;
    sqlx::query_as::<_, Subscription>("SELECT * FROM subscriptions WHERE venue_id = $1")
        .bind(sub.venue_id)
        .fetch_one(pool)
        .await
}

pub async fn get_by_venue(venue_id: Uuid, pool: &PGPool) -> Result<Option<Subscription>, sqlx::Error> {
    sqlx::query_as::<_, Subscription>("SELECT * FROM subscriptions WHERE venue_id = $1")
        .bind(venue_id)
        .fetch_optional(pool)
        .await
}

pub async fn get_by_provider_subscription(provider_id: &str, pool: &PGPool) -> Result<Option<Subscription>, sqlx::Error> {
    sqlx::query_as::<_, Subscription>("SELECT * FROM subscriptions WHERE provider_subscription_id = $1")
        .bind(provider_id)
        .fetch_optional(pool)
        .await
}

pub async fn increment_booking_count(venue_id: Uuid, pool: &PGPool) -> Result<u64, sqlx::Error> {
    let res = sqlx::query(
        "UPDATE subscriptions SET monthly_booking_count = monthly_booking_count + 1, updated_at = NOW()
        WHERE venue_id = $1",
    )
    .bind(venue_id)
    .execute(pool)
    .await?;
    Ok(res.rows_affected())
}

pub async fn set_provider_customer(venue_id: Uuid, customer_id: &str, pool: &PGPool) -> Result<u64, sqlx::Error> {
    let res = sqlx::query(
        "UPDATE subscriptions SET provider_customer_id = $2, updated_at = NOW() WHERE venue_id = $1",
    )
    .bind(venue_id)
    .bind(customer_id)
    .execute(pool)
    .await?;
    Ok(res.rows_affected())
}

/// Switches plan and status; the booking limit follows the plan.
pub async fn activate_plan(
    venue_id: Uuid,
    plan: Plan,
    limit: Option<i32>,
    provider_customer_id: Option<&str>,
    provider_subscription_id: Option<&str>,
    pool: &PGPool,
) -> Result<u64, sqlx::Error> {
    let res = sqlx::query(
        "UPDATE subscriptions
        SET plan = $2, status = 'active', monthly_booking_limit = $3,
            provider_customer_id = COALESCE($4, provider_customer_id),
            provider_subscription_id = COALESCE($5, provider_subscription_id),
            cancel_at_period_end = FALSE, updated_at = NOW()
        WHERE venue_id = $1",
    )
    .bind(venue_id)
    .bind(plan)
    .bind(limit)
    .bind(provider_customer_id)
    .bind(provider_subscription_id)
    .execute(pool)
    .await?;
    Ok(res.rows_affected())
}

pub async fn link_provider_subscription(id: Uuid, provider_subscription_id: &str, pool: &PGPool) -> Result<u64, sqlx::Error> {
    let res = sqlx::query(
        "UPDATE subscriptions SET provider_subscription_id = $2, updated_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .bind(provider_subscription_id)
    .execute(pool)
    .await?;
    Ok(res.rows_affected())
}

pub async fn update_from_provider(
    id: Uuid,
    plan: Plan,
    limit: Option<i32>,
    status: SubscriptionStatus,
    period: Option<(DateTime<Utc>, DateTime<Utc>)>,
    cancel_at_period_end: bool,
    pool: &PGPool,
) -> Result<u64, sqlx::Error> {
    let (start, end) = period.unzip();
    let res = sqlx::query(
        "UPDATE subscriptions
        SET plan = $2, monthly_booking_limit = $3, status = $4,
            current_period_start = COALESCE($5, current_period_start),
            current_period_end = COALESCE($6, current_period_end),
            cancel_at_period_end = $7, updated_at = NOW()
        WHERE id = $1",
    )
    .bind(id)
    .bind(plan)
    .bind(limit)
    .bind(status)
    .bind(start)
    .bind(end)
    .bind(cancel_at_period_end)
    .execute(pool)
    .await?;
    Ok(res.rows_affected())
}

pub async fn downgrade_to_free(id: Uuid, limit: i32, pool: &PGPool) -> Result<u64, sqlx::Error> {
    let res = sqlx::query(
        "UPDATE subscriptions
        SET plan = 'free', status = 'canceled', monthly_booking_limit = $2,
            provider_subscription_id = NULL, cancel_at_period_end = FALSE, updated_at = NOW()
        WHERE id = $1",
    )
    .bind(id)
    .bind(limit)
    .execute(pool)
    .await?;
    Ok(res.rows_affected())
}

pub async fn set_status(id: Uuid, status: SubscriptionStatus, pool: &PGPool) -> Result<u64, sqlx::Error> {
    let res = sqlx::query("UPDATE subscriptions SET status = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(status)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}

/// Zeroes the counter and starts a new billing period.
pub async fn reset_usage(
    id: Uuid,
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
    pool: &PGPool,
) -> Result<u64, sqlx::Error> {
    let res = sqlx::query(
        "UPDATE subscriptions
        SET monthly_booking_count = 0, current_period_start = $2, current_period_end = $3, updated_at = NOW()
        WHERE id = $1",
    )
    .bind(id)
    .bind(period_start)
    .bind(period_end)
    .execute(pool)
    .await?;
    Ok(res.rows_affected())
}

pub async fn get_period_ended(now: DateTime<Utc>, pool: &PGPool) -> Result<Vec<Subscription>, sqlx::Error> {
    sqlx::query_as::<_, Subscription>("SELECT * FROM subscriptions WHERE current_period_end <= $1")
        .bind(now)
        .fetch_all(pool)
        .await
}
