use chrono::Utc;
use log::warn;
use uuid::Uuid;

use crate::{
    db,
    errors::ApiError,
    models::{Booking, Notification, NotificationKind, Venue},
    PGPool,
};

pub fn build(user_id: Uuid, kind: NotificationKind, title: String, message: String, booking_id: Option<Uuid>) -> Notification {
    Notification {
        id: Uuid::new_v4(),
        user_id,
        kind,
        title,
        message,
        booking_id,
        read: false,
        created_at: Utc::now(),
    }
}

/// Best effort: a failed insert is logged and never surfaces to the caller.
pub async fn notify(notification: Notification, pool: &PGPool) {
    if let Err(err) = db::notification::create(&notification, pool).await {
        warn!(
            "failed to create {:?} notification for user {}: {:?}",
            notification.kind, notification.user_id, err
        );
    }
}

pub fn booking_created(venue: &Venue, booking: &Booking) -> Notification {
    build(
        venue.owner_id,
        NotificationKind::BookingCreated,
        format!("New booking at {}", venue.name),
        format!(
            "{} booked for {} on {} at {}",
            booking.guest_name,
            booking.party_size,
            booking.booking_date,
            booking.booking_time.format("%H:%M")
        ),
        Some(booking.id),
    )
}

pub fn booking_status_changed(user_id: Uuid, venue: &Venue, booking: &Booking) -> Notification {
    build(
        user_id,
        NotificationKind::BookingStatusChanged,
        format!("Booking at {} {}", venue.name, booking.status.as_str()),
        format!(
            "The booking on {} at {} is now {}",
            booking.booking_date,
            booking.booking_time.format("%H:%M"),
            booking.status.as_str()
        ),
        Some(booking.id),
    )
}

pub async fn list(user_id: Uuid, unread_only: bool, pool: &PGPool) -> Result<Vec<Notification>, ApiError> {
    Ok(db::notification::get_for_user(user_id, unread_only, pool).await?)
}

pub async fn mark_read(id: Uuid, user_id: Uuid, pool: &PGPool) -> Result<(), ApiError> {
    match db::notification::mark_read(id, user_id, pool).await? {
        0 => Err(ApiError::NotFound("notification")),
        _ => Ok(()),
    }
}

pub async fn mark_all_read(user_id: Uuid, pool: &PGPool) -> Result<u64, ApiError> {
    Ok(db::notification::mark_all_read(user_id, pool).await?)
}
