use chrono::Utc;
use log::info;
use uuid::Uuid;

use crate::{
    db,
    dto::{AvailabilityQuery, NewBookingDto},
    errors::ApiError,
    models::{Booking, BookingStatus, ServiceType, Venue},
    service::{
        auth::UserAuthData,
        availability::{self, SlotRequest, BOOKING_WINDOW_MINUTES},
        mailer, notification, subscription, venue as venue_service,
    },
    PGPool,
};

impl From<&NewBookingDto> for SlotRequest {
    fn from(dto: &NewBookingDto) -> Self {
        SlotRequest {
            date: dto.date,
            time: dto.time,
            party_size: dto.party_size,
            service_type: dto.service_type.unwrap_or(ServiceType::DineIn),
            table_id: dto.table_id,
        }
    }
}

impl From<AvailabilityQuery> for SlotRequest {
    fn from(query: AvailabilityQuery) -> Self {
        SlotRequest {
            date: query.date,
            time: query.time,
            party_size: query.party_size,
            service_type: query.service_type.unwrap_or(ServiceType::DineIn),
            table_id: query.table_id,
        }
    }
}

/// Who may change a booking to `next`: venue managers may apply any valid
/// transition, the customer who made it may only cancel.
pub fn may_set_status(user: &UserAuthData, venue: &Venue, booking: &Booking, next: BookingStatus) -> bool {
    if venue_service::can_manage(user, venue) {
        return true;
    }
    booking.customer_id == Some(user.user_id) && next == BookingStatus::Cancelled
}

pub fn may_view(user: &UserAuthData, venue: &Venue, booking: &Booking) -> bool {
    booking.customer_id == Some(user.user_id) || venue_service::can_manage(user, venue)
}

async fn get_active_venue(id: Uuid, pool: &PGPool) -> Result<Venue, ApiError> {
    let venue = venue_service::get_by_id(id, pool).await?;
    if venue.active {
        Ok(venue)
    } else {
        Err(ApiError::NotFound("venue"))
    }
}

/// Runs the availability checker without creating anything.
pub async fn check_availability(venue_id: Uuid, request: &SlotRequest, pool: &PGPool) -> Result<availability::Verdict, ApiError> {
    if request.party_size < 1 {
        return Err(ApiError::bad_request("party_size must be at least 1"));
    }
    let venue = get_active_venue(venue_id, pool).await?;
    availability::check(&venue, request, pool).await
}

pub async fn create(
    user: Option<&UserAuthData>,
    dto: NewBookingDto,
    free_limit: i32,
    pool: &PGPool,
) -> Result<Booking, ApiError> {
    dto.validate(user.is_some())?;
    let venue = get_active_venue(dto.venue_id, pool).await?;
    subscription::ensure_can_book(venue.id, free_limit, pool).await?;

    let request = SlotRequest::from(&dto);
    availability::check(&venue, &request, pool).await??;

    let customer = match user {
        Some(u) => db::user::get_by_id(u.user_id, pool).await?,
        None => None,
    };
    let guest_name = dto
        .guest_name
        .filter(|n| !n.trim().is_empty())
        .or_else(|| customer.as_ref().map(|c| c.name.clone()))
        .ok_or_else(|| ApiError::bad_request("guest_name is required"))?;
    let guest_email = dto
        .guest_email
        .or_else(|| customer.as_ref().map(|c| c.email.clone()))
        .ok_or_else(|| ApiError::bad_request("guest_email is required"))?;

    let now = Utc::now();
    let booking = Booking {
        id: Uuid::new_v4(),
        venue_id: venue.id,
        table_id: request.table_id,
        customer_id: customer.as_ref().map(|c| c.id),
        guest_name,
        guest_email,
        guest_phone: dto.guest_phone,
        booking_date: request.date,
        booking_time: request.time,
        duration_minutes: BOOKING_WINDOW_MINUTES,
        party_size: request.party_size,
        service_type: request.service_type,
        status: BookingStatus::Pending,
        notes: dto.notes,
        created_at: now,
        updated_at: now,
    };
    db::booking::create(&booking, pool).await?;
    info!(
        "booking {} created at venue {} for {} on {} {}",
        booking.id, venue.id, booking.party_size, booking.booking_date, booking.booking_time
    );

    subscription::record_booking(venue.id, pool).await;
    notification::notify(notification::booking_created(&venue, &booking), pool).await;
    mailer::send(&mailer::booking_received(&booking, &venue));

    Ok(booking)
}

pub async fn get(id: Uuid, user: &UserAuthData, pool: &PGPool) -> Result<Booking, ApiError> {
    let booking = db::booking::get_by_id(id, pool)
        .await?
        .ok_or(ApiError::NotFound("booking"))?;
    let venue = venue_service::get_by_id(booking.venue_id, pool).await?;
    if may_view(user, &venue, &booking) {
        Ok(booking)
    } else {
        Err(ApiError::NotFound("booking"))
    }
}

pub async fn list_mine(user: &UserAuthData, pool: &PGPool) -> Result<Vec<Booking>, ApiError> {
    Ok(db::booking::get_for_customer(user.user_id, pool).await?)
}

pub async fn list_for_venue(
    venue_id: Uuid,
    date: Option<chrono::NaiveDate>,
    user: &UserAuthData,
    pool: &PGPool,
) -> Result<Vec<Booking>, ApiError> {
    let venue = venue_service::get_managed(venue_id, user, pool).await?;
    Ok(db::booking::get_for_venue(venue.id, date, pool).await?)
}

pub async fn update_status(id: Uuid, next: BookingStatus, user: &UserAuthData, pool: &PGPool) -> Result<Booking, ApiError> {
    let booking = get(id, user, pool).await?;
    let venue = venue_service::get_by_id(booking.venue_id, pool).await?;
    if !may_set_status(user, &venue, &booking, next) {
        return Err(ApiError::forbidden("not allowed to change this booking"));
    }
    if !booking.status.can_transition_to(next) {
        return Err(ApiError::conflict(format!(
            "cannot change booking from {} to {}",
            booking.status.as_str(),
            next.as_str()
        )));
    }
    let updated = db::booking::set_status(id, next, pool)
        .await?
        .ok_or(ApiError::NotFound("booking"))?;
    info!(
        "booking {} {} -> {} by {}",
        id,
        booking.status.as_str(),
        next.as_str(),
        user.user_id
    );

    // tell the other side
    let recipient = if booking.customer_id == Some(user.user_id) {
        Some(venue.owner_id)
    } else {
        updated.customer_id
    };
    if let Some(recipient) = recipient {
        notification::notify(notification::booking_status_changed(recipient, &venue, &updated), pool).await;
    }
    mailer::send(&mailer::booking_status_changed(&updated, &venue));

    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, VenueType};
    use chrono::{NaiveDate, NaiveTime};

    fn venue(owner_id: Uuid) -> Venue {
        Venue {
            id: Uuid::new_v4(),
            owner_id,
            name: "Sakura".to_string(),
            address: "9 Hill Rd".to_string(),
            city: "Leeds".to_string(),
            phone: None,
            capacity: 20,
            venue_type: VenueType::Restaurant,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn booking(venue: &Venue, customer_id: Option<Uuid>) -> Booking {
        Booking {
            id: Uuid::new_v4(),
            venue_id: venue.id,
            table_id: None,
            customer_id,
            guest_name: "Kai".to_string(),
            guest_email: "kai@example.com".to_string(),
            guest_phone: None,
            booking_date: NaiveDate::from_ymd_opt(2024, 7, 3).unwrap(),
            booking_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            duration_minutes: BOOKING_WINDOW_MINUTES,
            party_size: 2,
            service_type: ServiceType::DineIn,
            status: BookingStatus::Pending,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn auth(user_id: Uuid, role: Role) -> UserAuthData {
        UserAuthData { user_id, session_id: Uuid::new_v4(), role }
    }

    #[test]
    fn customers_may_only_cancel_their_own_booking() {
        let owner = Uuid::new_v4();
        let customer = Uuid::new_v4();
        let v = venue(owner);
        let b = booking(&v, Some(customer));

        let me = auth(customer, Role::Customer);
        assert!(may_set_status(&me, &v, &b, BookingStatus::Cancelled));
        assert!(!may_set_status(&me, &v, &b, BookingStatus::Confirmed));

        let stranger = auth(Uuid::new_v4(), Role::Customer);
        assert!(!may_set_status(&stranger, &v, &b, BookingStatus::Cancelled));
        assert!(!may_view(&stranger, &v, &b));
        assert!(may_view(&me, &v, &b));
    }

    #[test]
    fn managers_may_apply_any_transition() {
        let owner = Uuid::new_v4();
        let v = venue(owner);
        let b = booking(&v, None);
        assert!(may_set_status(&auth(owner, Role::VenueOwner), &v, &b, BookingStatus::Confirmed));
        assert!(may_set_status(&auth(Uuid::new_v4(), Role::Admin), &v, &b, BookingStatus::NoShow));
        assert!(!may_set_status(&auth(Uuid::new_v4(), Role::VenueOwner), &v, &b, BookingStatus::Confirmed));
    }

    #[test]
    fn slot_request_defaults_to_dine_in() {
        let dto = NewBookingDto {
            venue_id: Uuid::new_v4(),
            table_id: None,
            date: NaiveDate::from_ymd_opt(2024, 7, 3).unwrap(),
            time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            party_size: 3,
            service_type: None,
            guest_name: None,
            guest_email: None,
            guest_phone: None,
            notes: None,
        };
        let request = SlotRequest::from(&dto);
        assert_eq!(request.service_type, ServiceType::DineIn);
        assert_eq!(request.party_size, 3);
    }
}
