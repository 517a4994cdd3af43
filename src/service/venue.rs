use chrono::Utc;
use log::info;
use uuid::Uuid;

use crate::{
    db,
    dto::{NewTableDto, NewVenueDto, OpeningIntervalDto, UpdateTableDto, UpdateVenueDto, VenueDetails},
    errors::ApiError,
    models::{OpeningHours, Role, Venue, VenueTable, VenueType},
    service::{auth::UserAuthData, subscription},
    PGPool,
};

/// Rejects bad weekdays, empty intervals and intervals that overlap on the
/// same day. Touching intervals (12:00-15:00, 15:00-18:00) are allowed.
pub fn validate_opening_hours(intervals: &[OpeningIntervalDto]) -> Result<(), ApiError> {
    for interval in intervals {
        if !(0..=6).contains(&interval.day_of_week) {
            return Err(ApiError::bad_request("day_of_week must be between 0 (Monday) and 6 (Sunday)"));
        }
        if interval.close_time <= interval.open_time {
            return Err(ApiError::bad_request("close_time must be after open_time"));
        }
    }
    let mut sorted = intervals.to_vec();
    sorted.sort_by_key(|i| (i.day_of_week, i.open_time));
    for pair in sorted.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if a.day_of_week == b.day_of_week && b.open_time < a.close_time {
            return Err(ApiError::bad_request(format!(
                "opening hours overlap on day {}: {}-{} and {}-{}",
                a.day_of_week, a.open_time, a.close_time, b.open_time, b.close_time
            )));
        }
    }
    Ok(())
}

pub fn can_manage(user: &UserAuthData, venue: &Venue) -> bool {
    user.role == Role::Admin || venue.owner_id == user.user_id
}

pub async fn get_by_id(id: Uuid, pool: &PGPool) -> Result<Venue, ApiError> {
    db::venue::get_by_id(id, pool)
        .await?
        .ok_or(ApiError::NotFound("venue"))
}

/// Loads the venue and checks the caller may manage it.
pub async fn get_managed(id: Uuid, user: &UserAuthData, pool: &PGPool) -> Result<Venue, ApiError> {
    let venue = get_by_id(id, pool).await?;
    if can_manage(user, &venue) {
        Ok(venue)
    } else {
        Err(ApiError::forbidden("not the owner of this venue"))
    }
}

pub async fn create(user: &UserAuthData, dto: NewVenueDto, free_limit: i32, pool: &PGPool) -> Result<Venue, ApiError> {
    if user.role == Role::Customer {
        return Err(ApiError::forbidden("only venue owners can create venues"));
    }
    dto.validate()?;
    let now = Utc::now();
    let venue = Venue {
        id: Uuid::new_v4(),
        owner_id: user.user_id,
        name: dto.name.trim().to_string(),
        address: dto.address.trim().to_string(),
        city: dto.city.trim().to_string(),
        phone: dto.phone,
        capacity: dto.capacity,
        venue_type: dto.venue_type.unwrap_or(VenueType::Restaurant),
        active: true,
        created_at: now,
        updated_at: now,
    };
    db::venue::create(&venue, pool).await?;
    subscription::get_or_create(venue.id, free_limit, pool).await?;
    info!("venue {} created by {}", venue.id, user.user_id);
    Ok(venue)
}

pub async fn list(city: Option<&str>, pool: &PGPool) -> Result<Vec<Venue>, ApiError> {
    Ok(db::venue::get_active(city, pool).await?)
}

pub async fn details(id: Uuid, pool: &PGPool) -> Result<VenueDetails, ApiError> {
    let venue = get_by_id(id, pool).await?;
    if !venue.active {
        return Err(ApiError::NotFound("venue"));
    }
    let opening_hours = db::opening_hours::get_for_venue(id, pool).await?;
    let tables = db::table::get_for_venue(id, pool)
        .await?
        .into_iter()
        .filter(|t| t.active)
        .collect();
    Ok(VenueDetails { venue, opening_hours, tables })
}

pub async fn update(id: Uuid, dto: UpdateVenueDto, user: &UserAuthData, pool: &PGPool) -> Result<Venue, ApiError> {
    dto.validate()?;
    let mut venue = get_managed(id, user, pool).await?;
    dto.apply(&mut venue);
    db::venue::update(&venue, pool).await?;
    Ok(venue)
}

/// Venues are never deleted; they stop taking bookings.
pub async fn deactivate(id: Uuid, user: &UserAuthData, pool: &PGPool) -> Result<Venue, ApiError> {
    let mut venue = get_managed(id, user, pool).await?;
    venue.active = false;
    db::venue::update(&venue, pool).await?;
    info!("venue {} deactivated by {}", venue.id, user.user_id);
    Ok(venue)
}

pub async fn opening_hours(id: Uuid, pool: &PGPool) -> Result<Vec<OpeningHours>, ApiError> {
    get_by_id(id, pool).await?;
    Ok(db::opening_hours::get_for_venue(id, pool).await?)
}

pub async fn set_opening_hours(
    id: Uuid,
    intervals: Vec<OpeningIntervalDto>,
    user: &UserAuthData,
    pool: &PGPool,
) -> Result<Vec<OpeningHours>, ApiError> {
    let venue = get_managed(id, user, pool).await?;
    validate_opening_hours(&intervals)?;
    db::opening_hours::replace(venue.id, &intervals, pool).await?;
    Ok(db::opening_hours::get_for_venue(venue.id, pool).await?)
}

pub async fn tables(id: Uuid, pool: &PGPool) -> Result<Vec<VenueTable>, ApiError> {
    get_by_id(id, pool).await?;
    Ok(db::table::get_for_venue(id, pool).await?)
}

pub async fn add_table(id: Uuid, dto: NewTableDto, user: &UserAuthData, pool: &PGPool) -> Result<VenueTable, ApiError> {
    dto.validate()?;
    let venue = get_managed(id, user, pool).await?;
    let table = VenueTable {
        id: Uuid::new_v4(),
        venue_id: venue.id,
        label: dto.label.trim().to_string(),
        capacity: dto.capacity,
        active: true,
        created_at: Utc::now(),
    };
    db::table::create(&table, pool).await?;
    Ok(table)
}

async fn get_managed_table(
    venue_id: Uuid,
    table_id: Uuid,
    user: &UserAuthData,
    pool: &PGPool,
) -> Result<VenueTable, ApiError> {
    let venue = get_managed(venue_id, user, pool).await?;
    db::table::get_by_id(table_id, pool)
        .await?
        .filter(|t| t.venue_id == venue.id)
        .ok_or(ApiError::NotFound("table"))
}

pub async fn update_table(
    venue_id: Uuid,
    table_id: Uuid,
    dto: UpdateTableDto,
    user: &UserAuthData,
    pool: &PGPool,
) -> Result<VenueTable, ApiError> {
    dto.validate()?;
    let mut table = get_managed_table(venue_id, table_id, user, pool).await?;
    dto.apply(&mut table);
    db::table::update(&table, pool).await?;
    Ok(table)
}

pub async fn deactivate_table(venue_id: Uuid, table_id: Uuid, user: &UserAuthData, pool: &PGPool) -> Result<VenueTable, ApiError> {
    let mut table = get_managed_table(venue_id, table_id, user, pool).await?;
    table.active = false;
    db::table::update(&table, pool).await?;
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn interval(day: i16, open: (u32, u32), close: (u32, u32)) -> OpeningIntervalDto {
        OpeningIntervalDto {
            day_of_week: day,
            open_time: NaiveTime::from_hms_opt(open.0, open.1, 0).unwrap(),
            close_time: NaiveTime::from_hms_opt(close.0, close.1, 0).unwrap(),
        }
    }

    #[test]
    fn split_shifts_are_valid() {
        let hours = [
            interval(0, (12, 0), (15, 0)),
            interval(0, (18, 0), (23, 0)),
            interval(1, (12, 0), (23, 0)),
        ];
        assert!(validate_opening_hours(&hours).is_ok());
    }

    #[test]
    fn touching_intervals_are_valid() {
        let hours = [interval(2, (15, 0), (18, 0)), interval(2, (12, 0), (15, 0))];
        assert!(validate_opening_hours(&hours).is_ok());
    }

    #[test]
    fn overlapping_intervals_are_rejected() {
        let hours = [interval(3, (12, 0), (16, 0)), interval(3, (15, 0), (22, 0))];
        assert!(validate_opening_hours(&hours).is_err());

        let nested = [interval(3, (12, 0), (22, 0)), interval(3, (13, 0), (14, 0))];
        assert!(validate_opening_hours(&nested).is_err());
    }

    #[test]
    fn same_times_on_different_days_do_not_overlap() {
        let hours = [interval(4, (12, 0), (22, 0)), interval(5, (12, 0), (22, 0))];
        assert!(validate_opening_hours(&hours).is_ok());
    }

    #[test]
    fn empty_or_inverted_intervals_are_rejected() {
        assert!(validate_opening_hours(&[interval(0, (12, 0), (12, 0))]).is_err());
        assert!(validate_opening_hours(&[interval(0, (22, 0), (12, 0))]).is_err());
        assert!(validate_opening_hours(&[interval(7, (12, 0), (22, 0))]).is_err());
    }

    #[test]
    fn owners_and_admins_manage_venues() {
        let owner_id = Uuid::new_v4();
        let now = Utc::now();
        let venue = Venue {
            id: Uuid::new_v4(),
            owner_id,
            name: "Trattoria".to_string(),
            address: "1 Via Roma".to_string(),
            city: "Torino".to_string(),
            phone: None,
            capacity: 40,
            venue_type: VenueType::Restaurant,
            active: true,
            created_at: now,
            updated_at: now,
        };
        let as_user = |user_id, role| UserAuthData { user_id, session_id: Uuid::new_v4(), role };
        assert!(can_manage(&as_user(owner_id, Role::VenueOwner), &venue));
        assert!(can_manage(&as_user(Uuid::new_v4(), Role::Admin), &venue));
        assert!(!can_manage(&as_user(Uuid::new_v4(), Role::VenueOwner), &venue));
        assert!(!can_manage(&as_user(Uuid::new_v4(), Role::Customer), &venue));
    }
}
