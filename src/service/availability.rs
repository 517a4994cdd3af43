//! Decides whether a booking request fits a venue's opening hours, the
//! requested table and the venue's seating capacity.
//!
//! The decision itself ([`evaluate`]) is pure; [`check`] only gathers the rows
//! it needs. Nothing here locks: two concurrent requests for the same slot can
//! both be accepted.

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use derive_more::Display;
use log::debug;
use uuid::Uuid;

use crate::{
    db,
    errors::ApiError,
    models::{Booking, OpeningHours, ServiceType, Venue, VenueTable},
    PGPool,
};

/// Length of the window a new table booking occupies.
pub const BOOKING_WINDOW_MINUTES: i32 = 120;

#[derive(Debug, Clone)]
pub struct SlotRequest {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub party_size: i32,
    pub service_type: ServiceType,
    pub table_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum Unavailable {
    #[display(fmt = "venue is closed this day")]
    ClosedThatDay,

    #[display(fmt = "requested time is outside opening hours")]
    OutsideOpeningHours,

    #[display(fmt = "table does not exist")]
    TableNotFound,

    #[display(fmt = "table is not available")]
    TableInactive,

    #[display(fmt = "table seats {} but party size is {}", capacity, party_size)]
    TableTooSmall { capacity: i32, party_size: i32 },

    #[display(fmt = "table is already booked for this time")]
    TableTaken,

    #[display(fmt = "venue capacity of {} exceeded ({} already booked for this time)", capacity, booked)]
    VenueFull { capacity: i32, booked: i64 },
}

impl From<Unavailable> for ApiError {
    fn from(reason: Unavailable) -> Self {
        match reason {
            Unavailable::TableNotFound => ApiError::NotFound("table"),
            Unavailable::TableTaken | Unavailable::VenueFull { .. } => ApiError::conflict(reason.to_string()),
            _ => ApiError::bad_request(reason.to_string()),
        }
    }
}

pub type Verdict = Result<(), Unavailable>;

/// What the check needs to know about the requested seating.
#[derive(Debug, Clone)]
pub enum Seating {
    Table {
        table: Option<VenueTable>,
        /// pending/confirmed bookings on the table that day
        bookings: Vec<Booking>,
    },
    Venue {
        /// party sizes of pending/confirmed bookings at the exact slot
        booked: i64,
    },
}

pub fn minutes_since_midnight(time: NaiveTime) -> i32 {
    (time.hour() * 60 + time.minute()) as i32
}

pub fn weekday_index(date: NaiveDate) -> i16 {
    date.weekday().num_days_from_monday() as i16
}

/// Both ends are inclusive, so a booking exactly at closing time is accepted.
pub fn within_opening_hours(hours: &[OpeningHours], time: NaiveTime) -> bool {
    let minutes = minutes_since_midnight(time);
    hours.iter().any(|h| {
        minutes >= minutes_since_midnight(h.open_time) && minutes <= minutes_since_midnight(h.close_time)
    })
}

/// Half-open windows `[start, start + len)`, in minutes.
pub fn windows_overlap(a_start: i32, a_len: i32, b_start: i32, b_len: i32) -> bool {
    a_start < b_start + b_len && b_start < a_start + a_len
}

pub fn evaluate(capacity: i32, hours: &[OpeningHours], request: &SlotRequest, seating: &Seating) -> Verdict {
    if hours.is_empty() {
        return Err(Unavailable::ClosedThatDay);
    }
    if !within_opening_hours(hours, request.time) {
        return Err(Unavailable::OutsideOpeningHours);
    }

    match seating {
        Seating::Table { table, bookings } => {
            let table = table.as_ref().ok_or(Unavailable::TableNotFound)?;
            if !table.active {
                return Err(Unavailable::TableInactive);
            }
            if table.capacity < request.party_size {
                return Err(Unavailable::TableTooSmall {
                    capacity: table.capacity,
                    party_size: request.party_size,
                });
            }
            let start = minutes_since_midnight(request.time);
            let clash = bookings.iter().filter(|b| b.status.is_active()).any(|b| {
                windows_overlap(
                    start,
                    BOOKING_WINDOW_MINUTES,
                    minutes_since_midnight(b.booking_time),
                    b.duration_minutes,
                )
            });
            if clash {
                return Err(Unavailable::TableTaken);
            }
        }
        Seating::Venue { booked } => {
            if booked + i64::from(request.party_size) > i64::from(capacity) {
                return Err(Unavailable::VenueFull {
                    capacity,
                    booked: *booked,
                });
            }
        }
    }
    Ok(())
}

/// Loads opening hours and seating state for the request, then evaluates it.
pub async fn check(venue: &Venue, request: &SlotRequest, pool: &PGPool) -> Result<Verdict, ApiError> {
    let hours = db::opening_hours::get_for_day(venue.id, weekday_index(request.date), pool).await?;
    let seating = match request.table_id {
        Some(table_id) => {
            let table = db::table::get_by_id(table_id, pool)
                .await?
                .filter(|t| t.venue_id == venue.id);
            let bookings = match &table {
                Some(t) => db::booking::active_for_table(t.id, request.date, pool).await?,
                None => Vec::new(),
            };
            Seating::Table { table, bookings }
        }
        None => Seating::Venue {
            booked: db::booking::active_party_total(venue.id, request.date, request.time, pool).await?,
        },
    };
    let verdict = evaluate(venue.capacity, &hours, request, &seating);
    debug!(
        "availability venue={} date={} time={} party={} service={:?} table={:?}: {:?}",
        venue.id, request.date, request.time, request.party_size, request.service_type, request.table_id, verdict
    );
    Ok(verdict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BookingStatus;
    use chrono::Utc;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn date() -> NaiveDate {
        // a Friday
        NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()
    }

    fn hours(intervals: &[(NaiveTime, NaiveTime)]) -> Vec<OpeningHours> {
        intervals
            .iter()
            .map(|(open, close)| OpeningHours {
                id: Uuid::new_v4(),
                venue_id: Uuid::nil(),
                day_of_week: 4,
                open_time: *open,
                close_time: *close,
            })
            .collect()
    }

    fn table(capacity: i32, active: bool) -> VenueTable {
        VenueTable {
            id: Uuid::new_v4(),
            venue_id: Uuid::nil(),
            label: "T".to_string(),
            capacity,
            active,
            created_at: Utc::now(),
        }
    }

    fn booking(table_id: Uuid, at: NaiveTime, duration: i32, status: BookingStatus) -> Booking {
        Booking {
            id: Uuid::new_v4(),
            venue_id: Uuid::nil(),
            table_id: Some(table_id),
            customer_id: None,
            guest_name: "Guest".to_string(),
            guest_email: "guest@example.com".to_string(),
            guest_phone: None,
            booking_date: date(),
            booking_time: at,
            duration_minutes: duration,
            party_size: 2,
            service_type: ServiceType::DineIn,
            status,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn request(at: NaiveTime, party_size: i32, table_id: Option<Uuid>) -> SlotRequest {
        SlotRequest {
            date: date(),
            time: at,
            party_size,
            service_type: ServiceType::DineIn,
            table_id,
        }
    }

    #[test]
    fn weekday_starts_on_monday() {
        assert_eq!(weekday_index(NaiveDate::from_ymd_opt(2024, 5, 6).unwrap()), 0);
        assert_eq!(weekday_index(date()), 4);
        assert_eq!(weekday_index(NaiveDate::from_ymd_opt(2024, 5, 12).unwrap()), 6);
    }

    #[test]
    fn closed_day_is_rejected() {
        let verdict = evaluate(40, &[], &request(t(19, 0), 2, None), &Seating::Venue { booked: 0 });
        assert_eq!(verdict, Err(Unavailable::ClosedThatDay));
    }

    #[test]
    fn times_outside_every_interval_are_rejected() {
        let open = hours(&[(t(12, 0), t(15, 0)), (t(18, 0), t(22, 0))]);
        let seating = Seating::Venue { booked: 0 };
        for (h, m) in [(0, 0), (11, 59), (15, 1), (17, 59), (22, 1), (23, 59)] {
            assert_eq!(
                evaluate(40, &open, &request(t(h, m), 2, None), &seating),
                Err(Unavailable::OutsideOpeningHours),
                "{h}:{m}"
            );
        }
        for (h, m) in [(12, 0), (13, 30), (15, 0), (18, 0), (21, 59)] {
            assert!(evaluate(40, &open, &request(t(h, m), 2, None), &seating).is_ok(), "{h}:{m}");
        }
    }

    #[test]
    fn closing_time_itself_is_accepted() {
        let open = hours(&[(t(12, 0), t(22, 0))]);
        assert!(evaluate(40, &open, &request(t(22, 0), 2, None), &Seating::Venue { booked: 0 }).is_ok());
    }

    #[test]
    fn overlapping_table_window_is_rejected() {
        let open = hours(&[(t(12, 0), t(22, 0))]);
        let tbl = table(4, true);
        let existing = vec![booking(tbl.id, t(19, 0), 120, BookingStatus::Confirmed)];
        let seating = Seating::Table { table: Some(tbl.clone()), bookings: existing };

        assert_eq!(
            evaluate(40, &open, &request(t(20, 30), 2, Some(tbl.id)), &seating),
            Err(Unavailable::TableTaken)
        );
        assert_eq!(
            evaluate(40, &open, &request(t(17, 30), 2, Some(tbl.id)), &seating),
            Err(Unavailable::TableTaken)
        );
        assert!(evaluate(40, &open, &request(t(21, 0), 2, Some(tbl.id)), &seating).is_ok());
        assert!(evaluate(40, &open, &request(t(17, 0), 2, Some(tbl.id)), &seating).is_ok());
    }

    #[test]
    fn stored_duration_bounds_the_existing_window() {
        let open = hours(&[(t(12, 0), t(22, 0))]);
        let tbl = table(4, true);
        let seating = Seating::Table {
            table: Some(tbl.clone()),
            bookings: vec![booking(tbl.id, t(13, 0), 45, BookingStatus::Pending)],
        };
        assert_eq!(
            evaluate(40, &open, &request(t(13, 44), 2, Some(tbl.id)), &seating),
            Err(Unavailable::TableTaken)
        );
        assert!(evaluate(40, &open, &request(t(13, 45), 2, Some(tbl.id)), &seating).is_ok());
    }

    #[test]
    fn released_bookings_do_not_block_the_table() {
        let open = hours(&[(t(12, 0), t(22, 0))]);
        let tbl = table(4, true);
        let seating = Seating::Table {
            table: Some(tbl.clone()),
            bookings: vec![
                booking(tbl.id, t(19, 0), 120, BookingStatus::Cancelled),
                booking(tbl.id, t(19, 0), 120, BookingStatus::NoShow),
            ],
        };
        assert!(evaluate(40, &open, &request(t(19, 30), 2, Some(tbl.id)), &seating).is_ok());
    }

    #[test]
    fn table_must_exist_be_active_and_fit_the_party() {
        let open = hours(&[(t(12, 0), t(22, 0))]);
        let missing = Seating::Table { table: None, bookings: vec![] };
        assert_eq!(
            evaluate(40, &open, &request(t(19, 0), 2, Some(Uuid::new_v4())), &missing),
            Err(Unavailable::TableNotFound)
        );

        let inactive = table(4, false);
        let seating = Seating::Table { table: Some(inactive.clone()), bookings: vec![] };
        assert_eq!(
            evaluate(40, &open, &request(t(19, 0), 2, Some(inactive.id)), &seating),
            Err(Unavailable::TableInactive)
        );

        let small = table(2, true);
        let seating = Seating::Table { table: Some(small.clone()), bookings: vec![] };
        assert_eq!(
            evaluate(40, &open, &request(t(19, 0), 3, Some(small.id)), &seating),
            Err(Unavailable::TableTooSmall { capacity: 2, party_size: 3 })
        );
        assert!(evaluate(40, &open, &request(t(19, 0), 2, Some(small.id)), &seating).is_ok());
    }

    #[test]
    fn opening_hours_are_checked_before_the_table() {
        let open = hours(&[(t(12, 0), t(22, 0))]);
        let missing = Seating::Table { table: None, bookings: vec![] };
        assert_eq!(
            evaluate(40, &open, &request(t(23, 0), 2, Some(Uuid::new_v4())), &missing),
            Err(Unavailable::OutsideOpeningHours)
        );
    }

    #[test]
    fn venue_capacity_is_never_exceeded() {
        let open = hours(&[(t(12, 0), t(22, 0))]);
        let capacity = 10;
        let mut booked = 0i64;
        let mut accepted = 0;
        for party in [4, 3, 2, 2, 1, 5] {
            let seating = Seating::Venue { booked };
            if evaluate(capacity, &open, &request(t(19, 0), party, None), &seating).is_ok() {
                booked += i64::from(party);
                accepted += 1;
            }
            assert!(booked <= i64::from(capacity));
        }
        assert_eq!(booked, 10);
        assert_eq!(accepted, 4);
    }

    #[test]
    fn full_venue_reports_capacity() {
        let open = hours(&[(t(12, 0), t(22, 0))]);
        assert_eq!(
            evaluate(10, &open, &request(t(19, 0), 3, None), &Seating::Venue { booked: 8 }),
            Err(Unavailable::VenueFull { capacity: 10, booked: 8 })
        );
    }

    #[test]
    fn reasons_map_to_status_codes() {
        use actix_web::{http::StatusCode, ResponseError};
        assert_eq!(ApiError::from(Unavailable::TableTaken).status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::from(Unavailable::VenueFull { capacity: 1, booked: 1 }).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(ApiError::from(Unavailable::ClosedThatDay).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::from(Unavailable::TableNotFound).status_code(), StatusCode::NOT_FOUND);
    }
}
