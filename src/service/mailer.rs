//! Transactional email templates. Messages are rendered and written to the
//! log; there is no outbound mail transport.

use log::info;

use crate::models::{Booking, Plan, User, Venue};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

pub fn welcome(user: &User) -> Email {
    Email {
        to: user.email.clone(),
        subject: "Welcome aboard".to_string(),
        body: format!(
            "Hi {},\n\nyour account is ready. You can now book tables at any venue on the platform.",
            user.name
        ),
    }
}

pub fn booking_received(booking: &Booking, venue: &Venue) -> Email {
    Email {
        to: booking.guest_email.clone(),
        subject: format!("Your booking at {}", venue.name),
        body: format!(
            "Hi {},\n\nwe received your booking for {} on {} at {} ({}).\n\
             Reference: {}\nStatus: {}\n\n{}\n{}, {}",
            booking.guest_name,
            booking.party_size,
            booking.booking_date,
            booking.booking_time.format("%H:%M"),
            venue.name,
            booking.id,
            booking.status.as_str(),
            venue.name,
            venue.address,
            venue.city
        ),
    }
}

pub fn booking_status_changed(booking: &Booking, venue: &Venue) -> Email {
    Email {
        to: booking.guest_email.clone(),
        subject: format!("Booking update from {}", venue.name),
        body: format!(
            "Hi {},\n\nyour booking on {} at {} is now {}.\nReference: {}",
            booking.guest_name,
            booking.booking_date,
            booking.booking_time.format("%H:%M"),
            booking.status.as_str(),
            booking.id
        ),
    }
}

pub fn plan_changed(to: &str, venue: &Venue, plan: Plan) -> Email {
    Email {
        to: to.to_string(),
        subject: format!("{} is now on the {} plan", venue.name, plan.as_str()),
        body: format!(
            "Your subscription for {} changed to the {} plan.",
            venue.name,
            plan.as_str()
        ),
    }
}

pub fn send(email: &Email) {
    info!("email to={} subject={:?}\n{}", email.to, email.subject, email.body);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BookingStatus, ServiceType, VenueType};
    use chrono::{NaiveDate, NaiveTime, Utc};
    use uuid::Uuid;

    fn venue() -> Venue {
        Venue {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: "Blue Door".to_string(),
            address: "3 Quay St".to_string(),
            city: "Cork".to_string(),
            phone: None,
            capacity: 30,
            venue_type: VenueType::Bar,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn booking(status: BookingStatus) -> Booking {
        Booking {
            id: Uuid::new_v4(),
            venue_id: Uuid::new_v4(),
            table_id: None,
            customer_id: None,
            guest_name: "Niamh".to_string(),
            guest_email: "niamh@example.com".to_string(),
            guest_phone: None,
            booking_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            booking_time: NaiveTime::from_hms_opt(19, 30, 0).unwrap(),
            duration_minutes: 120,
            party_size: 4,
            service_type: ServiceType::DineIn,
            status,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn booking_received_mentions_the_slot() {
        let b = booking(BookingStatus::Pending);
        let email = booking_received(&b, &venue());
        assert_eq!(email.to, "niamh@example.com");
        assert_eq!(email.subject, "Your booking at Blue Door");
        assert!(email.body.contains("2024-06-01 at 19:30"));
        assert!(email.body.contains(&b.id.to_string()));
        assert!(email.body.contains("pending"));
    }

    #[test]
    fn status_change_shows_new_status() {
        let email = booking_status_changed(&booking(BookingStatus::NoShow), &venue());
        assert!(email.body.contains("is now no_show"));
    }
}
