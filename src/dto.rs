use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ApiError;
use crate::models::{BookingStatus, OpeningHours, Plan, Role, ServiceType, User, Venue, VenueTable, VenueType};

const MIN_PASSWORD_LEN: usize = 8;

pub fn validate_email(email: &str) -> Result<(), ApiError> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.'),
        None => false,
    };
    if valid && !email.contains(char::is_whitespace) {
        Ok(())
    } else {
        Err(ApiError::bad_request("invalid email address"))
    }
}

fn require_non_empty(value: &str, field: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        Err(ApiError::bad_request(format!("{field} must not be empty")))
    } else {
        Ok(())
    }
}

fn require_positive(value: i32, field: &str) -> Result<(), ApiError> {
    if value < 1 {
        Err(ApiError::bad_request(format!("{field} must be at least 1")))
    } else {
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub pwd: String,
    pub pwd_confirm: String,
    pub role: Option<Role>,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        validate_email(&self.email)?;
        require_non_empty(&self.name, "name")?;
        if self.pwd.chars().count() < MIN_PASSWORD_LEN {
            return Err(ApiError::bad_request(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        if self.pwd != self.pwd_confirm {
            return Err(ApiError::bad_request("passwords do not match"));
        }
        if self.role == Some(Role::Admin) {
            return Err(ApiError::forbidden("admin role cannot be self-assigned"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoginRequest {
    pub email: String,
    pub pwd: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Claims {
    /// user id
    pub sub: Uuid,
    /// session id
    pub sid: Uuid,
    pub role: Role,
    /// seconds since the epoch
    pub exp: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NewVenueDto {
    pub name: String,
    pub address: String,
    pub city: String,
    pub phone: Option<String>,
    pub capacity: i32,
    pub venue_type: Option<VenueType>,
}

impl NewVenueDto {
    pub fn validate(&self) -> Result<(), ApiError> {
        require_non_empty(&self.name, "name")?;
        require_non_empty(&self.address, "address")?;
        require_non_empty(&self.city, "city")?;
        require_positive(self.capacity, "capacity")
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct UpdateVenueDto {
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub capacity: Option<i32>,
    pub venue_type: Option<VenueType>,
}

impl UpdateVenueDto {
    pub fn validate(&self) -> Result<(), ApiError> {
        if let Some(name) = &self.name {
            require_non_empty(name, "name")?;
        }
        if let Some(address) = &self.address {
            require_non_empty(address, "address")?;
        }
        if let Some(city) = &self.city {
            require_non_empty(city, "city")?;
        }
        if let Some(capacity) = self.capacity {
            require_positive(capacity, "capacity")?;
        }
        Ok(())
    }

    pub fn apply(self, venue: &mut Venue) {
        if let Some(v) = self.name {
            venue.name = v;
        }
        if let Some(v) = self.address {
            venue.address = v;
        }
        if let Some(v) = self.city {
            venue.city = v;
        }
        if let Some(v) = self.phone {
            venue.phone = Some(v);
        }
        if let Some(v) = self.capacity {
            venue.capacity = v;
        }
        if let Some(v) = self.venue_type {
            venue.venue_type = v;
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct VenueQuery {
    pub city: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VenueDetails {
    #[serde(flatten)]
    pub venue: Venue,
    pub opening_hours: Vec<OpeningHours>,
    pub tables: Vec<VenueTable>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct OpeningIntervalDto {
    /// 0 = Monday ... 6 = Sunday
    pub day_of_week: i16,
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
}

#[derive(Debug, Deserialize)]
pub struct SetOpeningHoursDto {
    pub intervals: Vec<OpeningIntervalDto>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NewTableDto {
    pub label: String,
    pub capacity: i32,
}

impl NewTableDto {
    pub fn validate(&self) -> Result<(), ApiError> {
        require_non_empty(&self.label, "label")?;
        require_positive(self.capacity, "capacity")
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct UpdateTableDto {
    pub label: Option<String>,
    pub capacity: Option<i32>,
    pub active: Option<bool>,
}

impl UpdateTableDto {
    pub fn validate(&self) -> Result<(), ApiError> {
        if let Some(label) = &self.label {
            require_non_empty(label, "label")?;
        }
        if let Some(capacity) = self.capacity {
            require_positive(capacity, "capacity")?;
        }
        Ok(())
    }

    pub fn apply(self, table: &mut VenueTable) {
        if let Some(v) = self.label {
            table.label = v;
        }
        if let Some(v) = self.capacity {
            table.capacity = v;
        }
        if let Some(v) = self.active {
            table.active = v;
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AvailabilityQuery {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub party_size: i32,
    pub service_type: Option<ServiceType>,
    pub table_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub available: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NewBookingDto {
    pub venue_id: Uuid,
    pub table_id: Option<Uuid>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub party_size: i32,
    pub service_type: Option<ServiceType>,
    pub guest_name: Option<String>,
    pub guest_email: Option<String>,
    pub guest_phone: Option<String>,
    pub notes: Option<String>,
}

impl NewBookingDto {
    /// Anonymous bookings must carry guest contact details; signed-in
    /// customers fall back to their account.
    pub fn validate(&self, signed_in: bool) -> Result<(), ApiError> {
        require_positive(self.party_size, "party_size")?;
        if !signed_in {
            match (&self.guest_name, &self.guest_email) {
                (Some(name), Some(email)) => {
                    require_non_empty(name, "guest_name")?;
                    validate_email(email)?;
                }
                _ => return Err(ApiError::bad_request("guest_name and guest_email are required")),
            }
        } else if let Some(email) = &self.guest_email {
            validate_email(email)?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateBookingStatusDto {
    pub status: BookingStatus,
}

#[derive(Debug, Deserialize)]
pub struct BookingListQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread: bool,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub venue_id: Uuid,
    pub plan: Plan,
}

#[derive(Debug, Deserialize)]
pub struct PortalRequest {
    pub venue_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct RedirectResponse {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct SetUserActiveDto {
    pub active: bool,
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub affected: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(pwd: &str, confirm: &str) -> RegisterRequest {
        RegisterRequest {
            email: "ana@example.com".to_string(),
            name: "Ana".to_string(),
            pwd: pwd.to_string(),
            pwd_confirm: confirm.to_string(),
            role: None,
        }
    }

    #[test]
    fn email_shapes() {
        assert!(validate_email("a@b.co").is_ok());
        assert!(validate_email("a@b").is_err());
        assert!(validate_email("@b.co").is_err());
        assert!(validate_email("a b@c.de").is_err());
        assert!(validate_email("ab.co").is_err());
    }

    #[test]
    fn registration_rules() {
        assert!(register("longenough", "longenough").validate().is_ok());
        assert!(register("short", "short").validate().is_err());
        assert!(register("longenough", "different1").validate().is_err());

        let mut admin = register("longenough", "longenough");
        admin.role = Some(Role::Admin);
        assert!(matches!(admin.validate(), Err(ApiError::Forbidden(_))));
    }

    #[test]
    fn anonymous_booking_needs_contact() {
        let dto = NewBookingDto {
            venue_id: Uuid::new_v4(),
            table_id: None,
            date: NaiveDate::from_ymd_opt(2024, 5, 10).unwrap(),
            time: NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
            party_size: 2,
            service_type: None,
            guest_name: None,
            guest_email: None,
            guest_phone: None,
            notes: None,
        };
        assert!(dto.validate(false).is_err());
        assert!(dto.validate(true).is_ok());

        let with_guest = NewBookingDto {
            guest_name: Some("Bo".to_string()),
            guest_email: Some("bo@example.com".to_string()),
            ..dto.clone()
        };
        assert!(with_guest.validate(false).is_ok());

        let zero_party = NewBookingDto { party_size: 0, ..with_guest };
        assert!(zero_party.validate(false).is_err());
    }

    #[test]
    fn venue_update_rejects_zero_capacity() {
        let dto = UpdateVenueDto { capacity: Some(0), ..Default::default() };
        assert!(dto.validate().is_err());
    }
}
