pub mod auth;
pub mod availability;
pub mod booking;
pub mod crypto;
pub mod log;
pub mod mailer;
pub mod notification;
pub mod payments;
pub mod stats;
pub mod subscription;
pub mod user;
pub mod venue;
