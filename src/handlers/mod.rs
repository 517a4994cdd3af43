pub mod admin;
pub mod auth;
pub mod booking;
pub mod notification;
pub mod subscription;
pub mod venue;
pub mod webhook;
