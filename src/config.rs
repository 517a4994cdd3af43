use std::env;
use std::str::FromStr;

use derive_more::Display;

pub const DEFAULT_FREE_MONTHLY_BOOKING_LIMIT: i32 = 50;

#[derive(Debug, Display)]
pub enum ConfigError {
    #[display(fmt = "environment variable {} must be set", _0)]
    Missing(&'static str),

    #[display(fmt = "environment variable {} has an invalid value", _0)]
    Invalid(&'static str),
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub host: String,
    pub port: u16,
    /// development | staging | production
    pub environment: String,
    pub jwt_secret: String,
    pub free_monthly_booking_limit: i32,
    /// Used to build checkout return URLs.
    pub app_base_url: String,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub stripe_paid_price_id: String,
    pub stripe_premium_price_id: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup, so tests need not touch
    /// the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string());
        let is_dev = environment == "development";
        let secret = |key: &'static str| -> Result<String, ConfigError> {
            match lookup(key).filter(|v| !v.is_empty()) {
                Some(v) => Ok(v),
                None if is_dev => Ok(format!("dev-{}-not-for-production", key.to_lowercase())),
                None => Err(ConfigError::Missing(key)),
            }
        };

        Ok(Self {
            database_url: lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
            database_max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 5)?,
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_or(&lookup, "PORT", 8080)?,
            jwt_secret: secret("JWT_SECRET")?,
            free_monthly_booking_limit: parse_or(
                &lookup,
                "FREE_MONTHLY_BOOKING_LIMIT",
                DEFAULT_FREE_MONTHLY_BOOKING_LIMIT,
            )?,
            app_base_url: lookup("APP_BASE_URL").unwrap_or_else(|| "http://127.0.0.1:8080".to_string()),
            stripe_secret_key: secret("STRIPE_SECRET_KEY")?,
            stripe_webhook_secret: secret("STRIPE_WEBHOOK_SECRET")?,
            stripe_paid_price_id: lookup("STRIPE_PAID_PRICE_ID").unwrap_or_default(),
            stripe_premium_price_id: lookup("STRIPE_PREMIUM_PRICE_ID").unwrap_or_default(),
            environment,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(v) => v.parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}
