use std::env;

use crate::error::AppError;
use crate::models::order::GeoPoint;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub database_url: String,
    pub sweep_interval_secs: u64,
    pub event_buffer_size: usize,
    /// Where every delivery trip starts.
    pub shop_location: GeoPoint,
    pub permission_bypass: bool,
    pub super_account: Option<String>,
    pub verbose_permission_errors: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:pizza-dispatch.db".to_string()),
            sweep_interval_secs: parse_or_default("SWEEP_INTERVAL_SECS", 60)?,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            shop_location: GeoPoint {
                lat: parse_or_default("SHOP_LAT", 21.0278)?,
                lng: parse_or_default("SHOP_LNG", 105.8342)?,
            },
            permission_bypass: parse_or_default("PERMISSION_BYPASS", false)?,
            super_account: env::var("SUPER_ACCOUNT").ok(),
            verbose_permission_errors: parse_or_default("VERBOSE_PERMISSION_ERRORS", true)?,
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
