use std::env;
use std::time::Duration;

use crate::engine::lifecycle::LifecycleConfig;
use crate::engine::tracker::TrackerConfig;
use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: String,
    pub event_buffer_size: usize,
    pub request_timeout_ms: u64,
    pub staleness_threshold_secs: i64,
    pub retention_days: i64,
    pub cleanup_interval_secs: u64,
    pub cleanup_timeout_secs: u64,
    pub cleanup_chunk_size: usize,
    pub nearby_default_limit: usize,
    pub require_license_for_verification: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let config = Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "compact".to_string()),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            request_timeout_ms: parse_or_default("REQUEST_TIMEOUT_MS", 5_000)?,
            staleness_threshold_secs: parse_or_default("STALENESS_THRESHOLD_SECS", 600)?,
            retention_days: parse_or_default("RETENTION_DAYS", 30)?,
            cleanup_interval_secs: parse_or_default("CLEANUP_INTERVAL_SECS", 86_400)?,
            cleanup_timeout_secs: parse_or_default("CLEANUP_TIMEOUT_SECS", 1_800)?,
            cleanup_chunk_size: parse_or_default("CLEANUP_CHUNK_SIZE", 1_000)?,
            nearby_default_limit: parse_or_default("NEARBY_DEFAULT_LIMIT", 50)?,
            require_license_for_verification: parse_or_default(
                "REQUIRE_LICENSE_FOR_VERIFICATION",
                false,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.staleness_threshold_secs <= 0 {
            return Err(AppError::Internal(
                "STALENESS_THRESHOLD_SECS must be > 0".to_string(),
            ));
        }
        if self.retention_days <= 0 {
            return Err(AppError::Internal("RETENTION_DAYS must be > 0".to_string()));
        }
        if self.cleanup_chunk_size == 0 || self.cleanup_interval_secs == 0 {
            return Err(AppError::Internal(
                "cleanup interval and chunk size must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn tracker(&self) -> TrackerConfig {
        TrackerConfig {
            staleness_threshold: chrono::Duration::seconds(self.staleness_threshold_secs),
            retention: chrono::Duration::days(self.retention_days),
            cleanup_chunk_size: self.cleanup_chunk_size,
            nearby_default_limit: self.nearby_default_limit,
        }
    }

    pub fn lifecycle(&self) -> LifecycleConfig {
        LifecycleConfig {
            require_license_for_verification: self.require_license_for_verification,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn cleanup_timeout(&self) -> Duration {
        Duration::from_secs(self.cleanup_timeout_secs)
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
