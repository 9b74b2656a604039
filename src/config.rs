use std::env;

use crate::error::AppError;
use crate::geo::GeoPoint;

/// One week. Staleness, ETA reuse and GPS freshness windows stay under it.
const MAX_WINDOW_SECS: i64 = 7 * 24 * 3600;
const MAX_RETENTION_DAYS: i64 = 3650;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub event_buffer_size: usize,
    pub stale_after_secs: i64,
    pub eta_cache_secs: i64,
    pub local_utc_offset_hours: i32,
    pub history_retention_days: i64,
    pub retention_sweep_secs: u64,
    pub tracking_link_default_hours: i64,
    pub auto_issue_tracking_links: bool,
    pub action_timeout_ms: u64,
    pub dispatch_gps_max_age_mins: i64,
    pub fallback_destination: GeoPoint,
    pub public_base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Compact,
            event_buffer_size: 1024,
            stale_after_secs: 300,
            eta_cache_secs: 60,
            local_utc_offset_hours: -6,
            history_retention_days: 90,
            retention_sweep_secs: 3600,
            tracking_link_default_hours: 24,
            auto_issue_tracking_links: true,
            action_timeout_ms: 2000,
            dispatch_gps_max_age_mins: 30,
            fallback_destination: GeoPoint {
                lat: 32.0,
                lng: -96.0,
            },
            public_base_url: String::new(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        let log_format = match env::var("LOG_FORMAT") {
            Ok(raw) => match raw.to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                "compact" => LogFormat::Compact,
                other => {
                    return Err(AppError::Internal(format!(
                        "invalid LOG_FORMAT: {other}, expected compact/json"
                    )));
                }
            },
            Err(_) => defaults.log_format,
        };

        let config = Self {
            http_port: parse_or_default("HTTP_PORT", defaults.http_port)?,
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", defaults.event_buffer_size)?,
            stale_after_secs: parse_or_default("STALE_AFTER_SECS", defaults.stale_after_secs)?,
            eta_cache_secs: parse_or_default("ETA_CACHE_SECS", defaults.eta_cache_secs)?,
            local_utc_offset_hours: parse_or_default(
                "LOCAL_UTC_OFFSET_HOURS",
                defaults.local_utc_offset_hours,
            )?,
            history_retention_days: parse_or_default(
                "HISTORY_RETENTION_DAYS",
                defaults.history_retention_days,
            )?,
            retention_sweep_secs: parse_or_default(
                "RETENTION_SWEEP_SECS",
                defaults.retention_sweep_secs,
            )?,
            tracking_link_default_hours: parse_or_default(
                "TRACKING_LINK_DEFAULT_HOURS",
                defaults.tracking_link_default_hours,
            )?,
            auto_issue_tracking_links: parse_or_default(
                "AUTO_ISSUE_TRACKING_LINKS",
                defaults.auto_issue_tracking_links,
            )?,
            action_timeout_ms: parse_or_default("ACTION_TIMEOUT_MS", defaults.action_timeout_ms)?,
            dispatch_gps_max_age_mins: parse_or_default(
                "DISPATCH_GPS_MAX_AGE_MINS",
                defaults.dispatch_gps_max_age_mins,
            )?,
            fallback_destination: GeoPoint {
                lat: parse_or_default("FALLBACK_DESTINATION_LAT", defaults.fallback_destination.lat)?,
                lng: parse_or_default("FALLBACK_DESTINATION_LNG", defaults.fallback_destination.lng)?,
            },
            public_base_url: env::var("PUBLIC_BASE_URL").unwrap_or(defaults.public_base_url),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if !(-14..=14).contains(&self.local_utc_offset_hours) {
            return Err(AppError::Internal(format!(
                "invalid LOCAL_UTC_OFFSET_HOURS: {} is outside -14..=14",
                self.local_utc_offset_hours
            )));
        }
        if !(1..=72).contains(&self.tracking_link_default_hours) {
            return Err(AppError::Internal(format!(
                "invalid TRACKING_LINK_DEFAULT_HOURS: {} is outside 1..=72",
                self.tracking_link_default_hours
            )));
        }
        check_range("STALE_AFTER_SECS", self.stale_after_secs, 1, MAX_WINDOW_SECS)?;
        check_range("ETA_CACHE_SECS", self.eta_cache_secs, 0, MAX_WINDOW_SECS)?;
        check_range(
            "HISTORY_RETENTION_DAYS",
            self.history_retention_days,
            1,
            MAX_RETENTION_DAYS,
        )?;
        check_range(
            "DISPATCH_GPS_MAX_AGE_MINS",
            self.dispatch_gps_max_age_mins,
            1,
            MAX_WINDOW_SECS / 60,
        )?;
        if !self.fallback_destination.is_valid() {
            return Err(AppError::Internal(
                "fallback destination is not a valid coordinate".to_string(),
            ));
        }
        Ok(())
    }
}

fn check_range(key: &str, value: i64, min: i64, max: i64) -> Result<(), AppError> {
    if !(min..=max).contains(&value) {
        return Err(AppError::Internal(format!(
            "invalid {key}: {value} is outside {min}..={max}"
        )));
    }
    Ok(())
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

#[cfg(test)]
mod tests {
    use super::Config;

    #[test]
    fn defaults_are_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn negative_retention_is_rejected() {
        let config = Config {
            history_retention_days: -1,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn windows_too_large_for_chrono_are_rejected() {
        let gps = Config {
            dispatch_gps_max_age_mins: i64::MAX,
            ..Config::default()
        };
        let stale = Config {
            stale_after_secs: i64::MAX,
            ..Config::default()
        };
        let retention = Config {
            history_retention_days: i64::MAX / 2,
            ..Config::default()
        };

        assert!(gps.validate().is_err());
        assert!(stale.validate().is_err());
        assert!(retention.validate().is_err());
    }
}
