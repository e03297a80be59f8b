use chrono::TimeDelta;
use serde::Deserialize;
use std::env;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

// Top-level configuration, one section per concern
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub admin: AdminConfig,
    pub booking: BookingConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    pub seats_ttl_seconds: u64,
}

// Admin account ensured at startup
#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    pub mail: String,
    pub password: String,
}

// Time windows for scheduling, booking and cancelling
#[derive(Debug, Clone, Deserialize)]
pub struct BookingConfig {
    pub min_days_ahead: i64,
    pub max_days_ahead: i64,
    pub book_min_hours_before: i64,
    pub cancel_min_hours_before: i64,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            min_days_ahead: 7,
            max_days_ahead: 21,
            book_min_hours_before: 1,
            cancel_min_hours_before: 24,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub bcrypt_cost: u32,
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing(key))
}

fn or_default(key: &'static str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parsed<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError> {
    let value = or_default(key, default);
    value
        .parse()
        .map_err(|_| ConfigError::Invalid { key, value })
}

/// A non-negative count of days or hours that `to_delta` can represent.
fn window_length(
    key: &'static str,
    raw: String,
    to_delta: fn(i64) -> Option<TimeDelta>,
) -> Result<i64, ConfigError> {
    match raw.parse::<i64>() {
        Ok(value) if value >= 0 && to_delta(value).is_some() => Ok(value),
        _ => Err(ConfigError::Invalid { key, value: raw }),
    }
}

fn days(key: &'static str, default: i64) -> Result<i64, ConfigError> {
    window_length(key, or_default(key, &default.to_string()), TimeDelta::try_days)
}

fn hours(key: &'static str, default: i64) -> Result<i64, ConfigError> {
    window_length(key, or_default(key, &default.to_string()), TimeDelta::try_hours)
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = BookingConfig::default();
        let booking = BookingConfig {
            min_days_ahead: days("SCREENING_MIN_DAYS_AHEAD", defaults.min_days_ahead)?,
            max_days_ahead: days("SCREENING_MAX_DAYS_AHEAD", defaults.max_days_ahead)?,
            book_min_hours_before: hours("TICKET_BOOK_MIN_HOURS", defaults.book_min_hours_before)?,
            cancel_min_hours_before: hours(
                "TICKET_CANCEL_MIN_HOURS",
                defaults.cancel_min_hours_before,
            )?,
        };
        if booking.min_days_ahead > booking.max_days_ahead {
            return Err(ConfigError::Invalid {
                key: "SCREENING_MIN_DAYS_AHEAD",
                value: booking.min_days_ahead.to_string(),
            });
        }

        Ok(Config {
            app: AppConfig {
                host: or_default("HOST", "0.0.0.0"),
                port: parsed("PORT", "8000")?,
                environment: or_default("ENVIRONMENT", "development"),
                rust_log: or_default("RUST_LOG", "cinema=debug,tower_http=debug"),
            },
            database: DatabaseConfig {
                url: required("DATABASE_URL")?,
                pool_size: parsed("DB_POOL_SIZE", "20")?,
            },
            redis: RedisConfig {
                url: required("REDIS_URL")?,
                seats_ttl_seconds: parsed("REDIS_SEATS_TTL_SECONDS", "60")?,
            },
            admin: AdminConfig {
                mail: or_default("ADMIN_MAIL", "admin@cinema.local"),
                password: required("ADMIN_PASSWORD")?,
            },
            booking,
            security: SecurityConfig {
                bcrypt_cost: parsed("BCRYPT_COST", &bcrypt::DEFAULT_COST.to_string())?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_lengths_must_fit_a_duration() {
        assert_eq!(window_length("K", "21".into(), TimeDelta::try_days).unwrap(), 21);
        assert_eq!(window_length("K", "0".into(), TimeDelta::try_hours).unwrap(), 0);

        let rejected = [
            "-1".to_string(),
            "abc".to_string(),
            i64::MAX.to_string(),
            (i64::MAX / 2).to_string(),
        ];
        for raw in rejected {
            assert!(
                matches!(
                    window_length("K", raw.clone(), TimeDelta::try_days),
                    Err(ConfigError::Invalid { key: "K", .. })
                ),
                "{raw} should be rejected"
            );
        }
    }
}
