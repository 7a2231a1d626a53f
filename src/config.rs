use thiserror::Error;

use crate::services::forecast::{
    FallbackPolicy, FALLBACK_MAX, FALLBACK_MIN, MAX_OFFSET_MAX, MAX_OFFSET_MIN,
};

/// Errors raised while reading configuration from the environment.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be a valid {expected}, got '{value}'")]
    InvalidVar {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
    #[error("Invalid fallback band: {0}")]
    InvalidFallback(String),
}

/// Application configuration, parsed from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    /// CSV file holding historical and saved forecasts.
    pub history_csv: String,
    pub port: u16,
    pub fallback: FallbackPolicy,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let fallback = FallbackPolicy::new(
            parse_var("FALLBACK_MIN", FALLBACK_MIN)?,
            parse_var("FALLBACK_MAX", FALLBACK_MAX)?,
            parse_var("MAX_OFFSET_MIN", MAX_OFFSET_MIN)?,
            parse_var("MAX_OFFSET_MAX", MAX_OFFSET_MAX)?,
        )?;

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://temperature.db".to_string()),
            history_csv: std::env::var("HISTORY_CSV")
                .unwrap_or_else(|_| "temperature_datas.csv".to_string()),
            port: parse_var("PORT", 8080)?,
            fallback,
        })
    }
}

/// Read and parse an env var, falling back to `default` when it is unset.
fn parse_var<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match std::env::var(name) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError::InvalidVar {
            name,
            expected: std::any::type_name::<T>(),
            value,
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // All env manipulation lives in this single test: cargo runs tests in
    // parallel and the process environment is shared.
    #[test]
    fn test_from_env() {
        unsafe {
            std::env::remove_var("DATABASE_URL");
            std::env::remove_var("HISTORY_CSV");
            std::env::remove_var("PORT");
            std::env::remove_var("FALLBACK_MIN");
            std::env::remove_var("FALLBACK_MAX");
            std::env::remove_var("MAX_OFFSET_MIN");
            std::env::remove_var("MAX_OFFSET_MAX");
        }

        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.database_url, "sqlite://temperature.db");
        assert_eq!(config.history_csv, "temperature_datas.csv");
        assert_eq!(config.fallback, FallbackPolicy::default());

        unsafe {
            std::env::set_var("PORT", "not-a-port");
        }
        let err = AppConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidVar { name: "PORT", .. }));

        unsafe {
            std::env::set_var("PORT", "9000");
            std::env::set_var("FALLBACK_MIN", "70");
        }
        let err = AppConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFallback(_)));

        unsafe {
            std::env::set_var("FALLBACK_MIN", "10.5");
            std::env::set_var("FALLBACK_MAX", "20.5");
        }
        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.fallback.min, 10.5);
        assert_eq!(config.fallback.max, 20.5);

        unsafe {
            std::env::remove_var("PORT");
            std::env::remove_var("FALLBACK_MIN");
            std::env::remove_var("FALLBACK_MAX");
        }
    }
}
