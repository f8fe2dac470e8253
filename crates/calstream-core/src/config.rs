use std::collections::BTreeSet;

use anyhow::Result;
use chrono::Weekday;
use chrono_tz::Tz;
use config::Config;
use serde::Deserialize;

use crate::constants::DEFAULT_PAGE_SIZE;
use crate::env::Environment;
use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub stream: StreamConfig,
    pub calendar: CalendarConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    pub page_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalendarConfig {
    pub timezone: String,
    pub first_day_of_week: String,
    #[serde(default)]
    pub visible_books: Vec<i64>,
    #[serde(default)]
    pub read_only_books: Vec<i64>,
    #[serde(default)]
    pub birthday_books: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Settings {
    /// ## Summary
    /// Loads configuration from environment variables and an optional
    /// `config.toml` into a `Settings`.
    ///
    /// ## Errors
    /// Returns an error if building the configuration or deserializing it fails.
    pub fn load() -> Result<Self> {
        Ok(Config::builder()
            .set_default("stream.page_size", i64::try_from(DEFAULT_PAGE_SIZE)?)?
            .set_default("calendar.timezone", "UTC")?
            .set_default("calendar.first_day_of_week", "mon")?
            .set_default("logging.level", "debug")?
            .add_source(
                config::Environment::with_prefix("CALSTREAM")
                    .separator("__")
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            .add_source(config::File::with_name("config.toml").required(false))
            .build()?
            .try_deserialize::<Settings>()?)
    }

    /// ## Summary
    /// Builds the injected [`Environment`] from these settings.
    ///
    /// ## Errors
    /// Returns [`CoreError::ConfigError`] for an unknown timezone or weekday,
    /// or a zero page size.
    pub fn environment(&self) -> CoreResult<Environment> {
        let timezone = self
            .calendar
            .timezone
            .parse::<Tz>()
            .map_err(|err| CoreError::ConfigError(format!("calendar.timezone: {err}")))?;
        let first_day_of_week = self
            .calendar
            .first_day_of_week
            .parse::<Weekday>()
            .map_err(|err| CoreError::ConfigError(format!("calendar.first_day_of_week: {err}")))?;
        if self.stream.page_size == 0 {
            return Err(CoreError::ConfigError(
                "stream.page_size must be positive".to_string(),
            ));
        }
        tracing::debug!(
            %timezone,
            %first_day_of_week,
            page_size = self.stream.page_size,
            "Calendar environment resolved"
        );

        Ok(Environment {
            timezone,
            first_day_of_week,
            page_size: self.stream.page_size,
            visible_books: self.calendar.visible_books.iter().copied().collect(),
            read_only_books: self.calendar.read_only_books.iter().copied().collect(),
            birthday_books: self
                .calendar
                .birthday_books
                .iter()
                .copied()
                .collect::<BTreeSet<_>>(),
            ..Environment::default()
        })
    }
}

/// ## Summary
/// Loads configuration from environment variables and `.env` file.
///
/// ## Errors
/// Returns an error if loading or deserializing the configuration fails.
pub fn load_config() -> Result<Settings> {
    dotenvy::dotenv().ok();

    Settings::load()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(timezone: &str, page_size: usize) -> Settings {
        Settings {
            stream: StreamConfig { page_size },
            calendar: CalendarConfig {
                timezone: timezone.to_string(),
                first_day_of_week: "sun".to_string(),
                visible_books: vec![1, 2],
                read_only_books: vec![],
                birthday_books: vec![9],
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }

    #[test]
    fn test_environment_from_settings() {
        let env = settings("Europe/Berlin", 25).environment().unwrap();
        assert_eq!(env.timezone, Tz::Europe__Berlin);
        assert_eq!(env.first_day_of_week, Weekday::Sun);
        assert_eq!(env.page_size, 25);
        assert_eq!(env.non_editable_books().collect::<Vec<_>>(), vec![9]);
    }

    #[test]
    fn test_environment_rejects_bad_values() {
        assert!(matches!(
            settings("Mars/Olympus", 10).environment(),
            Err(CoreError::ConfigError(_))
        ));
        assert!(matches!(
            settings("UTC", 0).environment(),
            Err(CoreError::ConfigError(_))
        ));
    }
}
