//! Runtime configuration for hosts embedding curio core.
//!
//! # Invariants
//! - Every field has a default; an empty JSON object is a valid config.
//! - `CoreConfig::from_json_str` only returns validated configs.

use crate::logging::{default_log_level, normalize_level, LoggingError};
use crate::service::notification_service::NotificationPolicy;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Upper bound for any configured lead time.
pub const MAX_LEAD_DAYS: u32 = 3650;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub log_level: String,
    /// Absolute log directory; `None` disables file logging.
    pub log_dir: Option<PathBuf>,
    /// SQLite file path; `None` opens an in-memory database.
    pub database_path: Option<PathBuf>,
    pub notifications: NotificationPolicy,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level().to_string(),
            log_dir: None,
            database_path: None,
            notifications: NotificationPolicy::default(),
        }
    }
}

impl CoreConfig {
    /// Parses and validates a JSON config document.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        normalize_level(&self.log_level).map_err(ConfigError::Logging)?;
        for (name, value) in [
            (
                "notifications.expiration_lead_days",
                self.notifications.expiration_lead_days,
            ),
            (
                "notifications.maintenance_lead_days",
                self.notifications.maintenance_lead_days,
            ),
        ] {
            if value > MAX_LEAD_DAYS {
                return Err(ConfigError::LeadDaysOutOfRange { name, value });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Parse(String),
    Logging(LoggingError),
    LeadDaysOutOfRange { name: &'static str, value: u32 },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(reason) => write!(f, "invalid config: {reason}"),
            Self::Logging(err) => write!(f, "invalid config: {err}"),
            Self::LeadDaysOutOfRange { name, value } => write!(
                f,
                "invalid config: {name} must be at most {MAX_LEAD_DAYS}, got {value}"
            ),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Logging(err) => Some(err),
            _ => None,
        }
    }
}
