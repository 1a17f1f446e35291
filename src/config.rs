use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// trace, debug, info, warn or error
    pub level: String,
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub logging: LoggingSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            logging: LoggingSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Reads `DATABASE_URL`, `PERSONA_DB_MAX_CONNECTIONS`, `PERSONA_LOG_LEVEL`
    /// and `PERSONA_LOG_FORMAT` (`compact` or `json`).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        config.database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        if let Some(raw) = lookup("PERSONA_DB_MAX_CONNECTIONS") {
            config.max_connections = raw.trim().parse().map_err(|_| {
                Error::Config(format!(
                    "PERSONA_DB_MAX_CONNECTIONS must be a positive integer, got '{raw}'"
                ))
            })?;
            if config.max_connections == 0 {
                return Err(Error::Config(
                    "PERSONA_DB_MAX_CONNECTIONS must be at least 1".to_string(),
                ));
            }
        }

        if let Some(level) = lookup("PERSONA_LOG_LEVEL") {
            config.logging.level = level.trim().to_lowercase();
        }

        if let Some(format) = lookup("PERSONA_LOG_FORMAT") {
            config.logging.json_format = match format.trim().to_lowercase().as_str() {
                "json" => true,
                "compact" | "text" => false,
                other => {
                    return Err(Error::Config(format!(
                        "PERSONA_LOG_FORMAT must be 'compact' or 'json', got '{other}'"
                    )))
                }
            };
        }

        Ok(config)
    }

    pub fn require_database_url(&self) -> Result<&str> {
        self.database_url.as_deref().ok_or_else(|| {
            Error::Config("DATABASE_URL must be set to a Postgres instance".to_string())
        })
    }
}
