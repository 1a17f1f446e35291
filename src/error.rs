//! Error types for the persona engine.

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Persona engine error type.
///
/// Only caller misuse and collaborator failures end up here. Missing signal
/// data, unmatched snapshots and unchanged personas are ordinary return values.
#[derive(Error, Debug)]
pub enum Error {
    /// Window type outside the fixed `30d` / `180d` enumeration
    #[error("invalid window type '{value}': expected 30d or 180d")]
    InvalidWindow { value: String },

    /// Unknown persona name where a concrete persona is required
    #[error("unknown persona '{value}'")]
    UnknownPersona { value: String },

    /// Unknown match strength label read back from storage
    #[error("unknown match strength '{value}'")]
    UnknownStrength { value: String },

    /// Database error
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Schema migration error
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Collaborator failure that did not come from the database driver
    #[error("store error: {0}")]
    Store(String),

    /// JSON serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Imported signal value that cannot be read as the column's type
    #[error("invalid signal value on line {line}: {message}")]
    InvalidSignal { line: u64, message: String },

    /// CSV import error
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// True when the caller passed an argument the engine rejects outright.
    /// Retrying without changing the argument cannot succeed.
    pub fn is_usage_error(&self) -> bool {
        matches!(self, Error::InvalidWindow { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_window_is_usage_error() {
        let err = Error::InvalidWindow {
            value: "7d".to_string(),
        };
        assert!(err.is_usage_error());
        assert_eq!(
            err.to_string(),
            "invalid window type '7d': expected 30d or 180d"
        );
    }

    #[test]
    fn store_failure_is_not_usage_error() {
        let err = Error::Store("connection reset".to_string());
        assert!(!err.is_usage_error());
    }

    #[test]
    fn stored_data_errors_are_not_usage_errors() {
        let persona = Error::UnknownPersona {
            value: "big_spender".to_string(),
        };
        assert!(!persona.is_usage_error());
        let strength = Error::UnknownStrength {
            value: "extreme".to_string(),
        };
        assert!(!strength.is_usage_error());
        let signal = Error::InvalidSignal {
            line: 4,
            message: "card_utilization_pcts entry 'lots' is not a number".to_string(),
        };
        assert!(!signal.is_usage_error());
        assert!(signal.to_string().starts_with("invalid signal value on line 4"));
    }
}
