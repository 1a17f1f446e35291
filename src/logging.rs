use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::LoggingSettings;
use crate::error::{Error, Result};

/// Install the global subscriber. `verbose` bumps the level (1 = debug,
/// 2+ = trace) and `quiet` drops it to errors only.
pub fn init_logging(settings: &LoggingSettings, verbose: u8, quiet: bool) -> Result<()> {
    let level = effective_level(settings, verbose, quiet);
    let filter = build_env_filter(level)?;

    let console = if settings.json_format {
        fmt::layer()
            .json()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .compact()
            .boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .try_init()
        .map_err(|e| Error::Config(format!("failed to install log subscriber: {e}")))?;

    tracing::debug!(level = %level, json = settings.json_format, "logging initialized");
    Ok(())
}

pub fn effective_level(settings: &LoggingSettings, verbose: u8, quiet: bool) -> Level {
    if quiet {
        return Level::ERROR;
    }
    match verbose {
        0 => parse_level(&settings.level),
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn build_env_filter(level: Level) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let directives = format!("{},sqlx=warn", level.to_string().to_lowercase());
    EnvFilter::try_new(&directives)
        .map_err(|e| Error::Config(format!("invalid log filter '{directives}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_configured_level() {
        let settings = LoggingSettings {
            level: "warn".to_string(),
            json_format: false,
        };
        assert_eq!(effective_level(&settings, 0, false), Level::WARN);
        assert_eq!(effective_level(&settings, 1, false), Level::DEBUG);
        assert_eq!(effective_level(&settings, 3, false), Level::TRACE);
        assert_eq!(effective_level(&settings, 2, true), Level::ERROR);
    }

    #[test]
    fn unknown_level_falls_back_to_info() {
        assert_eq!(parse_level("chatty"), Level::INFO);
        assert_eq!(parse_level("Warning"), Level::WARN);
    }
}
