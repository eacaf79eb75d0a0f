//! Logging initialization.
//!
//! Logs go to stderr so stdout stays free for the manifest.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber. `RUST_LOG` overrides the level.
pub fn init(level: &str, json_format: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Resolve the level and format from `[logging]` plus the CLI flags.
pub fn settings_from_config(
    config: &lightbox_core::Config,
    verbose_override: bool,
    json_logs_override: bool,
) -> (String, bool) {
    let level = if verbose_override {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    };
    let json_format = json_logs_override || config.logging.format == "json";
    (level, json_format)
}

pub fn init_from_config(config: &lightbox_core::Config, verbose: bool, json_logs: bool) {
    let (level, json_format) = settings_from_config(config, verbose, json_logs);
    init(&level, json_format);
}

#[cfg(test)]
mod tests {
    use super::*;
    use lightbox_core::Config;

    #[test]
    fn test_defaults_to_config_level() {
        let config = Config::default();
        assert_eq!(settings_from_config(&config, false, false), ("info".to_string(), false));
    }

    #[test]
    fn test_verbose_and_json_overrides() {
        let mut config = Config::default();
        config.logging.level = "warn".to_string();
        assert_eq!(settings_from_config(&config, true, true), ("debug".to_string(), true));

        config.logging.format = "json".to_string();
        assert!(settings_from_config(&config, false, false).1);
    }
}
