//! Tracing subscriber setup

use crate::settings::LoggingSettings;
use anyhow::{anyhow, Context, Result};
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber described by `settings`
///
/// `RUST_LOG` takes precedence over `settings.level`. Fails if a global
/// subscriber is already installed.
pub fn init(settings: &LoggingSettings) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&settings.level)
            .with_context(|| format!("Invalid log level directive '{}'", settings.level))?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    match settings.format.as_str() {
        "json" => builder.json().try_init(),
        "pretty" | "" => builder.try_init(),
        other => return Err(anyhow!("Unknown log format '{}'", other)),
    }
    .map_err(|e| anyhow!("Failed to install tracing subscriber: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_unknown_format() {
        let settings = LoggingSettings {
            level: "info".to_string(),
            format: "xml".to_string(),
        };
        assert!(init(&settings).is_err());
    }
}
