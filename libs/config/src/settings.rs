//! Runtime Configuration Module
//!
//! Loads [`PulseConfig`] from TOML files with environment-specific overrides.
//! Every section is optional; absent fields take the values in [`crate::defaults`].

use crate::defaults;
use anyhow::{Context, Result};
use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Environment variable prefix, e.g. `PULSE__RUNTIME__MAILBOX_CAPACITY=64`
pub const ENV_PREFIX: &str = "PULSE";

/// Top-level configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct PulseConfig {
    pub runtime: RuntimeSettings,
    pub router: RouterSettings,
    pub streams: StreamSettings,
    pub logging: LoggingSettings,
}

/// Actor runtime settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct RuntimeSettings {
    /// Mailbox capacity for actors that do not override it
    pub mailbox_capacity: usize,
    /// Bound on `stop()`; `0` disables the bound
    pub stop_timeout_ms: u64,
    /// Dedicated loop domains created when the system starts
    pub loop_domains: usize,
    pub domain_thread_prefix: String,
}

/// Router settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct RouterSettings {
    pub reap_interval: u64,
}

/// Demand pipeline settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct StreamSettings {
    pub tick_interval_ms: u64,
    pub accounting_heartbeat_ms: u64,
    pub min_tick_interval_ms: u64,
}

/// Logging settings consumed by [`crate::logging::init`]
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive, overridden by `RUST_LOG` when set
    pub level: String,
    /// `pretty` or `json`
    pub format: String,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            mailbox_capacity: defaults::runtime::MAILBOX_CAPACITY,
            stop_timeout_ms: defaults::runtime::STOP_TIMEOUT_MS,
            loop_domains: defaults::runtime::LOOP_DOMAINS,
            domain_thread_prefix: defaults::runtime::DOMAIN_THREAD_PREFIX.to_string(),
        }
    }
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            reap_interval: defaults::router::REAP_INTERVAL,
        }
    }
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: defaults::streams::TICK_INTERVAL_MS,
            accounting_heartbeat_ms: defaults::streams::ACCOUNTING_HEARTBEAT_MS,
            min_tick_interval_ms: defaults::streams::MIN_TICK_INTERVAL_MS,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: defaults::logging::LEVEL.to_string(),
            format: defaults::logging::FORMAT.to_string(),
        }
    }
}

impl RuntimeSettings {
    /// Stop bound as a duration, `None` when disabled
    pub fn stop_timeout(&self) -> Option<Duration> {
        (self.stop_timeout_ms > 0).then(|| Duration::from_millis(self.stop_timeout_ms))
    }
}

impl StreamSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn accounting_heartbeat(&self) -> Duration {
        Duration::from_millis(self.accounting_heartbeat_ms)
    }

    pub fn min_tick_interval(&self) -> Duration {
        Duration::from_millis(self.min_tick_interval_ms)
    }
}

impl PulseConfig {
    /// Load configuration from files with environment overrides
    ///
    /// `base_path` defaults to `config/pulse.toml`. When `environment` is given,
    /// `config/environments/<environment>.toml` is layered on top if it exists.
    /// `PULSE__<SECTION>__<FIELD>` variables win over both files.
    pub fn load(base_path: Option<&Path>, environment: Option<&str>) -> Result<Self> {
        let base = base_path.unwrap_or(Path::new("config/pulse.toml"));

        let mut builder = Config::builder().add_source(File::from(base).required(true));

        if let Some(env) = environment {
            let env_file = base
                .parent()
                .unwrap_or(Path::new("config"))
                .join("environments")
                .join(format!("{}.toml", env));

            if env_file.exists() {
                info!("Loading environment config: {:?}", env_file);
                builder = builder.add_source(File::from(env_file));
            } else {
                warn!("Environment config not found: {:?}", env_file);
            }
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        let loaded: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        debug!(
            mailbox_capacity = loaded.runtime.mailbox_capacity,
            reap_interval = loaded.router.reap_interval,
            tick_interval_ms = loaded.streams.tick_interval_ms,
            "Configuration loaded"
        );
        Ok(loaded)
    }

    /// Parse configuration from an in-memory TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Failed to parse TOML configuration")
    }

    /// Render the configuration back to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}

/// Load configuration, falling back to defaults when no file is given
pub fn load_config(path: Option<PathBuf>, environment: Option<&str>) -> Result<PulseConfig> {
    match path {
        Some(path) => PulseConfig::load(Some(&path), environment),
        None => {
            debug!("No configuration file given, using defaults");
            Ok(PulseConfig::default())
        }
    }
}
