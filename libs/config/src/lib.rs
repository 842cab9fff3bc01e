//! # Pulse Configuration
//!
//! Centralized settings and defaults for the Pulse actor runtime, its routers
//! and the demand-driven pipeline.
//!
//! ## Features
//!
//! - **Defaults**: mailbox capacity, stop bound, reap interval, tick interval
//! - **Settings**: TOML files layered with `PULSE__` environment overrides
//! - **Logging**: tracing subscriber installation from settings
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pulse_config::{load_config, logging};
//!
//! let config = load_config(None, None).unwrap();
//! logging::init(&config.logging).unwrap();
//! assert_eq!(config.runtime.mailbox_capacity, pulse_config::defaults::runtime::MAILBOX_CAPACITY);
//! ```

pub mod defaults;
pub mod logging;
pub mod settings;

// Re-export commonly used types
pub use settings::{
    load_config, LoggingSettings, PulseConfig, RouterSettings, RuntimeSettings, StreamSettings,
};
