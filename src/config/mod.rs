//! Configuration module for Vantage.
//!
//! Handles the settings file, environment variables, and cost tiers.

mod settings;

pub use settings::{
    expand_env_vars, CostSettings, DiagnosticSettings, LoggingSettings, Settings, SettingsError,
    DEFAULT_TIER,
};
