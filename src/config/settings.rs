//! TOML-based configuration for Vantage.
//!
//! Supports a config file (vantage.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! model_path = "${VANTAGE_HOME}/model.toml"
//! dialect = "duckdb"
//! query_timeout_ms = 30000
//!
//! [logging]
//! filter = "vantage=info"
//!
//! [cost.tiers.default]
//! max_output_rows = 100000
//! max_scan_bytes = 50000000000
//! max_joins = 8
//!
//! [cost.tiers.analyst]
//! max_output_rows = 1000000
//!
//! [diagnostics]
//! trend_dimension = "sale_month"
//! coverage_metric = "active_customers"
//! exception_metric = "return_count"
//! high_threshold = 0.5
//! medium_threshold = 0.2
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::planner::RoleLimits;
use crate::sql::Dialect;

/// Name of the tier used when a caller's tier is not configured.
pub const DEFAULT_TIER: &str = "default";

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("No model path configured")]
    NoModelPath,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Path to the semantic model (supports ${ENV_VAR} expansion).
    pub model_path: Option<String>,

    /// SQL dialect queries are rendered in.
    pub dialect: Dialect,

    /// Per-query execution timeout.
    pub query_timeout_ms: u64,

    pub logging: LoggingSettings,

    /// Cost limits per tier.
    pub cost: CostSettings,

    /// Diagnostic sub-query configuration.
    pub diagnostics: DiagnosticSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model_path: None,
            dialect: Dialect::default(),
            query_timeout_ms: 30_000,
            logging: LoggingSettings::default(),
            cost: CostSettings::default(),
            diagnostics: DiagnosticSettings::default(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `tracing` filter directive; `RUST_LOG` takes precedence.
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "vantage=info".to_string(),
        }
    }
}

/// Cost tiers.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CostSettings {
    pub tiers: BTreeMap<String, RoleLimits>,
}

impl CostSettings {
    /// Limits for `tier`, falling back to the `default` tier and then to the
    /// built-in limits.
    pub fn limits_for(&self, tier: &str) -> RoleLimits {
        self.tiers
            .get(tier)
            .or_else(|| self.tiers.get(DEFAULT_TIER))
            .copied()
            .unwrap_or_default()
    }
}

/// Diagnostic configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiagnosticSettings {
    /// Dimension the trend sub-query groups by. Defaults to the time
    /// range's own dimension.
    pub trend_dimension: Option<String>,

    /// Distribution metric compared across periods. Skipped when unset.
    pub coverage_metric: Option<String>,

    /// Special-condition metric compared across periods. Skipped when unset.
    pub exception_metric: Option<String>,

    /// Minimum impact for a HIGH severity cause.
    pub high_threshold: f64,

    /// Minimum impact for a MEDIUM severity cause.
    pub medium_threshold: f64,
}

impl Default for DiagnosticSettings {
    fn default() -> Self {
        Self {
            trend_dimension: None,
            coverage_metric: None,
            exception_metric: None,
            high_threshold: 0.5,
            medium_threshold: 0.2,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse settings from TOML source.
    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `VANTAGE_CONFIG`
    /// 2. `./vantage.toml`
    /// 3. `~/.config/vantage/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("VANTAGE_CONFIG") {
            return Self::from_file(expand_env_vars(&path)?);
        }

        let local_config = PathBuf::from("vantage.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("vantage").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    /// Model path with environment variables expanded.
    pub fn resolved_model_path(&self) -> Result<PathBuf, SettingsError> {
        let raw = self.model_path.as_deref().ok_or(SettingsError::NoModelPath)?;
        Ok(PathBuf::from(expand_env_vars(raw)?))
    }

    fn validate(&self) -> Result<(), SettingsError> {
        let d = &self.diagnostics;
        let in_unit = |x: f64| (0.0..=1.0).contains(&x);
        if !in_unit(d.high_threshold) || !in_unit(d.medium_threshold) {
            return Err(SettingsError::InvalidConfig(
                "severity thresholds must lie between 0 and 1".into(),
            ));
        }
        if self.query_timeout_ms == 0 {
            return Err(SettingsError::InvalidConfig(
                "query_timeout_ms must be positive".into(),
            ));
        }
        if d.medium_threshold > d.high_threshold {
            return Err(SettingsError::InvalidConfig(format!(
                "medium_threshold {} exceeds high_threshold {}",
                d.medium_threshold, d.high_threshold
            )));
        }
        Ok(())
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let mut var_name = String::new();
        if chars.peek() == Some(&'{') {
            chars.next();
            for ch in chars.by_ref() {
                if ch == '}' {
                    break;
                }
                var_name.push(ch);
            }
        } else {
            // $VAR ends at the first non-identifier character
            while let Some(&ch) = chars.peek() {
                if !(ch.is_alphanumeric() || ch == '_') {
                    break;
                }
                var_name.push(ch);
                chars.next();
            }
            if var_name.is_empty() {
                result.push('$');
                continue;
            }
        }

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
