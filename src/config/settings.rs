//! TOML-based configuration for the `cql` tool.
//!
//! Supports a config file (cql.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! schema = "${CQL_HOME}/schema.toml"
//! data = "./data.json"
//!
//! [query]
//! max_rows = 500
//!
//! [log]
//! filter = "cql=debug"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::planner::{PlannerOptions, ROW_LIMIT};

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

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Schema declaration file (supports ${ENV_VAR} expansion).
    pub schema: Option<String>,

    /// JSON dataset for the in-memory store (supports ${ENV_VAR} expansion).
    pub data: Option<String>,

    /// Query compilation settings.
    pub query: QuerySettings,

    /// Logging settings.
    pub log: LogSettings,
}

/// Query compilation settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QuerySettings {
    /// Maximum rows per query. Can only lower the built-in cap.
    pub max_rows: usize,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            max_rows: ROW_LIMIT,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LogSettings {
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: "warn".to_string(),
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
        let settings: Settings = toml::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `CQL_CONFIG`
    /// 2. `./cql.toml`
    /// 3. `~/.config/cql/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        // Check environment variable first
        if let Ok(path) = env::var("CQL_CONFIG") {
            return Self::from_file(&path);
        }

        // Check local directory
        let local_config = PathBuf::from("cql.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        // Check user config directory
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("cql").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        // Return defaults if no config file found
        Ok(Settings::default())
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.query.max_rows == 0 {
            return Err(SettingsError::InvalidConfig(
                "query.max_rows must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Schema path with environment variables expanded.
    pub fn schema_path(&self) -> Result<Option<PathBuf>, SettingsError> {
        self.schema
            .as_deref()
            .map(|s| expand_env_vars(s).map(PathBuf::from))
            .transpose()
    }

    /// Dataset path with environment variables expanded.
    pub fn data_path(&self) -> Result<Option<PathBuf>, SettingsError> {
        self.data
            .as_deref()
            .map(|s| expand_env_vars(s).map(PathBuf::from))
            .transpose()
    }

    /// Planner options derived from `[query]`, clamped to the hard cap.
    pub fn planner_options(&self) -> PlannerOptions {
        PlannerOptions {
            row_limit: self.query.max_rows.min(ROW_LIMIT),
        }
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

        let var_name = if chars.next_if_eq(&'{').is_some() {
            // ${VAR}
            let mut name = String::new();
            for ch in chars.by_ref() {
                if ch == '}' {
                    break;
                }
                name.push(ch);
            }
            name
        } else {
            // $VAR (ends at non-alphanumeric/underscore)
            let mut name = String::new();
            while let Some(ch) = chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_') {
                name.push(ch);
            }
            if name.is_empty() {
                // Just a lone $, keep it
                result.push('$');
                continue;
            }
            name
        };

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
