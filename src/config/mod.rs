//! Configuration module for the `cql` tool.
//!
//! Handles the settings file and environment variable expansion.

mod settings;

pub use settings::{expand_env_vars, LogSettings, QuerySettings, Settings, SettingsError};
