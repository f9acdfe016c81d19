//! TOML-based configuration for dicer.
//!
//! Supports a config file (dicer.toml) with environment variable expansion
//! in schema names.
//!
//! Example configuration:
//! ```toml
//! dialect = "postgres"
//! mapper = "snowflake"
//! schema = "${DW_SCHEMA}"
//! dimension_prefix = "dim_"
//! fact_prefix = "ft_"
//!
//! include_cell_count = false
//! batch_size = 500
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::sql::Dialect;

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

/// How logical attributes map onto physical tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MapperKind {
    /// Fact table plus one table per dimension.
    #[default]
    Snowflake,
    /// A single pre-joined view per cube.
    Denormalized,
}

/// Root configuration structure.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Compute the summary record even when drilling down.
    pub include_summary: bool,

    /// Count drilldown groups before pagination.
    pub include_cell_count: bool,

    /// Drop drilldown rows where any built-in aggregate is null.
    pub exclude_null_aggregates: bool,

    pub dialect: Dialect,

    pub mapper: MapperKind,

    /// Default schema for every table (supports ${ENV_VAR} expansion).
    pub schema: Option<String>,

    pub fact_prefix: String,
    pub fact_suffix: String,
    pub dimension_prefix: String,
    pub dimension_suffix: String,

    /// Schema of dimension tables; falls back to `schema`.
    pub dimension_schema: Option<String>,

    pub denormalized_view_prefix: String,

    /// Schema of denormalized views; falls back to `schema`.
    pub denormalized_view_schema: Option<String>,

    /// Rows fetched from a cursor at a time.
    pub batch_size: usize,

    /// Window of moving calculators without an explicit one.
    pub default_window_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            include_summary: true,
            include_cell_count: true,
            exclude_null_aggregates: true,
            dialect: Dialect::default(),
            mapper: MapperKind::default(),
            schema: None,
            fact_prefix: String::new(),
            fact_suffix: String::new(),
            dimension_prefix: String::new(),
            dimension_suffix: String::new(),
            dimension_schema: None,
            denormalized_view_prefix: "mft_".to_string(),
            denormalized_view_schema: None,
            batch_size: 100,
            default_window_size: 2,
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
        Self::from_toml(&content)
    }

    /// Parse settings from TOML text, expand schema names and validate.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let mut settings: Settings = toml::from_str(content)?;

        for schema in [
            &mut settings.schema,
            &mut settings.dimension_schema,
            &mut settings.denormalized_view_schema,
        ] {
            if let Some(value) = schema.as_mut() {
                *value = expand_env_vars(value)?;
            }
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `DICER_CONFIG`
    /// 2. `./dicer.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("DICER_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("dicer.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        Ok(Settings::default())
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.batch_size == 0 {
            return Err(SettingsError::InvalidConfig(
                "batch_size must be at least 1".into(),
            ));
        }
        if self.default_window_size == 0 {
            return Err(SettingsError::InvalidConfig(
                "default_window_size must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn effective_dimension_schema(&self) -> Option<&str> {
        self.dimension_schema.as_deref().or(self.schema.as_deref())
    }

    pub fn effective_view_schema(&self) -> Option<&str> {
        self.denormalized_view_schema
            .as_deref()
            .or(self.schema.as_deref())
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

        let braced = chars.peek() == Some(&'{');
        if braced {
            chars.next();
        }

        let mut var_name = String::new();
        while let Some(&ch) = chars.peek() {
            if braced && ch == '}' {
                chars.next();
                break;
            }
            if !braced && !(ch.is_alphanumeric() || ch == '_') {
                break;
            }
            var_name.push(ch);
            chars.next();
        }

        if var_name.is_empty() && !braced {
            // Just a lone $, keep it
            result.push('$');
            continue;
        }

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
