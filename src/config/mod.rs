//! Configuration module for dicer.
//!
//! Handles browser toggles, physical naming conventions and environment
//! variable expansion.

mod settings;

pub use settings::{expand_env_vars, MapperKind, Settings, SettingsError};
