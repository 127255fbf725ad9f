//! `portalchat-config`: PortalChat runtime configuration.
//!
//! Provides:
//! - Typed config schema (backend layout, transport, session, portals)
//! - YAML read/write with atomic backup rotation
//! - `PORTALCHAT_*` environment overrides
//! - Validation with warnings

pub mod defaults;
pub mod env;
pub mod io;
pub mod schema;
pub mod validation;

pub use env::{apply_env_overrides, apply_env_overrides_with, EnvOverrideError};
pub use io::{config_dir, config_file_path, database_path, load_config, write_config};
pub use schema::{
    BackendConfig, BackendPaths, HttpConfig, LoggingConfig, PortalChatConfig, PortalsConfig,
    SessionConfig, StorageConfig, UUID_PLACEHOLDER,
};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::{bail, Result};
use std::path::Path;

/// Load a config file, apply env overrides, and validate.
///
/// This is the main entry point for loading a config at runtime. Warnings are
/// logged; any validation error fails the load.
pub async fn load_and_prepare(path: &Path) -> Result<PortalChatConfig> {
    let config = load_config(path).await?;
    let config = apply_env_overrides(config)?;

    let report = validate(&config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    for error in &report.errors {
        tracing::error!(path = %error.path, message = %error.message, "Config error");
    }
    if let Some(first) = report.errors.first() {
        bail!("{} ({} error(s) total)", first, report.errors.len());
    }

    Ok(config)
}
