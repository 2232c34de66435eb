//! Configuration management
//!
//! Supports configuration loading with precedence: env > file > CLI > defaults

mod builder;
mod env;
mod file;

pub use builder::{
    AuthConfig, BackendConfig, Config, ConfigBuilder, ObservabilityConfig, RewriteConfig,
    ServerConfig,
};

use std::path::Path;

use crate::Result;

#[cfg(test)]
static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Layer the config file and environment over `base`, which carries
/// command-line values.
///
/// An explicit path must exist; otherwise the standard locations are searched
/// and a missing file is not an error.
pub fn load_config(explicit_path: Option<&Path>, base: ConfigBuilder) -> Result<ConfigBuilder> {
    let mut builder = base;

    if let Some(path) = explicit_path {
        tracing::info!("Loading configuration from {}", path.display());
        builder = file::load_from_file(path, builder)?;
    } else if let Some(path) = file::find_config_file() {
        tracing::info!("Loading configuration from {}", path.display());
        builder = file::load_from_file(&path, builder)?;
    }

    // Override with environment variables
    builder = env::load_from_env(builder)?;

    Ok(builder)
}
