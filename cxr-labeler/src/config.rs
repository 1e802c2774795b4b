//! Configuration resolution for cxr-labeler
//!
//! Combines the TOML bootstrap file with command-line/environment overrides.
//! Priority for every setting: CLI (clap also reads the env var) → TOML →
//! compiled default.

use cxr_common::config::{
    load_or_default, resolve_backend_url, ConfigFileResolver, TomlConfig,
};
use cxr_common::Result;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Module name used for the default config file name
pub const MODULE_NAME: &str = "cxr-labeler";

/// Locate and load the TOML config, degrading to defaults
///
/// Returns the path that was consulted alongside the config.
pub fn load_toml(cli_config: Option<&Path>) -> (Option<PathBuf>, TomlConfig) {
    let path = ConfigFileResolver::new(MODULE_NAME).resolve(cli_config);
    let config = load_or_default(path.as_deref());
    (path, config)
}

/// Effective runtime configuration
#[derive(Debug, Clone, PartialEq)]
pub struct LabelerConfig {
    pub backend_url: String,
    pub port: u16,
    /// `None` waits indefinitely
    pub request_timeout: Option<Duration>,
    pub log_level: String,
}

impl LabelerConfig {
    pub fn resolve(
        toml_config: &TomlConfig,
        cli_backend_url: Option<&str>,
        cli_port: Option<u16>,
    ) -> Result<Self> {
        let backend_url = resolve_backend_url(cli_backend_url, toml_config)?;
        let port = cli_port.unwrap_or_else(|| toml_config.port_or_default());
        // 0 disables the timeout as well
        let request_timeout = toml_config
            .request_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        Ok(Self {
            backend_url,
            port,
            request_timeout,
            log_level: toml_config.logging.level.clone(),
        })
    }
}
