//! Bootstrap configuration loading and resolution
//!
//! Configuration lives in a small TOML file. Every field is optional; a missing
//! or unreadable file never stops startup, it only produces a warning and the
//! compiled defaults.
//!
//! Priority order for each setting:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default base URL of the remote analysis backend
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";

/// Default port of the labeling service
pub const DEFAULT_PORT: u16 = 5780;

/// Environment variable overriding the config file location
pub const CONFIG_ENV_VAR: &str = "CXR_CONFIG";

/// Environment variable overriding the backend base URL
pub const BACKEND_URL_ENV_VAR: &str = "CXR_BACKEND_URL";

/// Bootstrap configuration loaded from TOML file
///
/// Read once at startup. The service must restart to pick up changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Base URL of the analysis backend (e.g. "http://gpu-box:8000")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_url: Option<String>,

    /// HTTP port of the labeling service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Per-request timeout for backend calls, in seconds
    ///
    /// Unset means requests may wait indefinitely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Effective service port (TOML value or compiled default)
    pub fn port_or_default(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }
}

/// Resolves the location of a module's TOML config file
///
/// Priority: CLI argument → `CXR_CONFIG` → `<config_dir>/cxr/<module>.toml`
pub struct ConfigFileResolver {
    module_name: String,
}

impl ConfigFileResolver {
    /// Create a resolver for the given module (e.g. "cxr-labeler")
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
        }
    }

    /// Resolve the config file path
    ///
    /// Returns `None` only when no CLI/ENV override exists and the platform has
    /// no config directory.
    pub fn resolve(&self, cli_arg: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = cli_arg {
            debug!("Config file from command line: {}", path.display());
            return Some(path.to_path_buf());
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                debug!("Config file from {}: {}", CONFIG_ENV_VAR, path);
                return Some(PathBuf::from(path));
            }
        }

        self.default_path()
    }

    /// Platform default config path for this module
    pub fn default_path(&self) -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("cxr").join(format!("{}.toml", self.module_name)))
    }
}

/// Load and parse a TOML config file
///
/// Strict variant: a missing or malformed file is an error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML {} failed: {}", path.display(), e)))
}

/// Load a TOML config file, degrading to defaults
///
/// A missing file is logged at info level, a malformed one at warn level;
/// both return `TomlConfig::default()`.
pub fn load_or_default(path: Option<&Path>) -> TomlConfig {
    let Some(path) = path else {
        warn!("No config directory available, using compiled defaults");
        return TomlConfig::default();
    };

    if !path.exists() {
        info!("Config file {} not found, using compiled defaults", path.display());
        return TomlConfig::default();
    }

    match load_toml_config(path) {
        Ok(config) => {
            info!("Loaded configuration from {}", path.display());
            config
        }
        Err(e) => {
            warn!("{} (using compiled defaults)", e);
            TomlConfig::default()
        }
    }
}

/// Write a TOML config file atomically
///
/// Writes to a sibling temp file and renames it over the target, creating the
/// parent directory when needed.
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Write the default config to `path` when no file exists yet
///
/// Returns `Ok(true)` when a file was created. An existing file is never
/// touched, even if it fails to parse.
pub fn create_default_config_if_missing(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    write_toml_config(&TomlConfig::default(), path)?;
    info!("Wrote default configuration to {}", path.display());
    Ok(true)
}

/// Resolve the backend base URL
///
/// **Priority:** CLI → ENV (`CXR_BACKEND_URL`) → TOML → compiled default.
/// A trailing slash is removed so endpoint paths can be appended directly.
pub fn resolve_backend_url(cli_arg: Option<&str>, toml_config: &TomlConfig) -> Result<String> {
    let env_value = std::env::var(BACKEND_URL_ENV_VAR).ok();

    let (url, source) = if let Some(url) = cli_arg.filter(|u| !u.trim().is_empty()) {
        (url.to_string(), "command line")
    } else if let Some(url) = env_value.filter(|u| !u.trim().is_empty()) {
        (url, "environment")
    } else if let Some(url) = toml_config.backend_url.clone() {
        (url, "TOML")
    } else {
        (DEFAULT_BACKEND_URL.to_string(), "default")
    };

    let url = url.trim().trim_end_matches('/').to_string();
    if !is_valid_backend_url(&url) {
        return Err(Error::Config(format!(
            "Backend URL from {} must start with http:// or https://, got '{}'",
            source, url
        )));
    }

    info!("Backend URL ({}): {}", source, url);
    Ok(url)
}

/// Validate backend URL (http or https scheme with a host)
pub fn is_valid_backend_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"));
    matches!(rest, Some(host) if !host.is_empty())
}
