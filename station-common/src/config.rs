//! Configuration loading and config file resolution

use crate::api::auth::Scope;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "STATION_CONFIG";

/// Complete service configuration as read from TOML
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub api_keys: Vec<ApiKeyConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5740,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the library database (opened read-only)
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: get_default_data_folder().join("library.db"),
        }
    }
}

/// Settings consumed by the JSON:API layer
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Path prefix for every resource route and generated link
    pub base_path: String,
    /// Page size used when the client sends no `page[size]`
    pub default_page_size: usize,
    /// Server-side cap on `page[size]`
    pub max_page_size: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_path: "/api/v2".to_string(),
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

/// One accepted API key, stored as a SHA-256 digest
#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeyConfig {
    pub name: String,
    /// Lowercase hex SHA-256 of the key presented in `X-APIKEY`
    pub key_sha256: String,
    #[serde(default)]
    pub scopes: Vec<Scope>,
}

impl ServiceConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: ServiceConfig =
            toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Resolve and load configuration, falling back to defaults when no file exists
    ///
    /// A missing file is not an error; an unreadable or invalid one is.
    pub fn resolve(cli_arg: Option<&Path>) -> Result<Self> {
        match resolve_config_path(cli_arg, CONFIG_ENV_VAR) {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                Self::load(&path)
            }
            None => {
                warn!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.api.default_page_size == 0 || self.api.max_page_size == 0 {
            return Err(Error::Config("page sizes must be positive".to_string()));
        }
        if self.api.default_page_size > self.api.max_page_size {
            return Err(Error::Config(format!(
                "default_page_size {} exceeds max_page_size {}",
                self.api.default_page_size, self.api.max_page_size
            )));
        }
        if !self.api.base_path.starts_with('/') {
            return Err(Error::Config(format!(
                "base_path must start with '/': {}",
                self.api.base_path
            )));
        }
        for key in &self.api_keys {
            let valid = key.key_sha256.len() == 64
                && key.key_sha256.chars().all(|c| c.is_ascii_hexdigit());
            if !valid {
                return Err(Error::Config(format!(
                    "api key '{}' is not a 64-character hex SHA-256 digest",
                    key.name
                )));
            }
        }
        Ok(())
    }
}

/// Config file resolution in priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. User config file
/// 4. System config file
///
/// Returns `None` when nothing is found, in which case defaults apply.
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: ~/.config/station/config.toml
    if let Some(path) = dirs::config_dir().map(|d| d.join("station").join("config.toml")) {
        if path.exists() {
            return Some(path);
        }
    }

    // Priority 4: /etc/station/config.toml
    let system_config = PathBuf::from("/etc/station/config.toml");
    if cfg!(unix) && system_config.exists() {
        return Some(system_config);
    }

    None
}

/// Get OS-dependent default data folder
fn get_default_data_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("station"))
        .unwrap_or_else(|| PathBuf::from("./station_data"))
}
