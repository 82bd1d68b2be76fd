// src/config.rs

//! Agent configuration
//!
//! TOML configuration with a single `[server]` section:
//!
//! ```toml
//! [server]
//! url = "https://ledger.example.com"
//! api_key = "txm_..."        # preferred
//! username = "agent"         # basic-auth fallback
//! password = "secret"
//! timeout_secs = 30
//! ```

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/txmirror/txmirror.toml";

/// Top-level configuration file structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub server: ServerSection,
}

/// Ledger server connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    /// Base URL of the ledger server, e.g. "https://ledger.example.com"
    #[serde(default)]
    pub url: String,

    /// API key, sent as X-API-Key; takes precedence over basic auth
    #[serde(default)]
    pub api_key: String,

    /// Basic-auth credentials, used only when no API key is configured
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            username: String::new(),
            password: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<AgentConfig> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;

        let config: AgentConfig = toml::from_str(&text)
            .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))?;

        debug!("loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load from an explicit path, or the default path when none is given.
    ///
    /// A missing default file yields the built-in defaults; an explicitly
    /// named file must exist.
    pub fn load_or_default(path: Option<&Path>) -> Result<AgentConfig> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    Self::load(default)
                } else {
                    Ok(AgentConfig::default())
                }
            }
        }
    }

    /// The server URL with any trailing slash removed; empty URL is an error
    pub fn server_url(&self) -> Result<String> {
        let url = self.server.url.trim_end_matches('/');
        if url.is_empty() {
            return Err(Error::Config(
                "no server URL configured; set [server] url".to_string(),
            ));
        }
        Ok(url.to_string())
    }
}
