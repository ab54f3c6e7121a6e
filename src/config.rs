//! Configuration for harvest-ledger

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::ledger::TransitionPolicy;

/// Default storage directory
pub fn default_storage_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("harvest-ledger")
}

/// Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding `ledger.db`
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// HTTP API port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// HS256 secret for bearer tokens; a dev secret is used when unset
    #[serde(default)]
    pub jwt_secret: Option<String>,

    /// Token lifetime in seconds
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,

    /// Currency label on wallet summaries
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Reject status changes that do not move forward in the lifecycle
    #[serde(default)]
    pub forward_only_transitions: bool,
}

fn default_http_port() -> u16 {
    8080
}

fn default_token_ttl() -> u64 {
    24 * 60 * 60
}

fn default_currency() -> String {
    "USD".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            http_port: default_http_port(),
            jwt_secret: None,
            token_ttl_secs: default_token_ttl(),
            currency: default_currency(),
            forward_only_transitions: false,
        }
    }
}

impl Config {
    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), std::io::Error> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Status transition policy for the role gate
    pub fn transition_policy(&self) -> TransitionPolicy {
        if self.forward_only_transitions {
            TransitionPolicy::ForwardOnly
        } else {
            TransitionPolicy::Unrestricted
        }
    }

    /// Get config file path
    pub fn config_path(&self) -> PathBuf {
        self.storage_dir.join("config.toml")
    }
}
