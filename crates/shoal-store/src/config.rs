use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Store handle configuration.
///
/// Every field has a default, so a TOML file only needs the keys it wants
/// to change:
///
/// ```toml
/// group = "inventory"
/// undo_depth = 16
///
/// [router]
/// request_timeout_ms = 2000
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Process-group name, used in logs and singleton errors.
    pub group: String,
    /// Maximum number of transactions a secondary can undo.
    pub undo_depth: usize,
    /// Buffer size of the healed-reference notification channel.
    pub heal_channel_capacity: usize,
    pub router: RouterConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            group: "default".into(),
            undo_depth: 64,
            heal_channel_capacity: 256,
            router: RouterConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> StoreResult<Self> {
        toml::from_str(text).map_err(|e| StoreError::Config(e.to_string()))
    }

    /// Read and parse a TOML file.
    pub fn load(path: &Path) -> StoreResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> StoreResult<String> {
        toml::to_string_pretty(self).map_err(|e| StoreError::Config(e.to_string()))
    }
}

/// Settings for the in-process router.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// How long a request waits for the primary's reply.
    pub request_timeout_ms: u64,
    /// Largest encoded message the wire codec accepts.
    pub max_message_size: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 5_000,
            max_message_size: 16 * 1024 * 1024,
        }
    }
}

impl RouterConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
