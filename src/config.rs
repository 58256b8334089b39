use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::ping::{AddressFamily, DEFAULT_TIMEOUT, DEFAULT_TTL, QOS_UNSET};

/// Session defaults persisted as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub timeout: f64,
    pub ttl: i64,
    pub qos: u8,
    pub address_family: AddressFamily,
    pub source_address: Option<SocketAddr>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            ttl: DEFAULT_TTL,
            qos: QOS_UNSET,
            address_family: AddressFamily::Unspecified,
            source_address: None,
        }
    }
}

impl SessionConfig {
    pub fn config_path() -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_dir = dirs::config_dir()
            .ok_or("Could not find config directory")?
            .join("oping");

        fs::create_dir_all(&config_dir)?;
        Ok(config_dir.join("config.json"))
    }

    /// Reads the user's config file, falling back to defaults when it is
    /// missing or cannot be parsed.
    pub fn load() -> Self {
        Self::config_path()
            .ok()
            .filter(|path| path.exists())
            .and_then(|path| match Self::load_from(&path) {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!("Ignoring config {}: {}", path.display(), e);
                    None
                }
            })
            .unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
