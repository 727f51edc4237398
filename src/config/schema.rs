//! Configuration schema for wabook.
//!
//! All structs use `#[serde(rename_all = "camelCase")]` so that the JSON
//! config file can use camelCase keys while Rust code uses snake_case fields.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::loader::get_data_dir;

/// WhatsApp bridge connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeConfig {
    /// Explicit bridge WebSocket URL. When unset, the bridge process is
    /// auto-spawned and reached at `ws://localhost:{port}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default = "default_bridge_port")]
    pub port: u16,
}

fn default_bridge_port() -> u16 {
    3010
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            url: None,
            port: default_bridge_port(),
        }
    }
}

impl BridgeConfig {
    /// The URL to connect to: explicit `url` if set, else localhost:port.
    pub fn effective_url(&self) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None => format!("ws://localhost:{}", self.port),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Country code prepended to numbers of 8 digits or fewer.
    #[serde(default = "default_country_code")]
    pub default_country_code: String,
    /// Override for the address-book file path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book_path: Option<PathBuf>,
    #[serde(default)]
    pub bridge: BridgeConfig,
}

fn default_country_code() -> String {
    crate::phone::DEFAULT_COUNTRY_CODE.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_country_code: default_country_code(),
            book_path: None,
            bridge: BridgeConfig::default(),
        }
    }
}

impl Config {
    /// Resolved address-book file path (`~/.wabook/phonebook.json` unless
    /// overridden).
    pub fn book_path(&self) -> PathBuf {
        match &self.book_path {
            Some(path) => path.clone(),
            None => get_data_dir().join("phonebook.json"),
        }
    }
}
