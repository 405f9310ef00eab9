//! CLI Configuration
//!
//! Settings shared by all subcommands, stored as TOML in
//! `~/.config/anymote/config.toml`. Command-line flags override them.

use anyhow::{Context, Result};
use anymote_protocol::transport::{
    TransportConfig, DEFAULT_COMMAND_PORT, DEFAULT_CONNECT_TIMEOUT, DEFAULT_PAIRING_PORT,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// CLI configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Target device
    #[serde(default)]
    pub device: DeviceConfig,

    /// This client
    #[serde(default)]
    pub client: ClientConfig,

    /// Connection settings
    #[serde(default)]
    pub network: NetworkConfig,
}

/// Target device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Host name or address of the device
    #[serde(default)]
    pub host: Option<String>,

    #[serde(default = "default_pairing_port")]
    pub pairing_port: u16,

    #[serde(default = "default_command_port")]
    pub command_port: u16,

    /// Expected SHA-256 fingerprint of the device certificate
    #[serde(default)]
    pub pinned_fingerprint: Option<String>,
}

/// This client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Name shown on the device while pairing
    #[serde(default = "default_client_name")]
    pub name: String,

    /// Combined PEM file with the client certificate and key
    #[serde(default = "default_cert_path")]
    pub cert_path: PathBuf,
}

/// Connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// TCP connect and TLS handshake timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// How long to wait for a pairing reply, in seconds; 0 waits forever
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
}

fn default_pairing_port() -> u16 {
    DEFAULT_PAIRING_PORT
}

fn default_command_port() -> u16 {
    DEFAULT_COMMAND_PORT
}

fn default_client_name() -> String {
    "anymote-rs".to_string()
}

fn default_cert_path() -> PathBuf {
    config_dir().join("cert.pem")
}

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT.as_secs()
}

fn default_read_timeout() -> u64 {
    // Upper bound on one pairing reply; a silent device fails the step
    // instead of hanging the CLI
    120
}

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join("anymote")
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            host: None,
            pairing_port: default_pairing_port(),
            command_port: default_command_port(),
            pinned_fingerprint: None,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            name: default_client_name(),
            cert_path: default_cert_path(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
        }
    }
}

impl Config {
    /// Default location of the configuration file
    pub fn default_path() -> PathBuf {
        config_dir().join("config.toml")
    }

    /// Load configuration from `path`, creating a default file if not found
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Transport settings for the protocol library
    pub fn transport_config(&self) -> TransportConfig {
        let read_timeout = match self.network.read_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        TransportConfig {
            connect_timeout: Duration::from_secs(self.network.connect_timeout_secs),
            read_timeout,
            pinned_peer_fingerprint: self.device.pinned_fingerprint.clone(),
        }
    }
}
