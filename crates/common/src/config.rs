// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 LocalDomain Contributors

// Client configuration for LocalDomain sharing

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Complete client configuration (client.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub progress: ProgressConfig,
    #[serde(default)]
    pub poller: PollerConfig,
    /// Prefill values for the share form
    #[serde(default)]
    pub defaults: TunnelDefaults,
}

/// Connection to the host service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DaemonConfig {
    /// Unix socket the host service listens on
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,
    /// Timeout for ordinary commands in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Timeout for the interactive Cloudflare login and provisioning in seconds
    #[serde(default = "default_interactive_timeout")]
    pub interactive_timeout_secs: u64,
}

/// Loading indicator timings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProgressConfig {
    /// Minimum time the global bar stays visible once shown
    #[serde(default = "default_min_visible")]
    pub min_visible_ms: u64,
    /// How long the bar holds at 100% before disappearing
    #[serde(default = "default_finish_anim")]
    pub finish_anim_ms: u64,
    /// Interval between creep steps
    #[serde(default = "default_creep_interval")]
    pub creep_interval_ms: u64,
    /// How long a finished row toggle keeps its full bar
    #[serde(default = "default_toggle_settle")]
    pub toggle_settle_ms: u64,
}

/// Tunnel status polling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollerConfig {
    #[serde(default = "default_poll_interval")]
    pub interval_ms: u64,
}

/// Values the share form starts with
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TunnelDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloudflare_tunnel_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_key_path: Option<String>,
}

// Default value functions
fn default_socket_path() -> PathBuf {
    PathBuf::from("/tmp/localdomain.sock")
}

fn default_request_timeout() -> u64 {
    30
}

fn default_interactive_timeout() -> u64 {
    600
}

fn default_min_visible() -> u64 {
    500
}

fn default_finish_anim() -> u64 {
    180
}

fn default_creep_interval() -> u64 {
    120
}

fn default_toggle_settle() -> u64 {
    220
}

fn default_poll_interval() -> u64 {
    3000
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            request_timeout_secs: default_request_timeout(),
            interactive_timeout_secs: default_interactive_timeout(),
        }
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            min_visible_ms: default_min_visible(),
            finish_anim_ms: default_finish_anim(),
            creep_interval_ms: default_creep_interval(),
            toggle_settle_ms: default_toggle_settle(),
        }
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval(),
        }
    }
}

impl DaemonConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn interactive_timeout(&self) -> Duration {
        Duration::from_secs(self.interactive_timeout_secs)
    }
}

impl ProgressConfig {
    pub fn min_visible(&self) -> Duration {
        Duration::from_millis(self.min_visible_ms)
    }

    pub fn finish_anim(&self) -> Duration {
        Duration::from_millis(self.finish_anim_ms)
    }

    /// Creep tick period, never zero
    pub fn creep_interval(&self) -> Duration {
        Duration::from_millis(self.creep_interval_ms.max(1))
    }

    pub fn toggle_settle(&self) -> Duration {
        Duration::from_millis(self.toggle_settle_ms)
    }
}

impl PollerConfig {
    /// Poll period, never zero
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }
}

impl ClientConfig {
    /// Reject settings that would stall timers or fail every call
    pub fn validate(&self) -> Result<()> {
        if self.daemon.socket_path.as_os_str().is_empty() {
            return Err(Error::Config("socket_path cannot be empty".to_string()));
        }
        if self.daemon.request_timeout_secs == 0 || self.daemon.interactive_timeout_secs == 0 {
            return Err(Error::Config(
                "Daemon timeouts must be greater than 0".to_string(),
            ));
        }
        if self.progress.creep_interval_ms == 0 {
            return Err(Error::Config(
                "creep_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.poller.interval_ms == 0 {
            return Err(Error::Config(
                "Poll interval must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Get client config file path
pub fn client_config_path() -> anyhow::Result<PathBuf> {
    let path = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
        .join("localdomain")
        .join("client.toml");

    Ok(path)
}

/// Load client configuration from the default location
pub fn load_client_config() -> anyhow::Result<ClientConfig> {
    load_client_config_from(&client_config_path()?)
}

/// Load client configuration, falling back to defaults if the file is missing
pub fn load_client_config_from(path: &Path) -> anyhow::Result<ClientConfig> {
    if !path.exists() {
        tracing::debug!("No client config at {}, using defaults", path.display());
        return Ok(ClientConfig::default());
    }

    let contents = fs::read_to_string(path).context("Failed to read client config file")?;

    let config: ClientConfig =
        toml::from_str(&contents).context("Failed to parse client config file")?;
    config.validate()?;

    Ok(config)
}

/// Save client configuration
///
/// The file can carry a tunnel token, so it is written 0600 on Unix.
pub fn save_client_config(config: &ClientConfig, path: &Path) -> anyhow::Result<()> {
    config.validate()?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    let toml_content =
        toml::to_string_pretty(config).context("Failed to serialize configuration")?;

    fs::write(path, toml_content).context("Failed to write configuration file")?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = fs::Permissions::from_mode(0o600);
        fs::set_permissions(path, permissions)
            .context("Failed to set config file permissions")?;
    }

    Ok(())
}
