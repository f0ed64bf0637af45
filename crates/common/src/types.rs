// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 LocalDomain Contributors

// Common types for LocalDomain tunnel sharing

use serde::{Deserialize, Serialize};

/// How a domain is exposed to the public internet.
///
/// Serialized with an internal `type` tag, matching what the daemon expects
/// in `start_tunnel` and reports back in `list_tunnels`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum TunnelType {
    /// Ephemeral trycloudflare.com URL, no account required
    QuickTunnel,
    /// Persistent Cloudflare tunnel bound to a custom hostname
    NamedTunnel {
        token: String,
        subdomain: String,
        cloudflare_domain: String,
        /// Contents of ~/.cloudflared/<UUID>.json (auto-provisioned tunnels only)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        credentials_json: Option<String>,
        /// Tunnel UUID (auto-provisioned tunnels only)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tunnel_uuid: Option<String>,
    },
    /// Reverse SSH port-forward to a user-owned server
    SshTunnel {
        host: String,
        #[serde(default = "default_ssh_port")]
        port: u16,
        user: String,
        /// Private key path, empty when the agent/default key is used
        #[serde(default)]
        key: String,
        remote_port: u16,
    },
}

fn default_ssh_port() -> u16 {
    22
}

/// Discriminant of [`TunnelType`] without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TunnelKind {
    Quick,
    Named,
    Ssh,
}

impl TunnelType {
    pub fn kind(&self) -> TunnelKind {
        match self {
            TunnelType::QuickTunnel => TunnelKind::Quick,
            TunnelType::NamedTunnel { .. } => TunnelKind::Named,
            TunnelType::SshTunnel { .. } => TunnelKind::Ssh,
        }
    }

    /// Whether the local cloudflared binary must be installed before starting.
    pub fn requires_cloudflared(&self) -> bool {
        match self {
            TunnelType::NamedTunnel { .. } => true,
            TunnelType::QuickTunnel | TunnelType::SshTunnel { .. } => false,
        }
    }
}

impl TunnelKind {
    /// Short label for badges and logs
    pub fn label(&self) -> &'static str {
        match self {
            TunnelKind::Quick => "Quick Tunnel",
            TunnelKind::Named => "Named Tunnel",
            TunnelKind::Ssh => "SSH Tunnel",
        }
    }
}

/// Configured local domain (owned by the backend, referenced here)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Domain {
    pub id: String,
    pub name: String,
    #[serde(default = "default_target_host")]
    pub target_host: String,
    /// Proxied port; 0 for hosts-only domains
    #[serde(default)]
    pub target_port: u16,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Subdomain chosen during the last automatic Cloudflare setup
    #[serde(default)]
    pub tunnel_subdomain: String,
    /// Zone chosen during the last automatic Cloudflare setup
    #[serde(default)]
    pub tunnel_domain: String,
}

fn default_target_host() -> String {
    "127.0.0.1".to_string()
}

fn default_enabled() -> bool {
    true
}

/// Derived tunnel state for one domain, rebuilt on every poll
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TunnelStatusResult {
    pub active: bool,
    #[serde(default)]
    pub public_url: Option<String>,
    #[serde(default)]
    pub tunnel_type: Option<TunnelType>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Running tunnel as reported by the daemon
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TunnelInfo {
    /// Name of the local domain this tunnel serves
    pub domain: String,
    pub public_url: String,
    pub tunnel_type: TunnelType,
    pub pid: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ListTunnelsResult {
    pub tunnels: Vec<TunnelInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StartTunnelRequest {
    pub domain_id: String,
    pub tunnel_type: TunnelType,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StartTunnelResult {
    pub public_url: String,
    pub tunnel_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StopTunnelRequest {
    pub domain_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnsureCloudflaredResult {
    pub installed: bool,
    pub path: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// Subdomain/zone remembered against a domain for the next share
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TunnelPreference {
    pub domain_id: String,
    pub subdomain: String,
    pub domain: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CloudflareLoginStatus {
    pub logged_in: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CloudflareSetupRequest {
    pub subdomain: String,
    pub domain: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CloudflareSetupResult {
    pub tunnel_name: String,
    pub tunnel_id: String,
    pub token: String,
    pub credentials_json: String,
    pub public_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToggleDomainRequest {
    pub id: String,
    pub enabled: bool,
}

/// Public URL a named tunnel will serve, e.g. `https://app.example.com`
pub fn public_url_preview(subdomain: &str, domain: &str) -> Option<String> {
    if subdomain.is_empty() || domain.is_empty() {
        return None;
    }
    Some(format!("https://{}.{}", subdomain, domain))
}
