// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 LocalDomain Contributors

//! Command contract between the sharing core and the host service
//!
//! Everything that touches processes, DNS, or persistent storage lives behind
//! this trait. [`crate::DaemonClient`] is the production implementation;
//! tests substitute scripted fakes.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    CloudflareLoginStatus, CloudflareSetupRequest, CloudflareSetupResult, Domain,
    EnsureCloudflaredResult, ListTunnelsResult, StartTunnelRequest, StartTunnelResult,
    TunnelPreference,
};

#[async_trait]
pub trait TunnelBackend: Send + Sync {
    /// Install cloudflared if missing. Idempotent.
    async fn ensure_cloudflared(&self) -> Result<EnsureCloudflaredResult>;

    async fn start_tunnel(&self, request: StartTunnelRequest) -> Result<StartTunnelResult>;

    async fn stop_tunnel(&self, domain_id: &str) -> Result<()>;

    async fn list_tunnels(&self) -> Result<ListTunnelsResult>;

    /// Remember the subdomain/zone used for a domain's automatic setup
    async fn save_tunnel_preference(&self, preference: TunnelPreference) -> Result<()>;

    async fn cloudflare_check_login(&self) -> Result<CloudflareLoginStatus>;

    /// Runs the interactive browser login; resolves once it completes or is abandoned.
    async fn cloudflare_login(&self) -> Result<CloudflareLoginStatus>;

    async fn cloudflare_setup_tunnel(
        &self,
        request: CloudflareSetupRequest,
    ) -> Result<CloudflareSetupResult>;

    /// Enable or disable routing for a domain, returning the updated record
    async fn toggle_domain(&self, id: &str, enabled: bool) -> Result<Domain>;
}
