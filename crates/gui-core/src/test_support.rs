// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 LocalDomain Contributors

// Scripted backend for unit tests

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use localdomain_common::protocol::INTERNAL_ERROR;
use localdomain_common::{
    CloudflareLoginStatus, CloudflareSetupRequest, CloudflareSetupResult, Domain,
    EnsureCloudflaredResult, Error, ListTunnelsResult, Result, StartTunnelRequest,
    StartTunnelResult, TunnelBackend, TunnelInfo, TunnelPreference, TunnelType,
};
use tokio::sync::Notify;

pub fn domain(id: &str, name: &str, port: u16) -> Domain {
    Domain {
        id: id.to_string(),
        name: name.to_string(),
        target_host: "127.0.0.1".to_string(),
        target_port: port,
        enabled: true,
        tunnel_subdomain: String::new(),
        tunnel_domain: String::new(),
    }
}

pub fn tunnel(domain: &str, url: &str, tunnel_type: TunnelType) -> TunnelInfo {
    TunnelInfo {
        domain: domain.to_string(),
        public_url: url.to_string(),
        tunnel_type,
        pid: 4242,
    }
}

pub fn rpc_error(message: &str) -> Error {
    Error::Rpc {
        code: INTERNAL_ERROR,
        message: message.to_string(),
    }
}

/// Let spawned tasks on the current-thread runtime run to their next await.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    EnsureCloudflared,
    StartTunnel(StartTunnelRequest),
    StopTunnel(String),
    ListTunnels,
    SaveTunnelPreference(TunnelPreference),
    CheckLogin,
    Login,
    SetupTunnel(CloudflareSetupRequest),
    ToggleDomain(String, bool),
}

type Scripted<T> = Mutex<std::result::Result<T, String>>;

/// In-memory [`TunnelBackend`] with canned responses.
///
/// Every call is recorded. Responses default to success and can be
/// replaced per method; `hold` parks a method until the returned
/// [`Notify`] is signalled.
pub struct FakeBackend {
    calls: Mutex<Vec<Call>>,
    holds: Mutex<HashMap<&'static str, Arc<Notify>>>,
    pub check_login: Scripted<bool>,
    pub login: Scripted<bool>,
    pub setup: Scripted<CloudflareSetupResult>,
    pub ensure: Scripted<EnsureCloudflaredResult>,
    pub start: Scripted<StartTunnelResult>,
    pub stop: Scripted<()>,
    pub tunnels: Scripted<Vec<TunnelInfo>>,
    pub save_preference: Scripted<()>,
    pub domains: Mutex<Vec<Domain>>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            holds: Mutex::new(HashMap::new()),
            check_login: Mutex::new(Ok(false)),
            login: Mutex::new(Ok(true)),
            setup: Mutex::new(Ok(CloudflareSetupResult {
                tunnel_name: "localdomain-app".to_string(),
                tunnel_id: "6f1c0d2e-uuid".to_string(),
                token: "setup-token".to_string(),
                credentials_json: "{\"TunnelSecret\":\"s3cr3t\"}".to_string(),
                public_url: "https://app.example.com".to_string(),
            })),
            ensure: Mutex::new(Ok(EnsureCloudflaredResult {
                installed: true,
                path: "/usr/local/bin/cloudflared".to_string(),
                version: Some("2025.1.0".to_string()),
            })),
            start: Mutex::new(Ok(StartTunnelResult {
                public_url: "https://random-words.trycloudflare.com".to_string(),
                tunnel_id: "tunnel-1".to_string(),
            })),
            stop: Mutex::new(Ok(())),
            tunnels: Mutex::new(Ok(Vec::new())),
            save_preference: Mutex::new(Ok(())),
            domains: Mutex::new(Vec::new()),
        }
    }
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_domains(domains: Vec<Domain>) -> Arc<Self> {
        let backend = Self::default();
        *backend.domains.lock().unwrap() = domains;
        Arc::new(backend)
    }

    pub fn set<T>(slot: &Scripted<T>, value: std::result::Result<T, &str>) {
        *slot.lock().unwrap() = value.map_err(str::to_string);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls other than the background `list_tunnels` polls
    pub fn commands(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| *c != Call::ListTunnels)
            .collect()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    /// Park `method` until the returned notify fires
    pub fn hold(&self, method: &'static str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.holds.lock().unwrap().insert(method, gate.clone());
        gate
    }

    async fn enter(&self, method: &'static str, call: Call) {
        self.calls.lock().unwrap().push(call);
        let gate = self.holds.lock().unwrap().get(method).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }

    fn respond<T: Clone>(slot: &Scripted<T>) -> Result<T> {
        slot.lock().unwrap().clone().map_err(|msg| rpc_error(&msg))
    }
}

#[async_trait]
impl TunnelBackend for FakeBackend {
    async fn ensure_cloudflared(&self) -> Result<EnsureCloudflaredResult> {
        self.enter("ensure_cloudflared", Call::EnsureCloudflared).await;
        Self::respond(&self.ensure)
    }

    async fn start_tunnel(&self, request: StartTunnelRequest) -> Result<StartTunnelResult> {
        self.enter("start_tunnel", Call::StartTunnel(request)).await;
        Self::respond(&self.start)
    }

    async fn stop_tunnel(&self, domain_id: &str) -> Result<()> {
        self.enter("stop_tunnel", Call::StopTunnel(domain_id.to_string()))
            .await;
        Self::respond(&self.stop)
    }

    async fn list_tunnels(&self) -> Result<ListTunnelsResult> {
        self.enter("list_tunnels", Call::ListTunnels).await;
        Self::respond(&self.tunnels).map(|tunnels| ListTunnelsResult { tunnels })
    }

    async fn save_tunnel_preference(&self, preference: TunnelPreference) -> Result<()> {
        self.enter(
            "save_tunnel_preference",
            Call::SaveTunnelPreference(preference),
        )
        .await;
        Self::respond(&self.save_preference)
    }

    async fn cloudflare_check_login(&self) -> Result<CloudflareLoginStatus> {
        self.enter("cloudflare_check_login", Call::CheckLogin).await;
        Self::respond(&self.check_login).map(|logged_in| CloudflareLoginStatus { logged_in })
    }

    async fn cloudflare_login(&self) -> Result<CloudflareLoginStatus> {
        self.enter("cloudflare_login", Call::Login).await;
        Self::respond(&self.login).map(|logged_in| CloudflareLoginStatus { logged_in })
    }

    async fn cloudflare_setup_tunnel(
        &self,
        request: CloudflareSetupRequest,
    ) -> Result<CloudflareSetupResult> {
        self.enter("cloudflare_setup_tunnel", Call::SetupTunnel(request))
            .await;
        Self::respond(&self.setup)
    }

    async fn toggle_domain(&self, id: &str, enabled: bool) -> Result<Domain> {
        self.enter("toggle_domain", Call::ToggleDomain(id.to_string(), enabled))
            .await;
        let mut domains = self.domains.lock().unwrap();
        let domain = domains
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| rpc_error(&format!("Domain not found: {}", id)))?;
        domain.enabled = enabled;
        Ok(domain.clone())
    }
}
