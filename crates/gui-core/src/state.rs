// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 LocalDomain Contributors

//! Framework-agnostic application state
//!
//! [`AppCore`] wires the shared pieces together: one backend, one global
//! indicator, the per-row toggle bars, the status poller, and the domain
//! list. UI shells hold a single `AppCore` and open a [`ShareSession`] for
//! each share dialog.

use std::collections::HashMap;
use std::sync::Arc;

use localdomain_common::{
    ClientConfig, DaemonClient, Domain, Error, Result, TunnelBackend, TunnelStatusResult,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::domains::DomainList;
use crate::poller::StatusPoller;
use crate::session::{SessionContext, ShareSession};
use crate::toggle::ToggleProgress;
use crate::tracker::TaskTracker;
use crate::view_models::{create_domain_row_views, DomainRowView};

/// Core application state (framework-agnostic)
pub struct AppCore {
    config: ClientConfig,
    backend: Arc<dyn TunnelBackend>,
    tracker: TaskTracker,
    toggles: ToggleProgress,
    poller: StatusPoller,
    domains: DomainList,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl AppCore {
    /// Build the core around `backend` and start its background tasks.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(config: ClientConfig, backend: Arc<dyn TunnelBackend>) -> Result<Self> {
        config.validate()?;

        let tracker = TaskTracker::new(&config.progress);
        let toggles = ToggleProgress::new(&config.progress);
        let domains = DomainList::default();
        let poller = StatusPoller::new(
            backend.clone(),
            domains.clone(),
            tracker.clone(),
            &config.poller,
        );

        let shutdown = CancellationToken::new();
        let tasks = vec![
            tracker.spawn_driver(shutdown.child_token()),
            poller.spawn(shutdown.child_token()),
        ];
        info!(
            poll_interval_ms = config.poller.interval_ms,
            "Tunnel sharing core started"
        );

        Ok(Self {
            config,
            backend,
            tracker,
            toggles,
            poller,
            domains,
            shutdown,
            tasks,
        })
    }

    /// Start against the host service socket named in `config`
    pub fn connect(config: ClientConfig) -> Result<Self> {
        let client = DaemonClient::new(&config.daemon);
        Self::start(config, Arc::new(client))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }

    pub fn toggles(&self) -> &ToggleProgress {
        &self.toggles
    }

    pub fn poller(&self) -> &StatusPoller {
        &self.poller
    }

    pub fn domains(&self) -> &DomainList {
        &self.domains
    }

    /// Replace the domain list and refresh statuses against it
    pub fn set_domains(&self, domains: Vec<Domain>) {
        debug!("Loaded {} domains", domains.len());
        self.domains.replace(domains);
        self.poller.request_poll();
    }

    /// Open the share dialog for a domain
    pub fn open_share(&self, domain_id: &str) -> Result<ShareSession> {
        let domain = self
            .domains
            .get(domain_id)
            .ok_or_else(|| Error::Validation(format!("Unknown domain: {}", domain_id)))?;
        if domain.target_port == 0 {
            return Err(Error::Validation(format!(
                "{} has no target port to share",
                domain.name
            )));
        }

        Ok(ShareSession::open(
            domain,
            &self.config.defaults,
            SessionContext {
                backend: self.backend.clone(),
                tracker: self.tracker.clone(),
                poller: self.poller.clone(),
                domains: self.domains.clone(),
            },
        ))
    }

    pub async fn stop_tunnel(&self, domain_id: &str) -> Result<()> {
        self.poller.stop_tunnel(domain_id).await
    }

    /// Enable or disable a domain with a per-row progress bar.
    ///
    /// Returns `None` if a toggle for this domain is already running.
    pub fn toggle_domain(&self, domain_id: &str, enabled: bool) -> Option<JoinHandle<Result<Domain>>> {
        let backend = self.backend.clone();
        let tracker = self.tracker.clone();
        let domains = self.domains.clone();
        let id = domain_id.to_string();

        self.toggles.run(domain_id, move || async move {
            let updated = tracker.track(backend.toggle_domain(&id, enabled)).await?;
            info!(domain = %updated.name, enabled, "Domain toggled");
            domains.upsert(updated.clone());
            Ok(updated)
        })
    }

    pub fn statuses(&self) -> HashMap<String, TunnelStatusResult> {
        self.poller.statuses()
    }

    /// Rows for the domain list, combining statuses and toggle bars
    pub fn domain_rows(&self) -> Vec<DomainRowView> {
        create_domain_row_views(
            &self.domains.snapshot(),
            &self.poller.statuses(),
            &self.toggles.snapshot(),
        )
    }

    /// Stop background tasks and wait for them to exit
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                debug!("Background task ended abnormally: {}", e);
            }
        }
        info!("Tunnel sharing core stopped");
    }
}

impl Drop for AppCore {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{domain, settle, tunnel, Call, FakeBackend};
    use crate::form::TunnelTab;
    use localdomain_common::{TunnelDefaults, TunnelType};
    use std::time::Duration;

    fn core_with(backend: Arc<FakeBackend>, domains: Vec<Domain>) -> AppCore {
        let core = AppCore::start(ClientConfig::default(), backend).unwrap();
        core.set_domains(domains);
        core
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let mut config = ClientConfig::default();
        config.poller.interval_ms = 0;
        assert!(matches!(
            AppCore::start(config, FakeBackend::new()),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_open_share_validates_domain() {
        let core = core_with(
            FakeBackend::new(),
            vec![domain("1", "app.test", 3000), domain("2", "hosts.test", 0)],
        );

        assert!(core.open_share("1").is_ok());
        assert!(matches!(core.open_share("2"), Err(Error::Validation(_))));
        assert!(matches!(core.open_share("nope"), Err(Error::Validation(_))));
        core.shutdown().await;
    }

    #[tokio::test]
    async fn test_open_share_uses_config_defaults() {
        let backend = FakeBackend::new();
        let config = ClientConfig {
            defaults: TunnelDefaults {
                ssh_user: Some("deploy".to_string()),
                ..TunnelDefaults::default()
            },
            ..ClientConfig::default()
        };
        let core = AppCore::start(config, backend).unwrap();
        core.set_domains(vec![domain("1", "app.test", 3000)]);

        let session = core.open_share("1").unwrap();
        session.select_tab(TunnelTab::Ssh);
        assert_eq!(session.state().form.ssh.user, "deploy");
        core.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_domain_updates_list() {
        let backend = FakeBackend::with_domains(vec![domain("1", "app.test", 3000)]);
        let core = core_with(backend.clone(), vec![domain("1", "app.test", 3000)]);

        let first = core.toggle_domain("1", false).unwrap();
        assert!(core.toggle_domain("1", true).is_none());
        assert!(core.domain_rows()[0].is_toggling);

        let updated = first.await.unwrap().unwrap();
        assert!(!updated.enabled);
        assert!(!core.domains().get("1").unwrap().enabled);
        assert_eq!(backend.count(&Call::ToggleDomain("1".to_string(), false)), 1);
        assert_eq!(backend.count(&Call::ToggleDomain("1".to_string(), true)), 0);
        assert_eq!(core.toggles().progress("1"), None);
        core.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_toggle_leaves_record() {
        let backend = FakeBackend::new();
        let core = core_with(backend.clone(), vec![domain("1", "app.test", 3000)]);

        let result = core.toggle_domain("1", false).unwrap().await.unwrap();

        assert!(result.is_err());
        assert!(core.domains().get("1").unwrap().enabled);
        core.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_poll_reflects_tunnels() {
        let backend = FakeBackend::new();
        FakeBackend::set(
            &backend.tunnels,
            Ok(vec![tunnel("app.test", "https://a.trycloudflare.com", TunnelType::QuickTunnel)]),
        );
        let core = core_with(backend.clone(), vec![domain("1", "app.test", 3000)]);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(core.statuses()["1"].active);
        assert!(core.domain_rows()[0].can_stop);

        FakeBackend::set(&backend.tunnels, Ok(Vec::new()));
        core.stop_tunnel("1").await.unwrap();
        assert!(core.statuses().get("1").is_none());
        assert_eq!(backend.count(&Call::StopTunnel("1".to_string())), 1);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(core.statuses().is_empty());
        core.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_background_tasks() {
        let backend = FakeBackend::new();
        let core = core_with(backend.clone(), Vec::new());
        settle().await;
        core.shutdown().await;

        let polls = backend.count(&Call::ListTunnels);
        settle().await;
        assert_eq!(backend.count(&Call::ListTunnels), polls);
    }
}
