// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 LocalDomain Contributors

//! Tunnel status polling and reconciliation
//!
//! The backend reports running tunnels by domain name; the UI wants status
//! keyed by domain id. Each successful poll rebuilds the whole map, so a
//! tunnel that stopped outside this client simply drops out. Failed polls
//! keep the previous map.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use localdomain_common::{
    Domain, PollerConfig, Result, TunnelBackend, TunnelInfo, TunnelStatusResult,
};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domains::DomainList;
use crate::tracker::TaskTracker;

/// Map running tunnels onto configured domains by exact name match.
///
/// Tunnels for names that match no domain are dropped.
pub fn reconcile(
    tunnels: &[TunnelInfo],
    domains: &[Domain],
) -> HashMap<String, TunnelStatusResult> {
    let mut statuses = HashMap::new();
    for tunnel in tunnels {
        match domains.iter().find(|d| d.name == tunnel.domain) {
            Some(domain) => {
                statuses.insert(
                    domain.id.clone(),
                    TunnelStatusResult {
                        active: true,
                        public_url: Some(tunnel.public_url.clone()),
                        tunnel_type: Some(tunnel.tunnel_type.clone()),
                        error: None,
                    },
                );
            }
            None => debug!("Tunnel for unknown domain {}", tunnel.domain),
        }
    }
    statuses
}

/// Published status map plus the poll that produced it
#[derive(Debug, Clone, Default)]
struct StatusSnapshot {
    generation: u64,
    by_domain: HashMap<String, TunnelStatusResult>,
}

struct PollerShared {
    backend: Arc<dyn TunnelBackend>,
    domains: DomainList,
    tracker: TaskTracker,
    interval: Duration,
    statuses: watch::Sender<StatusSnapshot>,
    generation: AtomicU64,
    trigger: Notify,
}

#[derive(Clone)]
pub struct StatusPoller {
    shared: Arc<PollerShared>,
}

impl StatusPoller {
    pub fn new(
        backend: Arc<dyn TunnelBackend>,
        domains: DomainList,
        tracker: TaskTracker,
        config: &PollerConfig,
    ) -> Self {
        let (statuses, _) = watch::channel(StatusSnapshot::default());
        Self {
            shared: Arc::new(PollerShared {
                backend,
                domains,
                tracker,
                interval: config.interval(),
                statuses,
                generation: AtomicU64::new(0),
                trigger: Notify::new(),
            }),
        }
    }

    fn next_generation(&self) -> u64 {
        self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Run one poll now.
    ///
    /// Returns true if the result was applied. Errors are logged and leave
    /// the previous statuses in place; results older than the newest
    /// applied change are discarded.
    pub async fn poll_now(&self) -> bool {
        let generation = self.next_generation();
        let listed = match self.shared.backend.list_tunnels().await {
            Ok(listed) => listed,
            Err(e) => {
                debug!("Tunnel poll failed, keeping previous statuses: {}", e);
                return false;
            }
        };

        let fresh = reconcile(&listed.tunnels, &self.shared.domains.snapshot());
        let mut applied = false;
        self.shared.statuses.send_if_modified(|snapshot| {
            if generation <= snapshot.generation {
                return false;
            }
            applied = true;
            snapshot.generation = generation;
            if snapshot.by_domain == fresh {
                return false;
            }
            snapshot.by_domain = fresh;
            true
        });
        if !applied {
            debug!(generation, "Discarding out-of-date poll result");
        }
        applied
    }

    /// Ask the background loop for a poll without waiting for the interval
    pub fn request_poll(&self) {
        self.shared.trigger.notify_one();
    }

    /// Spawn the interval loop. The first poll runs immediately.
    pub fn spawn(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let poller = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poller.shared.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {}
                    _ = poller.shared.trigger.notified() => {}
                }
                poller.poll_now().await;
            }
            debug!("Status poller stopped");
        })
    }

    /// Stop a domain's tunnel.
    ///
    /// The entry is removed before the command is sent, and stays removed if
    /// the command fails; the next poll restores it if the tunnel is in fact
    /// still running.
    pub async fn stop_tunnel(&self, domain_id: &str) -> Result<()> {
        self.forget(domain_id);

        let result = self
            .shared
            .tracker
            .track(self.shared.backend.stop_tunnel(domain_id))
            .await;
        match &result {
            Ok(()) => info!("Stopped tunnel for domain {}", domain_id),
            Err(e) => warn!("Failed to stop tunnel for domain {}: {}", domain_id, e),
        }

        self.request_poll();
        result
    }

    /// Drop one entry and invalidate any poll already in flight
    fn forget(&self, domain_id: &str) {
        let generation = self.next_generation();
        self.shared.statuses.send_if_modified(|snapshot| {
            snapshot.generation = snapshot.generation.max(generation);
            snapshot.by_domain.remove(domain_id).is_some()
        });
    }

    pub fn statuses(&self) -> HashMap<String, TunnelStatusResult> {
        self.shared.statuses.borrow().by_domain.clone()
    }

    pub fn status(&self, domain_id: &str) -> Option<TunnelStatusResult> {
        self.shared.statuses.borrow().by_domain.get(domain_id).cloned()
    }

    pub fn is_active(&self, domain_id: &str) -> bool {
        self.status(domain_id).map(|s| s.active).unwrap_or(false)
    }

    /// Wait for the status map to change
    pub fn subscribe(&self) -> StatusReceiver {
        StatusReceiver {
            rx: self.shared.statuses.subscribe(),
        }
    }
}

/// Change notifications for the status map
pub struct StatusReceiver {
    rx: watch::Receiver<StatusSnapshot>,
}

impl StatusReceiver {
    /// Resolve with the new map after the next change; `None` once the poller is gone.
    pub async fn changed(&mut self) -> Option<HashMap<String, TunnelStatusResult>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().by_domain.clone())
    }

    pub fn current(&self) -> HashMap<String, TunnelStatusResult> {
        self.rx.borrow().by_domain.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{domain, settle, tunnel, Call, FakeBackend};
    use localdomain_common::{ProgressConfig, TunnelType};

    fn named() -> TunnelType {
        TunnelType::NamedTunnel {
            token: "t".to_string(),
            subdomain: "app".to_string(),
            cloudflare_domain: "example.com".to_string(),
            credentials_json: None,
            tunnel_uuid: None,
        }
    }

    fn poller_with(backend: Arc<FakeBackend>, domains: Vec<Domain>) -> StatusPoller {
        StatusPoller::new(
            backend,
            DomainList::new(domains),
            TaskTracker::new(&ProgressConfig::default()),
            &PollerConfig::default(),
        )
    }

    #[test]
    fn test_reconcile_matches_exact_names() {
        let domains = vec![domain("1", "app.test", 3000), domain("2", "api.test", 4000)];
        let tunnels = vec![
            tunnel("app.test", "https://a.trycloudflare.com", TunnelType::QuickTunnel),
            tunnel("API.test", "https://b.trycloudflare.com", TunnelType::QuickTunnel),
            tunnel("ghost.test", "https://c.trycloudflare.com", TunnelType::QuickTunnel),
        ];

        let statuses = reconcile(&tunnels, &domains);

        assert_eq!(statuses.len(), 1);
        let status = &statuses["1"];
        assert!(status.active);
        assert_eq!(status.public_url.as_deref(), Some("https://a.trycloudflare.com"));
        assert_eq!(status.tunnel_type, Some(TunnelType::QuickTunnel));
    }

    #[tokio::test]
    async fn test_poll_replaces_map_wholesale() {
        let backend = FakeBackend::new();
        let poller = poller_with(
            backend.clone(),
            vec![domain("1", "app.test", 3000), domain("2", "api.test", 4000)],
        );

        FakeBackend::set(
            &backend.tunnels,
            Ok(vec![
                tunnel("app.test", "https://a.example.com", named()),
                tunnel("api.test", "https://b.trycloudflare.com", TunnelType::QuickTunnel),
            ]),
        );
        assert!(poller.poll_now().await);
        assert_eq!(poller.statuses().len(), 2);

        FakeBackend::set(
            &backend.tunnels,
            Ok(vec![tunnel("api.test", "https://b.trycloudflare.com", TunnelType::QuickTunnel)]),
        );
        assert!(poller.poll_now().await);
        assert!(!poller.is_active("1"));
        assert!(poller.is_active("2"));
    }

    #[tokio::test]
    async fn test_poll_error_keeps_previous_statuses() {
        let backend = FakeBackend::new();
        let poller = poller_with(backend.clone(), vec![domain("1", "app.test", 3000)]);
        FakeBackend::set(
            &backend.tunnels,
            Ok(vec![tunnel("app.test", "https://a.trycloudflare.com", TunnelType::QuickTunnel)]),
        );
        poller.poll_now().await;

        FakeBackend::set(&backend.tunnels, Err("daemon restarting"));
        assert!(!poller.poll_now().await);
        assert!(poller.is_active("1"));
    }

    #[tokio::test]
    async fn test_stop_removes_entry_before_command() {
        let backend = FakeBackend::new();
        let poller = poller_with(backend.clone(), vec![domain("1", "app.test", 3000)]);
        FakeBackend::set(
            &backend.tunnels,
            Ok(vec![tunnel("app.test", "https://a.trycloudflare.com", TunnelType::QuickTunnel)]),
        );
        poller.poll_now().await;

        let gate = backend.hold("stop_tunnel");
        let stopping = {
            let poller = poller.clone();
            tokio::spawn(async move { poller.stop_tunnel("1").await })
        };
        settle().await;

        assert_eq!(backend.count(&Call::StopTunnel("1".to_string())), 1);
        assert!(poller.status("1").is_none());

        gate.notify_one();
        stopping.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_failed_stop_does_not_restore_entry() {
        let backend = FakeBackend::new();
        let poller = poller_with(backend.clone(), vec![domain("1", "app.test", 3000)]);
        FakeBackend::set(
            &backend.tunnels,
            Ok(vec![tunnel("app.test", "https://a.trycloudflare.com", TunnelType::QuickTunnel)]),
        );
        poller.poll_now().await;
        FakeBackend::set(&backend.stop, Err("no such tunnel"));

        let result = poller.stop_tunnel("1").await;

        assert_eq!(result.unwrap_err().user_message(), "no such tunnel");
        assert!(poller.status("1").is_none());
    }

    #[tokio::test]
    async fn test_poll_started_before_stop_is_discarded() {
        let backend = FakeBackend::new();
        let poller = poller_with(backend.clone(), vec![domain("1", "app.test", 3000)]);
        FakeBackend::set(
            &backend.tunnels,
            Ok(vec![tunnel("app.test", "https://a.trycloudflare.com", TunnelType::QuickTunnel)]),
        );
        poller.poll_now().await;

        let gate = backend.hold("list_tunnels");
        let polling = {
            let poller = poller.clone();
            tokio::spawn(async move { poller.poll_now().await })
        };
        settle().await;

        poller.forget("1");
        gate.notify_one();
        assert!(!polling.await.unwrap());
        assert!(poller.status("1").is_none());
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let backend = FakeBackend::new();
        let poller = poller_with(backend.clone(), vec![domain("1", "app.test", 3000)]);
        let mut rx = poller.subscribe();
        FakeBackend::set(
            &backend.tunnels,
            Ok(vec![tunnel("app.test", "https://a.trycloudflare.com", TunnelType::QuickTunnel)]),
        );

        poller.poll_now().await;
        let seen = rx.changed().await.unwrap();
        assert!(seen["1"].active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_polls_immediately_and_on_interval() {
        let backend = FakeBackend::new();
        let poller = poller_with(backend.clone(), Vec::new());
        let shutdown = CancellationToken::new();
        let handle = poller.spawn(shutdown.clone());

        settle().await;
        assert_eq!(backend.count(&Call::ListTunnels), 1);

        tokio::time::sleep(Duration::from_millis(3_001)).await;
        assert_eq!(backend.count(&Call::ListTunnels), 2);

        poller.request_poll();
        settle().await;
        assert_eq!(backend.count(&Call::ListTunnels), 3);

        shutdown.cancel();
        handle.await.unwrap();
    }
}
