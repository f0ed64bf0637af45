// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 LocalDomain Contributors

//! One share modal: configure and start a tunnel for a single domain
//!
//! A session owns the form, the automatic Cloudflare flow, and the modal's
//! error/open flags. Backend calls are issued from here, wrapped in the
//! global tracker, and their results are written back only if the session
//! is still in the state that issued them.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use localdomain_common::{
    CloudflareSetupRequest, Domain, Error, Result, StartTunnelRequest, StartTunnelResult,
    TunnelBackend, TunnelDefaults, TunnelPreference, TunnelType,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auto_setup::{AutoSetup, AutoState, AutoTicket};
use crate::domains::DomainList;
use crate::form::{ManualNamedForm, NamedMode, SshForm, TunnelForm, TunnelTab};
use crate::poller::StatusPoller;
use crate::tracker::TaskTracker;
use crate::view_models::ShareView;

/// Shared services a session issues work through
#[derive(Clone)]
pub struct SessionContext {
    pub backend: Arc<dyn TunnelBackend>,
    pub tracker: TaskTracker,
    pub poller: StatusPoller,
    pub domains: DomainList,
}

/// Everything the share modal renders from
#[derive(Debug, Clone)]
pub struct ModalState {
    pub form: TunnelForm,
    pub auto: AutoSetup,
    /// Error from the last start attempt
    pub error: Option<String>,
    /// A start is in flight
    pub starting: bool,
    pub open: bool,
    /// Set once a tunnel has started from this session
    pub started: Option<StartTunnelResult>,
}

impl ModalState {
    pub fn view(&self) -> ShareView {
        ShareView::from_state(self)
    }
}

struct SessionShared {
    id: Uuid,
    domain: Domain,
    ctx: SessionContext,
    state: Mutex<ModalState>,
    changes: watch::Sender<ModalState>,
}

#[derive(Clone)]
pub struct ShareSession {
    shared: Arc<SessionShared>,
}

impl ShareSession {
    /// Open a session for `domain`, prefilled from saved defaults and the
    /// domain's remembered Cloudflare target.
    pub fn open(domain: Domain, defaults: &TunnelDefaults, ctx: SessionContext) -> Self {
        let state = ModalState {
            form: TunnelForm::with_defaults(defaults),
            auto: AutoSetup::new(&domain.tunnel_subdomain, &domain.tunnel_domain),
            error: None,
            starting: false,
            open: true,
            started: None,
        };
        let (changes, _) = watch::channel(state.clone());
        let id = Uuid::new_v4();
        debug!(session = %id, domain = %domain.name, "Share session opened");
        Self {
            shared: Arc::new(SessionShared {
                id,
                domain,
                ctx,
                state: Mutex::new(state),
                changes,
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    pub fn domain(&self) -> &Domain {
        &self.shared.domain
    }

    fn lock(&self) -> MutexGuard<'_, ModalState> {
        self.shared.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> ModalState {
        self.lock().clone()
    }

    pub fn view(&self) -> ShareView {
        self.lock().view()
    }

    /// Receive a copy of the state after every change
    pub fn subscribe(&self) -> watch::Receiver<ModalState> {
        self.shared.changes.subscribe()
    }

    pub fn is_open(&self) -> bool {
        self.lock().open
    }

    /// Mutate the state and publish the result
    fn update<R>(&self, f: impl FnOnce(&mut ModalState) -> R) -> R {
        let mut state = self.lock();
        let out = f(&mut state);
        self.shared.changes.send_replace(state.clone());
        out
    }

    /// Like [`update`](Self::update) but only for an open modal
    fn update_open<R>(&self, f: impl FnOnce(&mut ModalState) -> Result<R>) -> Result<R> {
        self.update(|state| {
            if !state.open {
                return Err(Error::InvalidState("Share dialog is closed".to_string()));
            }
            f(state)
        })
    }

    // Form editing

    /// Switch tunnel kind. Returns the login-check task when entering
    /// automatic named mode from idle.
    pub fn select_tab(&self, tab: TunnelTab) -> Option<JoinHandle<()>> {
        self.change_mode(|form| form.set_tab(tab))
    }

    pub fn select_named_mode(&self, mode: NamedMode) -> Option<JoinHandle<()>> {
        self.change_mode(|form| form.set_named_mode(mode))
    }

    fn change_mode(&self, apply: impl FnOnce(&mut TunnelForm)) -> Option<JoinHandle<()>> {
        let ticket = self.update(|state| {
            if !state.open {
                return None;
            }
            let was_auto = state.form.is_auto_mode();
            apply(&mut state.form);
            let now_auto = state.form.is_auto_mode();

            if was_auto && !now_auto {
                state.auto.reset();
            }
            if now_auto && !was_auto {
                state.auto.begin_check()
            } else {
                None
            }
        })?;
        Some(self.spawn_login_check(ticket))
    }

    pub fn update_manual(&self, f: impl FnOnce(&mut ManualNamedForm)) {
        self.update(|state| f(&mut state.form.manual));
    }

    pub fn update_ssh(&self, f: impl FnOnce(&mut SshForm)) {
        self.update(|state| f(&mut state.form.ssh));
    }

    pub fn set_auto_subdomain(&self, subdomain: &str) {
        self.update(|state| state.auto.subdomain = subdomain.to_string());
    }

    pub fn set_auto_domain(&self, domain: &str) {
        self.update(|state| state.auto.domain = domain.to_string());
    }

    // Cloudflare flow

    fn spawn_login_check(&self, ticket: AutoTicket) -> JoinHandle<()> {
        let session = self.clone();
        tokio::spawn(async move {
            let result = session.shared.ctx.backend.cloudflare_check_login().await;
            session.update(|state| match result {
                Ok(status) => state.auto.finish_check(ticket, status.logged_in),
                Err(e) => {
                    debug!(session = %session.shared.id, "Cloudflare login check failed: {}", e);
                    state.auto.fail_check(ticket);
                }
            });
        })
    }

    /// Run the interactive Cloudflare login. Only allowed from idle.
    pub async fn login(&self) -> Result<AutoState> {
        let ticket = self.update_open(|state| {
            if !state.form.is_auto_mode() {
                return Err(Error::InvalidState(
                    "Cloudflare sign-in is only available for automatic named tunnels"
                        .to_string(),
                ));
            }
            state.auto.begin_login()
        })?;
        info!(session = %self.shared.id, "Starting Cloudflare login");

        let ctx = &self.shared.ctx;
        let result = ctx.tracker.track(ctx.backend.cloudflare_login()).await;
        if let Err(e) = &result {
            warn!(session = %self.shared.id, "Cloudflare login failed: {}", e);
        }
        let outcome = result
            .map(|status| status.logged_in)
            .map_err(|e| e.user_message());
        Ok(self.update(|state| {
            state.auto.finish_login(ticket, outcome);
            state.auto.state()
        }))
    }

    pub fn retry_auto(&self) {
        self.update(|state| state.auto.retry());
    }

    /// Provision a Cloudflare tunnel for the entered subdomain/zone and
    /// start it.
    pub async fn configure_and_start(&self) -> Result<StartTunnelResult> {
        let (ticket, request) = self.update_open(|state| {
            if state.starting {
                return Err(Error::InvalidState("A tunnel is already starting".to_string()));
            }
            state.auto.begin_setup()
        })?;
        info!(
            session = %self.shared.id,
            subdomain = %request.subdomain,
            zone = %request.domain,
            "Provisioning Cloudflare tunnel"
        );

        let ctx = &self.shared.ctx;
        let setup = match ctx
            .tracker
            .track(ctx.backend.cloudflare_setup_tunnel(request.clone()))
            .await
        {
            Ok(setup) => setup,
            Err(e) => {
                warn!(session = %self.shared.id, "Cloudflare setup failed: {}", e);
                let message = e.user_message();
                self.update(|state| state.auto.setup_failed(ticket, message));
                return Err(e);
            }
        };

        let current = self.update(|state| state.open && state.auto.setup_succeeded(ticket));
        if !current {
            return Err(Error::InvalidState(
                "Share dialog changed while the tunnel was being set up".to_string(),
            ));
        }
        debug!(session = %self.shared.id, tunnel = %setup.tunnel_name, "Cloudflare tunnel provisioned");

        self.spawn_save_preference(&request);

        let tunnel = TunnelType::NamedTunnel {
            token: setup.token,
            subdomain: request.subdomain,
            cloudflare_domain: request.domain,
            credentials_json: Some(setup.credentials_json),
            tunnel_uuid: Some(setup.tunnel_id),
        };
        let result = self.start_with(tunnel).await;
        if result.is_err() {
            self.update(|state| state.auto.start_failed(ticket));
        }
        result
    }

    /// Remember the target for next time. Failures are only logged.
    fn spawn_save_preference(&self, request: &CloudflareSetupRequest) {
        let preference = TunnelPreference {
            domain_id: self.shared.domain.id.clone(),
            subdomain: request.subdomain.clone(),
            domain: request.domain.clone(),
        };
        let backend = self.shared.ctx.backend.clone();
        let domains = self.shared.ctx.domains.clone();
        let session = self.shared.id;
        tokio::spawn(async move {
            match backend.save_tunnel_preference(preference.clone()).await {
                Ok(()) => {
                    domains.record_tunnel_preference(
                        &preference.domain_id,
                        &preference.subdomain,
                        &preference.domain,
                    );
                }
                Err(e) => warn!(%session, "Failed to save tunnel preference: {}", e),
            }
        });
    }

    // Starting

    /// Start from the current form (quick, manual named, or SSH).
    ///
    /// Missing fields fail validation without reaching the backend.
    pub async fn start(&self) -> Result<StartTunnelResult> {
        let tunnel = {
            let state = self.lock();
            if !state.open {
                return Err(Error::InvalidState("Share dialog is closed".to_string()));
            }
            state.form.build_request()?
        };
        self.start_with(tunnel).await
    }

    async fn start_with(&self, tunnel: TunnelType) -> Result<StartTunnelResult> {
        self.update_open(|state| {
            if state.starting {
                return Err(Error::InvalidState("A tunnel is already starting".to_string()));
            }
            state.starting = true;
            state.error = None;
            Ok(())
        })?;
        info!(
            session = %self.shared.id,
            domain = %self.shared.domain.name,
            kind = tunnel.kind().label(),
            "Starting tunnel"
        );

        match self.launch(tunnel).await {
            Ok(started) => {
                info!(session = %self.shared.id, url = %started.public_url, "Tunnel started");
                self.update(|state| {
                    state.starting = false;
                    state.error = None;
                    state.open = false;
                    state.started = Some(started.clone());
                });
                self.shared.ctx.poller.poll_now().await;
                Ok(started)
            }
            Err(e) => {
                warn!(session = %self.shared.id, "Failed to start tunnel: {}", e);
                let message = e.user_message();
                self.update(|state| {
                    state.starting = false;
                    if state.open {
                        state.error = Some(message);
                    }
                });
                Err(e)
            }
        }
    }

    async fn launch(&self, tunnel: TunnelType) -> Result<StartTunnelResult> {
        let ctx = &self.shared.ctx;
        if tunnel.requires_cloudflared() {
            let installed = ctx.tracker.track(ctx.backend.ensure_cloudflared()).await?;
            if !installed.installed {
                return Err(Error::InvalidState(
                    "cloudflared is not installed".to_string(),
                ));
            }
        }
        let request = StartTunnelRequest {
            domain_id: self.shared.domain.id.clone(),
            tunnel_type: tunnel,
        };
        ctx.tracker.track(ctx.backend.start_tunnel(request)).await
    }

    /// Close the modal. Results still in flight are ignored.
    pub fn close(&self) {
        self.update(|state| {
            if state.open {
                state.open = false;
                state.error = None;
                state.auto.reset();
            }
        });
        debug!(session = %self.shared.id, "Share session closed");
    }
}
