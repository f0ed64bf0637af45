// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 LocalDomain Contributors

//! Automatic Cloudflare named-tunnel setup
//!
//! Drives the login check, interactive login, and tunnel provisioning
//! for the named/auto tab. The machine here is pure: the session issues the
//! backend calls and feeds their results back in with the [`AutoTicket`] it
//! got when the step began. Any reset invalidates outstanding tickets, so
//! results that arrive after the user has moved on are dropped.

use localdomain_common::{public_url_preview, CloudflareSetupRequest, Error, Result};
use serde::Serialize;
use tracing::debug;

/// Shown when the browser login finishes without credentials
pub const LOGIN_NOT_COMPLETED: &str = "Authentication was not completed. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoState {
    #[default]
    Idle,
    Checking,
    LoggingIn,
    LoggedIn,
    SettingUp,
    Error,
}

/// Proof that a result belongs to the step currently in progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoTicket(u64);

#[derive(Debug, Clone, Default)]
pub struct AutoSetup {
    state: AutoState,
    error: Option<String>,
    epoch: u64,
    pub subdomain: String,
    pub domain: String,
}

impl AutoSetup {
    /// Start idle with the subdomain/zone remembered from a previous setup
    pub fn new(subdomain: &str, domain: &str) -> Self {
        Self {
            subdomain: subdomain.to_string(),
            domain: domain.to_string(),
            ..Self::default()
        }
    }

    pub fn state(&self) -> AutoState {
        self.state
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn preview_url(&self) -> Option<String> {
        public_url_preview(self.subdomain.trim(), self.domain.trim())
    }

    /// A backend step is running
    pub fn is_working(&self) -> bool {
        matches!(
            self.state,
            AutoState::Checking | AutoState::LoggingIn | AutoState::SettingUp
        )
    }

    pub fn can_login(&self) -> bool {
        self.state == AutoState::Idle
    }

    /// Configure & Start is enabled
    pub fn can_configure(&self) -> bool {
        self.state == AutoState::LoggedIn
            && !self.subdomain.trim().is_empty()
            && !self.domain.trim().is_empty()
    }

    fn ticket(&self) -> AutoTicket {
        AutoTicket(self.epoch)
    }

    fn is_current(&self, ticket: AutoTicket, expected: AutoState) -> bool {
        let current = ticket == self.ticket() && self.state == expected;
        if !current {
            debug!(
                state = ?self.state,
                expected = ?expected,
                "Ignoring stale Cloudflare result"
            );
        }
        current
    }

    /// Back to idle, invalidating anything in flight
    pub fn reset(&mut self) {
        self.epoch += 1;
        self.state = AutoState::Idle;
        self.error = None;
    }

    /// Begin the silent login check. Only starts from idle.
    pub fn begin_check(&mut self) -> Option<AutoTicket> {
        if self.state != AutoState::Idle {
            return None;
        }
        self.state = AutoState::Checking;
        Some(self.ticket())
    }

    pub fn finish_check(&mut self, ticket: AutoTicket, logged_in: bool) {
        if self.is_current(ticket, AutoState::Checking) {
            self.state = if logged_in {
                AutoState::LoggedIn
            } else {
                AutoState::Idle
            };
        }
    }

    /// A failed check is treated as "not logged in"
    pub fn fail_check(&mut self, ticket: AutoTicket) {
        if self.is_current(ticket, AutoState::Checking) {
            self.state = AutoState::Idle;
        }
    }

    pub fn begin_login(&mut self) -> Result<AutoTicket> {
        if self.state != AutoState::Idle {
            return Err(Error::InvalidState(format!(
                "Cannot sign in while {:?}",
                self.state
            )));
        }
        self.state = AutoState::LoggingIn;
        self.error = None;
        Ok(self.ticket())
    }

    /// Apply the login outcome: `Ok(logged_in)` or the command's error text
    pub fn finish_login(&mut self, ticket: AutoTicket, outcome: std::result::Result<bool, String>) {
        if !self.is_current(ticket, AutoState::LoggingIn) {
            return;
        }
        match outcome {
            Ok(true) => self.state = AutoState::LoggedIn,
            Ok(false) => self.fail(LOGIN_NOT_COMPLETED.to_string()),
            Err(message) => self.fail(message),
        }
    }

    /// Begin provisioning. Requires a completed login and both fields.
    pub fn begin_setup(&mut self) -> Result<(AutoTicket, CloudflareSetupRequest)> {
        if self.state != AutoState::LoggedIn {
            return Err(Error::InvalidState(format!(
                "Cannot set up a tunnel while {:?}",
                self.state
            )));
        }
        let subdomain = self.subdomain.trim();
        let domain = self.domain.trim();
        if subdomain.is_empty() || domain.is_empty() {
            return Err(Error::Validation(
                "Subdomain and domain are required".to_string(),
            ));
        }
        let request = CloudflareSetupRequest {
            subdomain: subdomain.to_string(),
            domain: domain.to_string(),
        };
        self.state = AutoState::SettingUp;
        self.error = None;
        Ok((self.ticket(), request))
    }

    /// Provisioning succeeded. Stays in `SettingUp` while the tunnel starts.
    ///
    /// Returns false if the result is stale and should be discarded.
    pub fn setup_succeeded(&mut self, ticket: AutoTicket) -> bool {
        self.is_current(ticket, AutoState::SettingUp)
    }

    pub fn setup_failed(&mut self, ticket: AutoTicket, message: String) {
        if self.is_current(ticket, AutoState::SettingUp) {
            self.fail(message);
        }
    }

    /// The provisioned tunnel failed to start; the login is still valid.
    pub fn start_failed(&mut self, ticket: AutoTicket) {
        if self.is_current(ticket, AutoState::SettingUp) {
            self.state = AutoState::LoggedIn;
        }
    }

    /// Manual retry after an error
    pub fn retry(&mut self) {
        if self.state == AutoState::Error {
            self.reset();
        }
    }

    fn fail(&mut self, message: String) {
        self.state = AutoState::Error;
        self.error = Some(message);
    }
}
