// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 LocalDomain Contributors

//! Share form: tunnel kind selection, per-kind fields, readiness checks

use std::fmt;

use localdomain_common::{public_url_preview, Error, Result, TunnelDefaults, TunnelType};
use serde::Serialize;
use zeroize::Zeroizing;

/// Which kind of tunnel the form is configuring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TunnelTab {
    #[default]
    Quick,
    Named,
    Ssh,
}

/// Named tunnels are either provisioned automatically or entered by hand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NamedMode {
    #[default]
    Auto,
    Manual,
}

/// Hand-entered named tunnel details
#[derive(Clone, Default)]
pub struct ManualNamedForm {
    pub token: Zeroizing<String>,
    pub subdomain: String,
    pub domain: String,
}

impl fmt::Debug for ManualNamedForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualNamedForm")
            .field("token", &"<redacted>")
            .field("subdomain", &self.subdomain)
            .field("domain", &self.domain)
            .finish()
    }
}

impl ManualNamedForm {
    pub fn is_complete(&self) -> bool {
        filled(&self.token) && filled(&self.subdomain) && filled(&self.domain)
    }

    pub fn preview_url(&self) -> Option<String> {
        public_url_preview(self.subdomain.trim(), self.domain.trim())
    }

    fn missing_fields(&self, missing: &mut Vec<&'static str>) {
        if !filled(&self.token) {
            missing.push("token");
        }
        if !filled(&self.subdomain) {
            missing.push("subdomain");
        }
        if !filled(&self.domain) {
            missing.push("domain");
        }
    }
}

#[derive(Debug, Clone)]
pub struct SshForm {
    pub host: String,
    pub port: u16,
    pub user: String,
    /// Private key path; empty uses the SSH agent or default key
    pub key: String,
    pub remote_port: u16,
}

impl Default for SshForm {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 22,
            user: String::new(),
            key: String::new(),
            remote_port: 8080,
        }
    }
}

impl SshForm {
    pub fn is_complete(&self) -> bool {
        filled(&self.host) && filled(&self.user) && self.port > 0 && self.remote_port > 0
    }

    fn missing_fields(&self, missing: &mut Vec<&'static str>) {
        if !filled(&self.host) {
            missing.push("host");
        }
        if self.port == 0 {
            missing.push("port");
        }
        if !filled(&self.user) {
            missing.push("user");
        }
        if self.remote_port == 0 {
            missing.push("remote_port");
        }
    }
}

fn filled(value: &str) -> bool {
    !value.trim().is_empty()
}

/// Form behind the share modal.
///
/// Tab and named mode are changed through the owning session so it can run
/// the Cloudflare login check on entry; field values are edited directly.
#[derive(Debug, Clone, Default)]
pub struct TunnelForm {
    tab: TunnelTab,
    named_mode: NamedMode,
    pub manual: ManualNamedForm,
    pub ssh: SshForm,
}

impl TunnelForm {
    /// Empty form with the user's saved defaults filled in
    pub fn with_defaults(defaults: &TunnelDefaults) -> Self {
        let mut form = Self::default();
        if let Some(token) = &defaults.cloudflare_tunnel_token {
            form.manual.token = Zeroizing::new(token.clone());
        }
        if let Some(host) = &defaults.ssh_host {
            form.ssh.host = host.clone();
        }
        if let Some(user) = &defaults.ssh_user {
            form.ssh.user = user.clone();
        }
        if let Some(key) = &defaults.ssh_key_path {
            form.ssh.key = key.clone();
        }
        form
    }

    pub fn tab(&self) -> TunnelTab {
        self.tab
    }

    pub fn named_mode(&self) -> NamedMode {
        self.named_mode
    }

    pub(crate) fn set_tab(&mut self, tab: TunnelTab) {
        self.tab = tab;
    }

    pub(crate) fn set_named_mode(&mut self, mode: NamedMode) {
        self.named_mode = mode;
    }

    /// Named tab in automatic mode, where the Cloudflare flow drives starting
    pub fn is_auto_mode(&self) -> bool {
        self.tab == TunnelTab::Named && self.named_mode == NamedMode::Auto
    }

    /// Whether the generic Start action is enabled
    pub fn can_start(&self) -> bool {
        match self.tab {
            TunnelTab::Quick => true,
            TunnelTab::Named => match self.named_mode {
                NamedMode::Auto => false,
                NamedMode::Manual => self.manual.is_complete(),
            },
            TunnelTab::Ssh => self.ssh.is_complete(),
        }
    }

    /// Fields that still need a value before the current tab can start
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        match self.tab {
            TunnelTab::Quick => {}
            TunnelTab::Named => {
                if self.named_mode == NamedMode::Manual {
                    self.manual.missing_fields(&mut missing);
                }
            }
            TunnelTab::Ssh => self.ssh.missing_fields(&mut missing),
        }
        missing
    }

    /// Build the tunnel configuration for the generic Start action.
    ///
    /// Fails with a validation error when required fields are missing, and
    /// with an invalid-state error in automatic named mode, which starts
    /// through its own flow.
    pub fn build_request(&self) -> Result<TunnelType> {
        if self.is_auto_mode() {
            return Err(Error::InvalidState(
                "Automatic named tunnels start from Configure & Start".to_string(),
            ));
        }

        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(Error::Validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }

        let tunnel = match self.tab {
            TunnelTab::Quick => TunnelType::QuickTunnel,
            TunnelTab::Named => TunnelType::NamedTunnel {
                token: self.manual.token.trim().to_string(),
                subdomain: self.manual.subdomain.trim().to_string(),
                cloudflare_domain: self.manual.domain.trim().to_string(),
                credentials_json: None,
                tunnel_uuid: None,
            },
            TunnelTab::Ssh => TunnelType::SshTunnel {
                host: self.ssh.host.trim().to_string(),
                port: self.ssh.port,
                user: self.ssh.user.trim().to_string(),
                key: self.ssh.key.trim().to_string(),
                remote_port: self.ssh.remote_port,
            },
        };
        Ok(tunnel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form_on(tab: TunnelTab) -> TunnelForm {
        let mut form = TunnelForm::default();
        form.set_tab(tab);
        form
    }

    #[test]
    fn test_quick_always_ready() {
        let form = TunnelForm::default();
        assert_eq!(form.tab(), TunnelTab::Quick);
        assert!(form.can_start());
        assert_eq!(form.build_request().unwrap(), TunnelType::QuickTunnel);
    }

    #[test]
    fn test_named_defaults_to_auto_and_disables_start() {
        let form = form_on(TunnelTab::Named);
        assert_eq!(form.named_mode(), NamedMode::Auto);
        assert!(form.is_auto_mode());
        assert!(!form.can_start());
        assert!(matches!(form.build_request(), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_manual_named_requires_all_fields() {
        let mut form = form_on(TunnelTab::Named);
        form.set_named_mode(NamedMode::Manual);
        form.manual.token = Zeroizing::new("tok".to_string());
        form.manual.subdomain = "app".to_string();
        assert!(!form.can_start());
        assert_eq!(form.missing_fields(), vec!["domain"]);
        assert!(matches!(form.build_request(), Err(Error::Validation(_))));

        form.manual.domain = "example.com".to_string();
        assert!(form.can_start());
        assert_eq!(
            form.manual.preview_url().as_deref(),
            Some("https://app.example.com")
        );
        assert_eq!(
            form.build_request().unwrap(),
            TunnelType::NamedTunnel {
                token: "tok".to_string(),
                subdomain: "app".to_string(),
                cloudflare_domain: "example.com".to_string(),
                credentials_json: None,
                tunnel_uuid: None,
            }
        );
    }

    #[test]
    fn test_ssh_host_gates_start() {
        let mut form = form_on(TunnelTab::Ssh);
        form.ssh.user = "deploy".to_string();
        assert!(!form.can_start());
        assert_eq!(form.missing_fields(), vec!["host"]);

        form.ssh.host = "vps.example.com".to_string();
        assert!(form.can_start());
        assert_eq!(
            form.build_request().unwrap(),
            TunnelType::SshTunnel {
                host: "vps.example.com".to_string(),
                port: 22,
                user: "deploy".to_string(),
                key: String::new(),
                remote_port: 8080,
            }
        );
    }

    #[test]
    fn test_ssh_zero_remote_port_not_ready() {
        let mut form = form_on(TunnelTab::Ssh);
        form.ssh.host = "vps".to_string();
        form.ssh.user = "deploy".to_string();
        form.ssh.remote_port = 0;
        assert!(!form.can_start());
        assert_eq!(form.missing_fields(), vec!["remote_port"]);
    }

    #[test]
    fn test_whitespace_only_counts_as_empty() {
        let mut form = form_on(TunnelTab::Ssh);
        form.ssh.host = "   ".to_string();
        form.ssh.user = "deploy".to_string();
        assert!(!form.can_start());
    }

    #[test]
    fn test_debug_output_hides_token() {
        let manual = ManualNamedForm {
            token: Zeroizing::new("super-secret".to_string()),
            ..ManualNamedForm::default()
        };
        assert!(!format!("{:?}", manual).contains("super-secret"));
    }

    #[test]
    fn test_defaults_prefill_fields() {
        let defaults = TunnelDefaults {
            cloudflare_tunnel_token: Some("saved-token".to_string()),
            ssh_host: Some("vps.example.com".to_string()),
            ssh_user: Some("deploy".to_string()),
            ssh_key_path: Some("~/.ssh/id_ed25519".to_string()),
        };
        let form = TunnelForm::with_defaults(&defaults);

        assert_eq!(form.manual.token.as_str(), "saved-token");
        assert_eq!(form.ssh.host, "vps.example.com");
        assert_eq!(form.ssh.user, "deploy");
        assert_eq!(form.ssh.key, "~/.ssh/id_ed25519");
        assert_eq!(form.ssh.port, 22);
        assert_eq!(form.ssh.remote_port, 8080);
    }
}
