// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 LocalDomain Contributors

//! View models - Data structures prepared for UI display

use std::collections::HashMap;

use localdomain_common::{Domain, TunnelStatusResult};
use serde::Serialize;

use crate::auto_setup::AutoState;
use crate::form::{NamedMode, TunnelTab};
use crate::progress::COMPLETE_PROGRESS;
use crate::session::ModalState;

/// Domain list row prepared for UI display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainRowView {
    pub id: String,
    pub name: String,
    pub target: String,
    pub enabled: bool,
    pub tunnel_active: bool,
    pub public_url: Option<String>,
    /// Public URL without the scheme, for the compact pill
    pub public_url_short: Option<String>,
    pub tunnel_label: Option<&'static str>,
    /// Toggle bar value while a toggle is in flight or settling
    pub toggle_progress: Option<f32>,
    pub is_toggling: bool,
    pub can_share: bool,
    pub can_stop: bool,
}

impl DomainRowView {
    pub fn from_domain(
        domain: &Domain,
        status: Option<&TunnelStatusResult>,
        toggle_progress: Option<f32>,
    ) -> Self {
        let public_url = status.and_then(|s| s.public_url.clone());
        let tunnel_active = status.map(|s| s.active).unwrap_or(false) && public_url.is_some();
        let public_url_short = public_url.as_deref().map(strip_scheme);
        let tunnel_label = status
            .and_then(|s| s.tunnel_type.as_ref())
            .map(|t| t.kind().label());

        Self {
            id: domain.id.clone(),
            name: domain.name.clone(),
            target: Self::format_target(domain),
            enabled: domain.enabled,
            tunnel_active,
            public_url,
            public_url_short,
            tunnel_label,
            toggle_progress,
            is_toggling: toggle_progress
                .map(|p| p < COMPLETE_PROGRESS)
                .unwrap_or(false),
            can_share: domain.target_port > 0 && !tunnel_active,
            can_stop: tunnel_active,
        }
    }

    fn format_target(domain: &Domain) -> String {
        if domain.target_port == 0 {
            "hosts only".to_string()
        } else {
            format!("{}:{}", domain.target_host, domain.target_port)
        }
    }
}

fn strip_scheme(url: &str) -> String {
    url.trim_start_matches("https://")
        .trim_start_matches("http://")
        .to_string()
}

/// Create row views for all domains with current statuses and toggle bars
pub fn create_domain_row_views(
    domains: &[Domain],
    statuses: &HashMap<String, TunnelStatusResult>,
    toggles: &HashMap<String, f32>,
) -> Vec<DomainRowView> {
    domains
        .iter()
        .map(|domain| {
            DomainRowView::from_domain(
                domain,
                statuses.get(&domain.id),
                toggles.get(&domain.id).copied(),
            )
        })
        .collect()
}

/// Share modal prepared for UI display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShareView {
    pub open: bool,
    pub tab: TunnelTab,
    pub named_mode: NamedMode,
    pub can_start: bool,
    pub starting: bool,
    pub error: Option<String>,
    pub missing_fields: Vec<&'static str>,
    pub manual_preview_url: Option<String>,
    pub auto_state: AutoState,
    pub auto_error: Option<String>,
    pub auto_preview_url: Option<String>,
    pub auto_working: bool,
    pub can_login: bool,
    pub can_configure: bool,
}

impl ShareView {
    pub fn from_state(state: &ModalState) -> Self {
        let form = &state.form;
        let auto = &state.auto;
        let auto_mode = form.is_auto_mode();
        let busy = state.starting || auto.is_working();

        Self {
            open: state.open,
            tab: form.tab(),
            named_mode: form.named_mode(),
            can_start: form.can_start() && !busy,
            starting: state.starting,
            error: state.error.clone(),
            missing_fields: form.missing_fields(),
            manual_preview_url: form.manual.preview_url(),
            auto_state: auto.state(),
            auto_error: auto.error().map(str::to_string),
            auto_preview_url: auto.preview_url(),
            auto_working: auto.is_working(),
            can_login: auto_mode && auto.can_login(),
            can_configure: auto_mode && auto.can_configure() && !state.starting,
        }
    }
}
