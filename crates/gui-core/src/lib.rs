// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 LocalDomain Contributors

//! Framework-agnostic tunnel sharing core for LocalDomain
//!
//! This crate holds the client-side orchestration behind the share dialog
//! and the domain list: the global progress indicator, per-row toggle bars,
//! the share form and automatic Cloudflare setup, and tunnel status polling.
//! UI shells render the view models and forward user actions; all backend
//! work goes through a [`TunnelBackend`].

pub mod auto_setup;
pub mod domains;
pub mod form;
pub mod poller;
pub mod progress;
pub mod session;
pub mod state;
pub mod toggle;
pub mod tracker;
pub mod view_models;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use auto_setup::{AutoSetup, AutoState, LOGIN_NOT_COMPLETED};
pub use domains::DomainList;
pub use form::{ManualNamedForm, NamedMode, SshForm, TunnelForm, TunnelTab};
pub use poller::{reconcile, StatusPoller, StatusReceiver};
pub use session::{ModalState, SessionContext, ShareSession};
pub use state::AppCore;
pub use toggle::ToggleProgress;
pub use tracker::{IndicatorState, TaskTracker};
pub use view_models::{create_domain_row_views, DomainRowView, ShareView};

// Re-export types from common crate for convenience
pub use localdomain_common::{
    ClientConfig, Domain, Error, Result, TunnelBackend, TunnelStatusResult, TunnelType,
};
