// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 LocalDomain Contributors

// LocalDomain - Common Library
// Wire types, the host-service command contract and client configuration

pub mod backend;
pub mod config;
pub mod daemon_client;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod types;

pub use backend::TunnelBackend;
pub use config::{
    client_config_path, load_client_config, load_client_config_from, save_client_config,
    ClientConfig, DaemonConfig, PollerConfig, ProgressConfig, TunnelDefaults,
};
pub use daemon_client::DaemonClient;
pub use error::{Error, Result};
pub use logging::init_tracing;
pub use types::{
    public_url_preview, CloudflareLoginStatus, CloudflareSetupRequest, CloudflareSetupResult,
    Domain, EnsureCloudflaredResult, ListTunnelsResult, StartTunnelRequest, StartTunnelResult,
    TunnelInfo, TunnelKind, TunnelPreference, TunnelStatusResult, TunnelType,
};
