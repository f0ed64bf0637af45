// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 LocalDomain Contributors

// LocalDomain - Daemon Client Module
// JSON-RPC client for the host service, used by every GUI shell

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::backend::TunnelBackend;
use crate::config::DaemonConfig;
use crate::error::{Error, Result};
use crate::protocol::{methods, RpcRequest, RpcResponse};
use crate::types::{
    CloudflareLoginStatus, CloudflareSetupRequest, CloudflareSetupResult, Domain,
    EnsureCloudflaredResult, ListTunnelsResult, StartTunnelRequest, StartTunnelResult,
    StopTunnelRequest, ToggleDomainRequest, TunnelPreference,
};

/// Longest response line accepted from the host service
const MAX_RESPONSE_BYTES: u64 = 1024 * 1024;

/// Client for the host service socket
///
/// Each call opens its own connection, writes one newline-terminated request
/// and reads one response line.
pub struct DaemonClient {
    socket_path: PathBuf,
    request_timeout: Duration,
    interactive_timeout: Duration,
    next_id: AtomicU64,
}

impl DaemonClient {
    /// Create a daemon client from configuration
    pub fn new(config: &DaemonConfig) -> Self {
        Self::with_timeouts(
            config.socket_path.clone(),
            config.request_timeout(),
            config.interactive_timeout(),
        )
    }

    pub fn with_timeouts(
        socket_path: PathBuf,
        request_timeout: Duration,
        interactive_timeout: Duration,
    ) -> Self {
        Self {
            socket_path,
            request_timeout,
            interactive_timeout,
            next_id: AtomicU64::new(1),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    async fn call<P, R>(&self, method: &str, params: P, timeout: Duration) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let id = self.next_id();
        let request = RpcRequest::new(method, serde_json::to_value(params)?, id);

        tracing::trace!("-> {} (id {})", method, id);

        let response = tokio::time::timeout(timeout, self.exchange(&request))
            .await
            .map_err(|_| {
                Error::Timeout(format!(
                    "{} did not respond within {:?}",
                    method, timeout
                ))
            })??;

        if response.id != id {
            return Err(Error::Connection(format!(
                "Response id {} does not match request id {}",
                response.id, id
            )));
        }

        if let Some(error) = response.error {
            tracing::debug!("<- {} failed: {}", method, error.message);
            return Err(Error::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        Ok(serde_json::from_value(response.result.unwrap_or(Value::Null))?)
    }

    #[cfg(unix)]
    async fn exchange(&self, request: &RpcRequest) -> Result<RpcResponse> {
        use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
        use tokio::net::UnixStream;

        let stream = UnixStream::connect(&self.socket_path).await.map_err(|e| {
            Error::Connection(format!(
                "Failed to connect to daemon at {}: {}",
                self.socket_path.display(),
                e
            ))
        })?;
        let (read_half, mut write_half) = stream.into_split();

        let mut line = serde_json::to_string(request)?;
        line.push('\n');
        write_half.write_all(line.as_bytes()).await?;
        write_half.flush().await?;

        let mut reader = BufReader::new(read_half).take(MAX_RESPONSE_BYTES);
        let mut response_line = String::new();
        if reader.read_line(&mut response_line).await? == 0 {
            return Err(Error::Connection(
                "Daemon closed the connection without responding".to_string(),
            ));
        }
        if !response_line.ends_with('\n') && reader.limit() == 0 {
            return Err(Error::Connection(format!(
                "Daemon response exceeded {} bytes",
                MAX_RESPONSE_BYTES
            )));
        }

        Ok(serde_json::from_str(response_line.trim_end())?)
    }

    #[cfg(not(unix))]
    async fn exchange(&self, _request: &RpcRequest) -> Result<RpcResponse> {
        Err(Error::Connection(format!(
            "Unix socket transport is unsupported on this platform ({})",
            self.socket_path.display()
        )))
    }
}

#[async_trait]
impl TunnelBackend for DaemonClient {
    async fn ensure_cloudflared(&self) -> Result<EnsureCloudflaredResult> {
        self.call(methods::ENSURE_CLOUDFLARED, Value::Null, self.interactive_timeout)
            .await
    }

    async fn start_tunnel(&self, request: StartTunnelRequest) -> Result<StartTunnelResult> {
        self.call(methods::START_TUNNEL, request, self.request_timeout)
            .await
    }

    async fn stop_tunnel(&self, domain_id: &str) -> Result<()> {
        let params = StopTunnelRequest {
            domain_id: domain_id.to_string(),
        };
        self.call(methods::STOP_TUNNEL, params, self.request_timeout)
            .await
    }

    async fn list_tunnels(&self) -> Result<ListTunnelsResult> {
        self.call(methods::LIST_TUNNELS, Value::Null, self.request_timeout)
            .await
    }

    async fn save_tunnel_preference(&self, preference: TunnelPreference) -> Result<()> {
        self.call(methods::SAVE_TUNNEL_CONFIG, preference, self.request_timeout)
            .await
    }

    async fn cloudflare_check_login(&self) -> Result<CloudflareLoginStatus> {
        self.call(methods::CLOUDFLARE_CHECK_LOGIN, Value::Null, self.request_timeout)
            .await
    }

    async fn cloudflare_login(&self) -> Result<CloudflareLoginStatus> {
        self.call(methods::CLOUDFLARE_LOGIN, Value::Null, self.interactive_timeout)
            .await
    }

    async fn cloudflare_setup_tunnel(
        &self,
        request: CloudflareSetupRequest,
    ) -> Result<CloudflareSetupResult> {
        self.call(
            methods::CLOUDFLARE_SETUP_TUNNEL,
            request,
            self.interactive_timeout,
        )
        .await
    }

    async fn toggle_domain(&self, id: &str, enabled: bool) -> Result<Domain> {
        let params = ToggleDomainRequest {
            id: id.to_string(),
            enabled,
        };
        self.call(methods::TOGGLE_DOMAIN, params, self.request_timeout)
            .await
    }
}
