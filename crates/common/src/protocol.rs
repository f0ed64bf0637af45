// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 LocalDomain Contributors

//! JSON-RPC 2.0 envelope spoken with the LocalDomain host service

use serde::{Deserialize, Serialize};

/// Method names understood by the host service
pub mod methods {
    pub const ENSURE_CLOUDFLARED: &str = "ensure_cloudflared";
    pub const START_TUNNEL: &str = "start_tunnel";
    pub const STOP_TUNNEL: &str = "stop_tunnel";
    pub const LIST_TUNNELS: &str = "list_tunnels";
    pub const SAVE_TUNNEL_CONFIG: &str = "save_tunnel_config";
    pub const CLOUDFLARE_CHECK_LOGIN: &str = "cloudflare_check_login";
    pub const CLOUDFLARE_LOGIN: &str = "cloudflare_login";
    pub const CLOUDFLARE_SETUP_TUNNEL: &str = "cloudflare_setup_tunnel";
    pub const TOGGLE_DOMAIN: &str = "toggle_domain";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    pub id: u64,
}

impl RpcRequest {
    pub fn new(method: &str, params: serde_json::Value, id: u64) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: u64,
}

impl RpcResponse {
    pub fn success(id: u64, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn failure(id: u64, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
                data: None,
            }),
            id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

pub const INTERNAL_ERROR: i32 = -32603;
