// crates/toolgate-gateway/src/server.rs
// ============================================================================
// Module: Gateway HTTP Server
// Description: axum routes for the proxy, tool listing, and health check.
// Purpose: Expose the gateway pipeline over HTTP with caller authentication.
// Dependencies: axum, tokio, toolgate-config, toolgate-core, tracing
// ============================================================================

//! ## Overview
//! Routes:
//! - `POST /mcp/v1/proxy/{server_label}/tools/{tool_name}`
//! - `GET /mcp/v1/tools`
//! - `GET /healthz` (unauthenticated)
//!
//! Caller authentication runs before the pipeline; a 401 is never audited.
//! Request bodies are inputs from untrusted callers and are capped at
//! `server.max_body_bytes`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::ConnectInfo;
use axum::extract::DefaultBodyLimit;
use axum::extract::Path;
use axum::extract::State;
use axum::extract::rejection::BytesRejection;
use axum::extract::rejection::PathRejection;
use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use serde::Serialize;
use thiserror::Error;
use tokio::net::TcpListener;
use toolgate_config::ServerAuthMode;
use toolgate_config::ToolgateConfig;
use toolgate_core::CircuitBreaker;
use toolgate_core::RateLimiter;

use crate::audit::audit_sink_from_config;
use crate::auth::CallerAuthz;
use crate::auth::CallerIdentity;
use crate::auth::RequestContext;
use crate::error::GatewayError;
use crate::forwarder::HttpForwarder;
use crate::gateway::Gateway;
use crate::gateway::GatewayComponents;
use crate::gateway::RateLimitPolicy;
use crate::gateway::ToolServerSummary;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Rate-limit ceiling header.
pub const RATE_LIMIT_LIMIT_HEADER: &str = "x-ratelimit-limit";
/// Rate-limit remaining header.
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";

// ============================================================================
// SECTION: Server
// ============================================================================

/// Shared state for HTTP handlers.
struct ServerState {
    /// Proxy pipeline.
    gateway: Gateway,
    /// Caller authentication.
    authz: CallerAuthz,
}

/// Gateway HTTP server.
pub struct GatewayServer {
    /// Bind address.
    bind: SocketAddr,
    /// Maximum request body size.
    max_body_bytes: usize,
    /// Handler state.
    state: Arc<ServerState>,
}

impl GatewayServer {
    /// Builds a server from prepared parts.
    #[must_use]
    pub fn new(
        bind: SocketAddr,
        gateway: Gateway,
        authz: CallerAuthz,
        max_body_bytes: usize,
    ) -> Self {
        Self {
            bind,
            max_body_bytes,
            state: Arc::new(ServerState {
                gateway,
                authz,
            }),
        }
    }

    /// Builds a server and its collaborators from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when configuration is invalid or a
    /// collaborator cannot be initialized.
    pub fn from_config(config: &ToolgateConfig) -> Result<Self, ServerError> {
        config.validate().map_err(|err| ServerError::Config(err.to_string()))?;
        let bind = config.server.bind_addr().map_err(|err| ServerError::Config(err.to_string()))?;
        let credential_key =
            config.credential_key().map_err(|err| ServerError::Config(err.to_string()))?;
        let policy = config.trust_policy().map_err(|err| ServerError::Config(err.to_string()))?;
        let forwarder = HttpForwarder::new(&config.forwarder)
            .map_err(|err| ServerError::Init(err.to_string()))?;
        let audit = audit_sink_from_config(&config.audit)
            .map_err(|err| ServerError::Init(format!("audit sink: {err}")))?;
        let gateway = Gateway::new(GatewayComponents {
            servers: Arc::new(config.server_store()),
            policy: Arc::new(policy),
            forwarder: Arc::new(forwarder),
            breaker: Arc::new(CircuitBreaker::new()),
            limiter: Arc::new(RateLimiter::new()),
            audit,
            credential_key,
            rate_limit: RateLimitPolicy {
                max_requests: config.rate_limit.max_requests,
                window: config.rate_limit.window(),
            },
        });
        let authz = CallerAuthz::from_config(&config.server.auth);
        if authz.mode() == ServerAuthMode::LocalOnly {
            tracing::warn!("gateway running in local-only mode; only loopback callers are accepted");
        }
        Ok(Self::new(bind, gateway, authz, config.server.max_body_bytes))
    }

    /// Configured bind address.
    #[must_use]
    pub const fn bind_addr(&self) -> SocketAddr {
        self.bind
    }

    /// Builds the axum router.
    #[must_use]
    pub fn router(&self) -> Router {
        Router::new()
            .route("/mcp/v1/proxy/{server_label}/tools/{tool_name}", post(handle_proxy))
            .route("/mcp/v1/tools", get(handle_list_tools))
            .route("/healthz", get(handle_health))
            .layer(DefaultBodyLimit::max(self.max_body_bytes))
            .with_state(Arc::clone(&self.state))
    }

    /// Binds the configured address and serves until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when binding or serving fails.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.bind)
            .await
            .map_err(|err| ServerError::Transport(format!("bind {} failed: {err}", self.bind)))?;
        self.serve_on(listener, shutdown).await
    }

    /// Serves on an already bound listener until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when serving fails.
    pub async fn serve_on<F>(self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr().map_err(|err| ServerError::Transport(err.to_string()))?;
        tracing::info!(%addr, "gateway listening");
        let app = self.router();
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|err| ServerError::Transport(format!("http server failed: {err}")))
    }
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// `GET /mcp/v1/tools` body.
#[derive(Debug, Serialize)]
struct ToolListing {
    /// Enabled servers.
    servers: Vec<ToolServerSummary>,
}

/// `GET /healthz` body.
#[derive(Debug, Serialize)]
struct Health {
    /// Always `ok`.
    status: &'static str,
}

/// Handles proxied tool calls.
async fn handle_proxy(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    path: Result<Path<(String, String)>, PathRejection>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, GatewayError> {
    let caller = authenticate(&state, peer, &headers)?;
    let Path((server_label, tool_name)) =
        path.map_err(|_| GatewayError::Validation("invalid request path"))?;
    let body = body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            GatewayError::PayloadTooLarge
        } else {
            GatewayError::Validation("invalid request body")
        }
    })?;
    let output =
        state.gateway.proxy_tool_call(&caller.id, &server_label, &tool_name, &body).await?;
    let mut response = (StatusCode::OK, Json(output.response)).into_response();
    let response_headers = response.headers_mut();
    response_headers.insert(RATE_LIMIT_LIMIT_HEADER, HeaderValue::from(output.rate_limit.limit));
    response_headers
        .insert(RATE_LIMIT_REMAINING_HEADER, HeaderValue::from(output.rate_limit.remaining));
    Ok(response)
}

/// Handles tool server listing.
async fn handle_list_tools(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<Json<ToolListing>, GatewayError> {
    authenticate(&state, peer, &headers)?;
    let servers = state.gateway.list_tools().await?;
    Ok(Json(ToolListing {
        servers,
    }))
}

/// Handles the liveness check.
async fn handle_health() -> Json<Health> {
    Json(Health {
        status: "ok",
    })
}

/// Resolves the caller or fails with 401.
fn authenticate(
    state: &ServerState,
    peer: SocketAddr,
    headers: &HeaderMap,
) -> Result<CallerIdentity, GatewayError> {
    let auth_header =
        headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok()).map(str::to_string);
    let context = RequestContext::http(Some(peer.ip()), auth_header);
    state.authz.authenticate(&context).map_err(|err| {
        tracing::debug!(peer = %peer.ip(), error = %err, "caller authentication failed");
        GatewayError::Unauthenticated("caller authentication required")
    })
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Gateway server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization errors.
    #[error("init error: {0}")]
    Init(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}
