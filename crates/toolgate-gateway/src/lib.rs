// crates/toolgate-gateway/src/lib.rs
// ============================================================================
// Module: Toolgate Gateway
// Description: HTTP gateway that proxies tool calls to upstream MCP servers.
// Purpose: Wire the core pipeline pieces to auth, audit, transport, and axum.
// Dependencies: toolgate-core, toolgate-config, axum, reqwest, tokio
// ============================================================================

//! ## Overview
//! The gateway accepts authenticated tool calls, runs them through the
//! breaker, trust, rate limit, and credential checks in
//! [`gateway::Gateway`], and forwards admitted calls through a
//! [`toolgate_core::Forwarder`]. Every call that reaches a server lookup is
//! audited.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod auth;
pub mod error;
pub mod forwarder;
pub mod gateway;
pub mod server;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::FileAuditSink;
pub use audit::StderrAuditSink;
pub use audit::audit_sink_from_config;
pub use auth::CallerAuthz;
pub use auth::CallerIdentity;
pub use auth::RequestContext;
pub use error::GatewayError;
pub use forwarder::HttpForwarder;
pub use gateway::Gateway;
pub use gateway::GatewayComponents;
pub use gateway::ProxyOutput;
pub use gateway::ProxyResponse;
pub use gateway::RateLimitPolicy;
pub use gateway::ToolServerSummary;
pub use server::GatewayServer;
pub use server::ServerError;
