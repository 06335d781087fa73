// crates/toolgate-core/src/interfaces.rs
// ============================================================================
// Module: Toolgate Interfaces
// Description: Store, policy, audit, and forwarding seams used by the gateway.
// Purpose: Keep the pipeline independent of storage and transport backends.
// Dependencies: async-trait, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The gateway consumes its external collaborators through the narrow traits
//! in this module: server lookups, trust policy reads, an audit sink, and an
//! outbound forwarder. Implementations must be safe to share across tasks.
//! Error strings produced here are for local logs only; the gateway never
//! copies them into responses.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::credential::SecretString;
use crate::model::AuditEntry;
use crate::model::AuthType;
use crate::model::Tier;
use crate::model::TrustDefault;
use crate::model::TrustRule;
use crate::model::UpstreamServer;

// ============================================================================
// SECTION: Stores
// ============================================================================

/// Store access failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend reported an error.
    #[error("store error: {0}")]
    Store(String),
}

/// Read access to upstream server records.
#[async_trait]
pub trait ServerStore: Send + Sync {
    /// Looks up a server by its unique label.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    async fn get_by_label(&self, label: &str) -> Result<Option<UpstreamServer>, StoreError>;

    /// Lists every configured server, enabled or not.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    async fn list_servers(&self) -> Result<Vec<UpstreamServer>, StoreError>;
}

/// Read access to the three trust policy sources.
#[async_trait]
pub trait TrustPolicySource: Send + Sync {
    /// Returns the exact override for `(agent_id, tool_name)`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    async fn agent_override(
        &self,
        agent_id: &str,
        tool_name: &str,
    ) -> Result<Option<Tier>, StoreError>;

    /// Returns a workspace's rules in evaluation order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    async fn workspace_rules(&self, workspace_id: &str) -> Result<Vec<TrustRule>, StoreError>;

    /// Returns all global defaults in any order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    async fn trust_defaults(&self) -> Result<Vec<TrustDefault>, StoreError>;
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Audit persistence failure.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Entry could not be serialized.
    #[error("audit serialization failed: {0}")]
    Serialization(String),
    /// Sink could not persist the entry.
    #[error("audit write failed: {0}")]
    Write(String),
}

/// Append-only audit sink.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Persists one entry.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError`] when the entry cannot be written.
    async fn record(&self, entry: &AuditEntry) -> Result<(), AuditError>;
}

// ============================================================================
// SECTION: Forwarder
// ============================================================================

/// Decrypted credential attached to an outbound call.
#[derive(Debug, Clone)]
pub struct UpstreamCredential {
    /// Scheme used to present the secret.
    pub scheme: AuthType,
    /// Plaintext secret.
    pub secret: SecretString,
}

/// Outbound tool call handed to a [`Forwarder`].
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    /// Upstream label (for logs).
    pub label: String,
    /// Upstream base URL.
    pub endpoint: String,
    /// Tool being invoked.
    pub tool_name: String,
    /// Opaque tool arguments.
    pub arguments: Value,
    /// Credential, when the upstream requires one.
    pub credential: Option<UpstreamCredential>,
}

/// Upstream answer as seen by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardResponse {
    /// Upstream HTTP status.
    pub status_code: u16,
    /// Upstream body (JSON, or a JSON string for non-JSON bodies).
    pub body: Value,
}

/// Transport-level forwarding failure.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// The outbound request could not be built.
    #[error("invalid upstream request: {0}")]
    InvalidRequest(String),
    /// Connection or protocol failure.
    #[error("upstream transport failed: {0}")]
    Transport(String),
    /// Deadline elapsed before the upstream answered.
    #[error("upstream timed out")]
    Timeout,
    /// Upstream body exceeded the configured limit.
    #[error("upstream response exceeds {0} bytes")]
    ResponseTooLarge(usize),
}

/// Sends a tool call to an upstream server.
#[async_trait]
pub trait Forwarder: Send + Sync {
    /// Forwards the call and returns the upstream's answer.
    ///
    /// Dropping the returned future must abort the outbound call.
    ///
    /// # Errors
    ///
    /// Returns [`ForwardError`] on transport failures; HTTP error statuses
    /// are returned as [`ForwardResponse`] values, not errors.
    async fn forward(&self, request: &ProxyRequest) -> Result<ForwardResponse, ForwardError>;
}
