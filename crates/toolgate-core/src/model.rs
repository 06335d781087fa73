// crates/toolgate-core/src/model.rs
// ============================================================================
// Module: Toolgate Data Model
// Description: Upstream server records, trust policy data, and audit entries.
// Purpose: Define the values the gateway pipeline reads and emits.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The gateway only reads configuration-owned records ([`UpstreamServer`],
//! trust policy rows) and only writes [`AuditEntry`] values. Storage schema
//! beyond these fields is owned by external stores.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default consecutive failures that open a breaker.
pub const DEFAULT_FAIL_THRESHOLD: u32 = 5;
/// Default breaker blackout in seconds.
pub const DEFAULT_OPEN_DURATION_SECS: u64 = 30;
/// Audit action recorded for every proxied tool call.
pub const GATEWAY_TOOL_CALL_ACTION: &str = "gateway_tool_call";

// ============================================================================
// SECTION: Upstream Servers
// ============================================================================

/// Authentication scheme used when calling an upstream server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    /// No credential is attached.
    #[default]
    None,
    /// `Authorization: Bearer <secret>`.
    Bearer,
    /// `Authorization: Basic <base64(secret)>`, secret stored as `user:password`.
    Basic,
}

impl AuthType {
    /// Returns a stable label for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Bearer => "bearer",
            Self::Basic => "basic",
        }
    }
}

/// Upstream MCP tool server record.
///
/// # Invariants
/// - `label` is unique across all records.
/// - `auth_credential` is base64 ciphertext, never plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamServer {
    /// Unique server label.
    pub label: String,
    /// Base URL of the upstream.
    pub endpoint: String,
    /// Credential scheme.
    #[serde(default)]
    pub auth_type: AuthType,
    /// Encrypted credential (base64), when `auth_type` is not `none`.
    #[serde(default)]
    pub auth_credential: Option<String>,
    /// Whether calls may be proxied to this server.
    pub is_enabled: bool,
    /// Raw circuit breaker JSON attached to the record.
    #[serde(default)]
    pub circuit_breaker_config: Option<String>,
}

// ============================================================================
// SECTION: Circuit Breaker Config
// ============================================================================

/// Breaker thresholds for one upstream label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the breaker (>= 1).
    pub fail_threshold: u32,
    /// Blackout after opening.
    pub open_duration: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            fail_threshold: DEFAULT_FAIL_THRESHOLD,
            open_duration: Duration::from_secs(DEFAULT_OPEN_DURATION_SECS),
        }
    }
}

/// Wire shape of the `circuit_breaker` JSON field.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawBreakerConfig {
    /// Failure threshold; zero or absent selects the default.
    fail_threshold: Option<u32>,
    /// Blackout seconds; zero or absent selects the default.
    open_duration_s: Option<u64>,
}

/// Malformed breaker configuration.
#[derive(Debug, Error)]
#[error("invalid circuit breaker config: {0}")]
pub struct BreakerConfigError(String);

impl CircuitBreakerConfig {
    /// Parses the raw JSON attached to an upstream record.
    ///
    /// Absent, blank, `null`, and zero-valued fields fall back to the
    /// defaults (5 failures, 30 seconds).
    ///
    /// # Errors
    ///
    /// Returns [`BreakerConfigError`] when the text is not a JSON object of
    /// the expected shape.
    pub fn parse(raw: Option<&str>) -> Result<Self, BreakerConfigError> {
        let Some(text) = raw.map(str::trim).filter(|text| !text.is_empty()) else {
            return Ok(Self::default());
        };
        let parsed: Option<RawBreakerConfig> =
            serde_json::from_str(text).map_err(|err| BreakerConfigError(err.to_string()))?;
        let parsed = parsed.unwrap_or_default();
        let defaults = Self::default();
        Ok(Self {
            fail_threshold: parsed
                .fail_threshold
                .filter(|value| *value > 0)
                .unwrap_or(defaults.fail_threshold),
            open_duration: parsed
                .open_duration_s
                .filter(|value| *value > 0)
                .map_or(defaults.open_duration, Duration::from_secs),
        })
    }
}

// ============================================================================
// SECTION: Trust Policy
// ============================================================================

/// Authorization tier for a tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Execute without approval.
    Auto,
    /// Deny; a human must approve out of band.
    Review,
    /// Deny.
    Block,
}

impl Tier {
    /// Returns true when the tier permits execution.
    #[must_use]
    pub const fn permits(self) -> bool {
        matches!(self, Self::Auto)
    }

    /// Returns a stable label for the tier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Review => "review",
            Self::Block => "block",
        }
    }
}

/// Workspace-scoped trust rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustRule {
    /// Glob over tool names.
    pub tool_pattern: String,
    /// Tier assigned on match.
    pub tier: Tier,
}

/// Global trust default; lower `priority` is evaluated first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustDefault {
    /// Glob over tool names.
    pub tool_pattern: String,
    /// Tier assigned on match.
    pub tier: Tier,
    /// Evaluation order (ascending).
    pub priority: i32,
}

/// Exact tool override scoped to one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentTrustOverride {
    /// Agent the override applies to.
    pub agent_id: String,
    /// Exact tool name.
    pub tool_name: String,
    /// Tier returned for the pair.
    pub tier: Tier,
}

/// Input to a single trust classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifyInput {
    /// Tool being invoked.
    pub tool_name: String,
    /// Calling agent, when known.
    pub agent_id: Option<String>,
    /// Workspace the call belongs to, when known.
    pub workspace_id: Option<String>,
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Outcome label recorded for a proxied call.
///
/// # Invariants
/// - Serialized labels are stable; audit consumers match on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxyOutcome {
    /// Upstream answered below 500.
    Success,
    /// Upstream answered 500 or above.
    #[serde(rename = "upstream_5xx")]
    Upstream5xx,
    /// Transport-level failure reaching the upstream.
    UpstreamError,
    /// Outbound request could not be built (bad endpoint or credential header).
    InvalidUpstreamRequest,
    /// Upstream answer exceeded the response size limit.
    ResponseTooLarge,
    /// Breaker rejected the call.
    CircuitOpen,
    /// Trust tier was not `auto`.
    TrustDenied,
    /// Caller exceeded the rate limit.
    RateLimited,
    /// No server with the requested label.
    ServerNotFound,
    /// Server record is disabled.
    ServerDisabled,
    /// Server's breaker JSON is malformed.
    InvalidBreakerConfig,
    /// Request body is not valid JSON of the expected shape.
    InvalidBody,
    /// A trust policy source failed to load.
    ClassifierError,
    /// Stored credential could not be decoded or decrypted.
    CredentialError,
    /// Server lookup failed.
    StoreError,
}

impl ProxyOutcome {
    /// Returns the stable outcome label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Upstream5xx => "upstream_5xx",
            Self::UpstreamError => "upstream_error",
            Self::InvalidUpstreamRequest => "invalid_upstream_request",
            Self::ResponseTooLarge => "response_too_large",
            Self::CircuitOpen => "circuit_open",
            Self::TrustDenied => "trust_denied",
            Self::RateLimited => "rate_limited",
            Self::ServerNotFound => "server_not_found",
            Self::ServerDisabled => "server_disabled",
            Self::InvalidBreakerConfig => "invalid_breaker_config",
            Self::InvalidBody => "invalid_body",
            Self::ClassifierError => "classifier_error",
            Self::CredentialError => "credential_error",
            Self::StoreError => "store_error",
        }
    }
}

/// Outcome details attached to an audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditDetails {
    /// Pipeline outcome.
    pub outcome: ProxyOutcome,
    /// Milliseconds spent in the pipeline (upstream latency once forwarded).
    pub latency_ms: u64,
    /// Upstream HTTP status when a response was received.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,
}

/// Append-only audit record for one gateway tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Authenticated caller identifier.
    pub actor: String,
    /// Always [`GATEWAY_TOOL_CALL_ACTION`].
    pub action: String,
    /// `{label}/{tool_name}`.
    pub resource_id: String,
    /// Outcome details.
    pub details: AuditDetails,
    /// Milliseconds since the unix epoch.
    pub timestamp_ms: u128,
}

impl AuditEntry {
    /// Builds a gateway tool-call entry stamped with the current time.
    #[must_use]
    pub fn tool_call(actor: &str, label: &str, tool_name: &str, details: AuditDetails) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            actor: actor.to_string(),
            action: GATEWAY_TOOL_CALL_ACTION.to_string(),
            resource_id: format!("{label}/{tool_name}"),
            details,
            timestamp_ms,
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
