// crates/toolgate-gateway/src/gateway/mod.rs
// ============================================================================
// Module: Gateway Orchestrator
// Description: The proxy pipeline for gateway tool calls and tool listing.
// Purpose: Sequence breaker, trust, rate limit, and credential checks.
// Dependencies: serde, serde_json, tokio, toolgate-core, tracing
// ============================================================================

//! ## Overview
//! [`Gateway::proxy_tool_call`] runs the pipeline in a fixed order and stops
//! at the first failing step:
//!
//! 1. label and tool name are non-empty (failure is not audited)
//! 2. server lookup
//! 3. server enabled
//! 4. breaker config parse
//! 5. breaker admission
//! 6. body decode
//! 7. trust classification
//! 8. tier must be `auto`
//! 9. rate limit
//! 10. credential decode and decrypt
//! 11. forward and measure upstream latency
//! 12. forward error: transport failures and timeouts count against the
//!     breaker (502); an unbuildable request (500) or an oversized answer
//!     (502) is rejected without touching the breaker
//! 13. upstream status >= 500: breaker failure, wrapped in a 200
//! 14. upstream status < 500: breaker success, wrapped in a 200
//!
//! A post-blackout trial call that is rejected before the upstream answers
//! hands its trial slot back to the breaker.
//!
//! Each step commits its side effect immediately. A consumed rate-limit slot
//! is not refunded when a later step fails.
//!
//! Every outcome after step 1 produces one audit entry, dispatched on a
//! detached task so the response never waits on the sink. If the caller
//! drops the request future mid-forward, the pipeline stops there and no
//! entry is written for that call.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use toolgate_core::Admission;
use toolgate_core::AuditDetails;
use toolgate_core::AuditEntry;
use toolgate_core::AuditSink;
use toolgate_core::AuthType;
use toolgate_core::CircuitBreaker;
use toolgate_core::CircuitBreakerConfig;
use toolgate_core::ClassifyInput;
use toolgate_core::CredentialError;
use toolgate_core::CredentialKey;
use toolgate_core::ForwardError;
use toolgate_core::Forwarder;
use toolgate_core::ProxyOutcome;
use toolgate_core::ProxyRequest;
use toolgate_core::RateLimiter;
use toolgate_core::ServerStore;
use toolgate_core::TrustClassifier;
use toolgate_core::TrustPolicySource;
use toolgate_core::UpstreamCredential;
use toolgate_core::UpstreamServer;
use toolgate_core::credential;
use toolgate_core::rate_limit::DEFAULT_GATEWAY_LIMIT;
use toolgate_core::rate_limit::DEFAULT_GATEWAY_WINDOW;

use crate::error::GatewayError;


// ============================================================================
// SECTION: Types
// ============================================================================

/// Per-caller admission policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Calls admitted per window.
    pub max_requests: u32,
    /// Window length.
    pub window: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_GATEWAY_LIMIT,
            window: DEFAULT_GATEWAY_WINDOW,
        }
    }
}

/// Collaborators wired into a [`Gateway`].
pub struct GatewayComponents {
    /// Upstream server records.
    pub servers: Arc<dyn ServerStore>,
    /// Trust policy sources.
    pub policy: Arc<dyn TrustPolicySource>,
    /// Outbound transport.
    pub forwarder: Arc<dyn Forwarder>,
    /// Shared breaker state.
    pub breaker: Arc<CircuitBreaker>,
    /// Shared rate-limit counters.
    pub limiter: Arc<RateLimiter>,
    /// Audit sink; `None` disables audit.
    pub audit: Option<Arc<dyn AuditSink>>,
    /// Key for stored upstream credentials.
    pub credential_key: Option<CredentialKey>,
    /// Admission policy.
    pub rate_limit: RateLimitPolicy,
}

/// Inbound proxy call body.
#[derive(Debug, Deserialize)]
struct ProxyCallBody {
    /// Opaque tool arguments.
    #[serde(default)]
    arguments: Value,
    /// Workspace for trust rules.
    #[serde(default)]
    workspace_id: Option<String>,
    /// Agent for trust overrides.
    #[serde(default)]
    agent_id: Option<String>,
}

/// Successful proxy envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProxyResponse {
    /// Upstream HTTP status.
    pub status_code: u16,
    /// Upstream body.
    pub body: Value,
    /// Upstream latency in milliseconds.
    pub latency_ms: u64,
}

/// Rate-limit state reported alongside a successful call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    /// Configured limit.
    pub limit: u32,
    /// Calls left in the current window.
    pub remaining: u32,
}

/// Result of a completed proxy call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyOutput {
    /// Envelope returned to the caller.
    pub response: ProxyResponse,
    /// Rate-limit state after this call.
    pub rate_limit: RateLimitStatus,
}

/// Enabled server as listed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolServerSummary {
    /// Server label.
    pub label: String,
    /// Server endpoint.
    pub endpoint: String,
}

/// Pipeline failure paired with its audit outcome.
struct Rejection {
    /// Audit outcome label.
    outcome: ProxyOutcome,
    /// Caller-facing error.
    error: GatewayError,
    /// Whether the failure was already reported to the breaker.
    breaker_recorded: bool,
}

impl Rejection {
    /// Pairs an outcome with an error.
    const fn new(outcome: ProxyOutcome, error: GatewayError) -> Self {
        Self {
            outcome,
            error,
            breaker_recorded: false,
        }
    }

    /// Marks the failure as breaker evidence already recorded.
    const fn recorded(mut self) -> Self {
        self.breaker_recorded = true;
        self
    }
}

// ============================================================================
// SECTION: Gateway
// ============================================================================

/// Gateway proxy pipeline.
pub struct Gateway {
    /// Upstream server records.
    servers: Arc<dyn ServerStore>,
    /// Trust classifier.
    classifier: TrustClassifier,
    /// Outbound transport.
    forwarder: Arc<dyn Forwarder>,
    /// Breaker state.
    breaker: Arc<CircuitBreaker>,
    /// Rate-limit counters.
    limiter: Arc<RateLimiter>,
    /// Optional audit sink.
    audit: Option<Arc<dyn AuditSink>>,
    /// Credential key.
    credential_key: Option<CredentialKey>,
    /// Admission policy.
    rate_limit: RateLimitPolicy,
}

impl Gateway {
    /// Builds a gateway from its collaborators.
    #[must_use]
    pub fn new(components: GatewayComponents) -> Self {
        Self {
            servers: components.servers,
            classifier: TrustClassifier::new(components.policy),
            forwarder: components.forwarder,
            breaker: components.breaker,
            limiter: components.limiter,
            audit: components.audit,
            credential_key: components.credential_key,
            rate_limit: components.rate_limit,
        }
    }

    /// Returns the admission policy.
    #[must_use]
    pub const fn rate_limit(&self) -> RateLimitPolicy {
        self.rate_limit
    }

    /// Proxies one tool call for `caller_id`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] for the first failing pipeline step. Upstream
    /// 5xx answers are not errors; they come back wrapped in the envelope.
    pub async fn proxy_tool_call(
        &self,
        caller_id: &str,
        server_label: &str,
        tool_name: &str,
        body: &[u8],
    ) -> Result<ProxyOutput, GatewayError> {
        let label = server_label.trim();
        let tool = tool_name.trim();
        if label.is_empty() {
            return Err(GatewayError::Validation("server label is required"));
        }
        if tool.is_empty() {
            return Err(GatewayError::Validation("tool name is required"));
        }

        let started = Instant::now();
        match self.run_pipeline(caller_id, label, tool, body).await {
            Ok((output, details)) => {
                self.dispatch_audit(AuditEntry::tool_call(caller_id, label, tool, details));
                Ok(output)
            }
            Err(rejection) => {
                let details = AuditDetails {
                    outcome: rejection.outcome,
                    latency_ms: elapsed_ms(started),
                    upstream_status: None,
                };
                self.dispatch_audit(AuditEntry::tool_call(caller_id, label, tool, details));
                Err(rejection.error)
            }
        }
    }

    /// Lists enabled upstream servers.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] when the store fails.
    pub async fn list_tools(&self) -> Result<Vec<ToolServerSummary>, GatewayError> {
        let servers = self.servers.list_servers().await.map_err(|err| {
            tracing::warn!(error = %err, "server listing failed");
            GatewayError::Internal("server store unavailable")
        })?;
        Ok(servers
            .into_iter()
            .filter(|server| server.is_enabled)
            .map(|server| ToolServerSummary {
                label: server.label,
                endpoint: server.endpoint,
            })
            .collect())
    }

    /// Steps 2 through 5, then the admitted remainder.
    async fn run_pipeline(
        &self,
        caller_id: &str,
        label: &str,
        tool: &str,
        body: &[u8],
    ) -> Result<(ProxyOutput, AuditDetails), Rejection> {
        let server = self.resolve_server(label).await?;
        let breaker_config =
            CircuitBreakerConfig::parse(server.circuit_breaker_config.as_deref()).map_err(
                |err| {
                    tracing::warn!(server = label, error = %err, "invalid circuit breaker config");
                    Rejection::new(
                        ProxyOutcome::InvalidBreakerConfig,
                        GatewayError::Internal("invalid circuit breaker configuration"),
                    )
                },
            )?;
        let admission = self.breaker.admit(label, &breaker_config).ok_or_else(|| {
            Rejection::new(
                ProxyOutcome::CircuitOpen,
                GatewayError::Unavailable("upstream circuit is open"),
            )
        })?;

        let result = self.run_admitted(caller_id, label, tool, body, server, &breaker_config).await;
        // A trial rejected before the upstream answered must not hold the slot.
        if admission == Admission::Trial
            && let Err(rejection) = &result
            && !rejection.breaker_recorded
        {
            self.breaker.release_trial(label);
        }
        result
    }

    /// Steps 6 through 14, after the breaker admitted the call.
    async fn run_admitted(
        &self,
        caller_id: &str,
        label: &str,
        tool: &str,
        body: &[u8],
        server: UpstreamServer,
        breaker_config: &CircuitBreakerConfig,
    ) -> Result<(ProxyOutput, AuditDetails), Rejection> {
        let call: ProxyCallBody = serde_json::from_slice(body).map_err(|_| {
            Rejection::new(ProxyOutcome::InvalidBody, GatewayError::Validation("invalid request body"))
        })?;
        self.check_trust(tool, &call).await?;

        let key = RateLimiter::gateway_key(label, tool, caller_id);
        let decision =
            self.limiter.allow(&key, self.rate_limit.max_requests, self.rate_limit.window);
        if !decision.permitted {
            return Err(Rejection::new(
                ProxyOutcome::RateLimited,
                GatewayError::RateLimited {
                    retry_after_secs: retry_after_secs(decision.reset_after),
                },
            ));
        }

        let credential = self.open_credential(&server)?;
        let request = ProxyRequest {
            label: server.label,
            endpoint: server.endpoint,
            tool_name: tool.to_string(),
            arguments: call.arguments,
            credential,
        };

        let forwarded_at = Instant::now();
        let result = self.forwarder.forward(&request).await;
        let latency_ms = elapsed_ms(forwarded_at);
        let response = match result {
            Ok(response) => response,
            Err(err) => return Err(self.forward_failure(label, tool, breaker_config, &err)),
        };

        let outcome = if response.status_code >= 500 {
            self.breaker.record_failure(label, breaker_config);
            ProxyOutcome::Upstream5xx
        } else {
            self.breaker.record_success(label);
            ProxyOutcome::Success
        };
        let details = AuditDetails {
            outcome,
            latency_ms,
            upstream_status: Some(response.status_code),
        };
        let output = ProxyOutput {
            response: ProxyResponse {
                status_code: response.status_code,
                body: response.body,
                latency_ms,
            },
            rate_limit: RateLimitStatus {
                limit: self.rate_limit.max_requests,
                remaining: decision.remaining,
            },
        };
        Ok((output, details))
    }

    /// Step 12. Only transport failures count against the breaker; a request
    /// that could not be built or an oversized answer is a local rejection.
    fn forward_failure(
        &self,
        label: &str,
        tool: &str,
        breaker_config: &CircuitBreakerConfig,
        err: &ForwardError,
    ) -> Rejection {
        tracing::warn!(server = label, tool, error = %err, "upstream call failed");
        match err {
            ForwardError::InvalidRequest(_) => Rejection::new(
                ProxyOutcome::InvalidUpstreamRequest,
                GatewayError::Internal("upstream request could not be built"),
            ),
            ForwardError::ResponseTooLarge(_) => Rejection::new(
                ProxyOutcome::ResponseTooLarge,
                GatewayError::UpstreamFailure("upstream response exceeds size limit"),
            ),
            ForwardError::Transport(_) | ForwardError::Timeout => {
                self.breaker.record_failure(label, breaker_config);
                Rejection::new(
                    ProxyOutcome::UpstreamError,
                    GatewayError::UpstreamFailure("upstream request failed"),
                )
                .recorded()
            }
        }
    }

    /// Steps 2 and 3.
    async fn resolve_server(&self, label: &str) -> Result<UpstreamServer, Rejection> {
        let server = match self.servers.get_by_label(label).await {
            Ok(Some(server)) => server,
            Ok(None) => {
                return Err(Rejection::new(
                    ProxyOutcome::ServerNotFound,
                    GatewayError::NotFound("server not found"),
                ));
            }
            Err(err) => {
                tracing::warn!(server = label, error = %err, "server lookup failed");
                return Err(Rejection::new(
                    ProxyOutcome::StoreError,
                    GatewayError::Internal("server store unavailable"),
                ));
            }
        };
        if !server.is_enabled {
            return Err(Rejection::new(
                ProxyOutcome::ServerDisabled,
                GatewayError::Validation("server is disabled"),
            ));
        }
        Ok(server)
    }

    /// Steps 7 and 8.
    async fn check_trust(&self, tool: &str, call: &ProxyCallBody) -> Result<(), Rejection> {
        let input = ClassifyInput {
            tool_name: tool.to_string(),
            agent_id: call.agent_id.clone(),
            workspace_id: call.workspace_id.clone(),
        };
        let tier = self.classifier.classify(&input).await.map_err(|err| {
            tracing::warn!(tool, error = %err, "trust classification failed");
            Rejection::new(
                ProxyOutcome::ClassifierError,
                GatewayError::Internal("trust classification failed"),
            )
        })?;
        if !tier.permits() {
            tracing::debug!(tool, tier = tier.as_str(), "tool call denied by trust policy");
            return Err(Rejection::new(
                ProxyOutcome::TrustDenied,
                GatewayError::PolicyDenied("tool call denied by trust policy"),
            ));
        }
        Ok(())
    }

    /// Step 10.
    fn open_credential(
        &self,
        server: &UpstreamServer,
    ) -> Result<Option<UpstreamCredential>, Rejection> {
        if server.auth_type == AuthType::None {
            return Ok(None);
        }
        let credential_error =
            |message| Rejection::new(ProxyOutcome::CredentialError, GatewayError::Internal(message));
        let stored = server
            .auth_credential
            .as_deref()
            .ok_or_else(|| credential_error("stored credential is missing"))?;
        let key = self
            .credential_key
            .as_ref()
            .ok_or_else(|| credential_error("credential key is not configured"))?;
        let secret = credential::open_stored(stored, key).map_err(|err| {
            tracing::warn!(server = %server.label, error = %err, "stored credential rejected");
            match err {
                CredentialError::Decode => {
                    credential_error("stored credential is not valid base64")
                }
                _ => credential_error("stored credential could not be decrypted"),
            }
        })?;
        Ok(Some(UpstreamCredential {
            scheme: server.auth_type,
            secret,
        }))
    }

    /// Writes an audit entry on a detached task.
    fn dispatch_audit(&self, entry: AuditEntry) {
        let Some(sink) = self.audit.clone() else {
            return;
        };
        tokio::spawn(async move {
            if let Err(err) = sink.record(&entry).await {
                tracing::warn!(
                    error = %err,
                    resource = %entry.resource_id,
                    outcome = entry.details.outcome.as_str(),
                    "audit write failed"
                );
            }
        });
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Milliseconds since `start`, saturating.
fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Whole seconds until the window resets, at least one.
fn retry_after_secs(reset_after: Duration) -> u64 {
    let secs = reset_after.as_secs();
    let rounded = if reset_after.subsec_nanos() > 0 { secs.saturating_add(1) } else { secs };
    rounded.max(1)
}
