// crates/toolgate-core/src/lib.rs
// ============================================================================
// Module: Toolgate Core Library
// Description: Public API surface for the Toolgate gateway core.
// Purpose: Expose the model, interfaces, and pipeline building blocks.
// Dependencies: crate::{model, interfaces, credential, rate_limit, breaker, trust}
// ============================================================================

//! ## Overview
//! Toolgate core holds the pieces of the gateway proxy pipeline that need
//! careful invariants: the credential codec, the fixed-window rate limiter,
//! the per-label circuit breaker, and the trust classifier. It has no HTTP
//! dependencies; transports live in `toolgate-gateway`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod breaker;
pub mod credential;
pub mod interfaces;
pub mod model;
pub mod rate_limit;
pub mod store;
pub mod time;
pub mod trust;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use breaker::Admission;
pub use breaker::BreakerPosition;
pub use breaker::BreakerSnapshot;
pub use breaker::CircuitBreaker;
pub use credential::CredentialError;
pub use credential::CredentialKey;
pub use credential::SecretString;
pub use interfaces::AuditError;
pub use interfaces::AuditSink;
pub use interfaces::ForwardError;
pub use interfaces::ForwardResponse;
pub use interfaces::Forwarder;
pub use interfaces::ProxyRequest;
pub use interfaces::ServerStore;
pub use interfaces::StoreError;
pub use interfaces::TrustPolicySource;
pub use interfaces::UpstreamCredential;
pub use model::AgentTrustOverride;
pub use model::AuditDetails;
pub use model::AuditEntry;
pub use model::AuthType;
pub use model::CircuitBreakerConfig;
pub use model::ClassifyInput;
pub use model::ProxyOutcome;
pub use model::Tier;
pub use model::TrustDefault;
pub use model::TrustRule;
pub use model::UpstreamServer;
pub use rate_limit::RateDecision;
pub use rate_limit::RateLimiter;
pub use store::InMemoryServerStore;
pub use store::InMemoryTrustPolicy;
pub use time::Clock;
pub use time::ManualClock;
pub use time::SystemClock;
pub use trust::ClassifyError;
pub use trust::TrustClassifier;
