// crates/toolgate-gateway/src/auth.rs
// ============================================================================
// Module: Caller Authentication
// Description: Resolves the caller identity for inbound gateway requests.
// Purpose: Provide strict, fail-closed identity for rate limits and audit.
// Dependencies: sha2, subtle, toolgate-config
// ============================================================================

//! ## Overview
//! Every proxied call needs a caller id: it is part of the rate-limit key and
//! becomes the audit actor. `local_only` maps loopback peers to `loopback`;
//! `bearer_token` maps configured tokens to configured ids. Token comparison
//! is constant time. Failures are surfaced as 401 and never audited.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::fmt::Write as _;
use std::net::IpAddr;

use sha2::Digest;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use toolgate_config::ServerAuthConfig;
use toolgate_config::ServerAuthMode;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum accepted `Authorization` header size.
const MAX_AUTH_HEADER_BYTES: usize = 8 * 1024;
/// Caller id assigned to loopback peers in `local_only` mode.
pub const LOOPBACK_CALLER_ID: &str = "loopback";

// ============================================================================
// SECTION: Request Context
// ============================================================================

/// Per-request context used for auth decisions.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Peer IP address when available.
    pub peer_ip: Option<IpAddr>,
    /// `Authorization` header value.
    pub auth_header: Option<String>,
}

impl RequestContext {
    /// Builds an HTTP request context.
    #[must_use]
    pub const fn http(peer_ip: Option<IpAddr>, auth_header: Option<String>) -> Self {
        Self {
            peer_ip,
            auth_header,
        }
    }

    /// Returns true when the peer IP is loopback.
    #[must_use]
    pub fn peer_is_loopback(&self) -> bool {
        self.peer_ip.is_some_and(|ip| ip.is_loopback())
    }
}

/// Authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    /// Caller id used for rate limiting and audit.
    pub id: String,
    /// Token fingerprint for bearer callers (sha256, hex).
    pub token_fingerprint: Option<String>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Authentication errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// Missing or invalid authentication.
    #[error("unauthenticated: {0}")]
    Unauthenticated(&'static str),
}

// ============================================================================
// SECTION: Authenticator
// ============================================================================

/// Configured bearer caller.
struct BearerCaller {
    /// Caller id.
    id: String,
    /// Token bytes.
    token: Vec<u8>,
}

/// Caller authenticator derived from `[server.auth]`.
pub struct CallerAuthz {
    /// Auth mode.
    mode: ServerAuthMode,
    /// Bearer callers.
    callers: Vec<BearerCaller>,
}

impl fmt::Debug for CallerAuthz {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallerAuthz")
            .field("mode", &self.mode)
            .field("callers", &self.callers.len())
            .finish()
    }
}

impl CallerAuthz {
    /// Builds an authenticator from server auth configuration.
    #[must_use]
    pub fn from_config(config: &ServerAuthConfig) -> Self {
        let callers = config
            .callers
            .iter()
            .map(|caller| BearerCaller {
                id: caller.id.clone(),
                token: caller.token.as_bytes().to_vec(),
            })
            .collect();
        Self {
            mode: config.mode,
            callers,
        }
    }

    /// Local-only authenticator.
    #[must_use]
    pub const fn local_only() -> Self {
        Self {
            mode: ServerAuthMode::LocalOnly,
            callers: Vec::new(),
        }
    }

    /// Returns the configured auth mode.
    #[must_use]
    pub const fn mode(&self) -> ServerAuthMode {
        self.mode
    }

    /// Resolves the caller for a request.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when the caller cannot be identified.
    pub fn authenticate(&self, ctx: &RequestContext) -> Result<CallerIdentity, AuthError> {
        match self.mode {
            ServerAuthMode::LocalOnly => authenticate_local_only(ctx),
            ServerAuthMode::BearerToken => self.authenticate_bearer(ctx),
        }
    }

    /// Matches the bearer token against every configured caller.
    fn authenticate_bearer(&self, ctx: &RequestContext) -> Result<CallerIdentity, AuthError> {
        let token = parse_bearer_token(ctx.auth_header.as_deref())?;
        let mut matched: Option<&BearerCaller> = None;
        // Compare against all callers so timing does not reveal the match position.
        for caller in &self.callers {
            let equal: bool = caller.token.as_slice().ct_eq(token.as_bytes()).into();
            if equal && matched.is_none() {
                matched = Some(caller);
            }
        }
        let caller = matched.ok_or(AuthError::Unauthenticated("invalid bearer token"))?;
        Ok(CallerIdentity {
            id: caller.id.clone(),
            token_fingerprint: Some(token_fingerprint(token)),
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Accepts loopback peers only.
fn authenticate_local_only(ctx: &RequestContext) -> Result<CallerIdentity, AuthError> {
    if !ctx.peer_is_loopback() {
        return Err(AuthError::Unauthenticated("local-only mode requires loopback access"));
    }
    Ok(CallerIdentity {
        id: LOOPBACK_CALLER_ID.to_string(),
        token_fingerprint: None,
    })
}

/// Extracts the token from `Authorization: Bearer <token>`.
fn parse_bearer_token(auth_header: Option<&str>) -> Result<&str, AuthError> {
    let header = auth_header.ok_or(AuthError::Unauthenticated("missing authorization"))?;
    if header.len() > MAX_AUTH_HEADER_BYTES {
        return Err(AuthError::Unauthenticated("authorization header too large"));
    }
    let mut parts = header.trim().splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().unwrap_or_default().trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::Unauthenticated("invalid authorization header"));
    }
    Ok(token)
}

/// Hex sha256 of a token, safe to log.
fn token_fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    digest.iter().fold(String::with_capacity(64), |mut out, byte| {
        let _ = write!(out, "{byte:02x}");
        out
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================
