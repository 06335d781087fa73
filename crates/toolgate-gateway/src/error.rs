// crates/toolgate-gateway/src/error.rs
// ============================================================================
// Module: Gateway Errors
// Description: Error taxonomy and HTTP error envelope for the gateway.
// Purpose: Map every pipeline failure to one status, one code, one message.
// Dependencies: axum, serde, thiserror
// ============================================================================

//! ## Overview
//! [`GatewayError`] carries only fixed, static messages. Store, transport,
//! and codec error text is logged where it occurs and never reaches a
//! response body.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::header::RETRY_AFTER;
use axum::response::IntoResponse;
use axum::response::Response;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Gateway-level failure returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Malformed input.
    #[error("invalid request: {0}")]
    Validation(&'static str),
    /// Unknown upstream server.
    #[error("not found: {0}")]
    NotFound(&'static str),
    /// Trust tier is not `auto`.
    #[error("denied: {0}")]
    PolicyDenied(&'static str),
    /// Circuit breaker is open.
    #[error("unavailable: {0}")]
    Unavailable(&'static str),
    /// Caller exceeded its window.
    #[error("rate limited; retry after {retry_after_secs}s")]
    RateLimited {
        /// Seconds until the window resets.
        retry_after_secs: u64,
    },
    /// Upstream could not be reached.
    #[error("upstream failure: {0}")]
    UpstreamFailure(&'static str),
    /// Caller identity missing or invalid.
    #[error("unauthenticated: {0}")]
    Unauthenticated(&'static str),
    /// Request body exceeds the configured limit.
    #[error("payload too large")]
    PayloadTooLarge,
    /// Internal failure (store, classifier, credential, breaker config).
    #[error("internal error: {0}")]
    Internal(&'static str),
}

impl GatewayError {
    /// HTTP status for the variant.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::PolicyDenied(_) => StatusCode::FORBIDDEN,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::RateLimited {
                ..
            } => StatusCode::TOO_MANY_REQUESTS,
            Self::UpstreamFailure(_) => StatusCode::BAD_GATEWAY,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "INVALID_REQUEST",
            Self::NotFound(_) => "NOT_FOUND",
            Self::PolicyDenied(_) => "TRUST_DENIED",
            Self::Unavailable(_) => "CIRCUIT_OPEN",
            Self::RateLimited {
                ..
            } => "RATE_LIMITED",
            Self::UpstreamFailure(_) => "UPSTREAM_ERROR",
            Self::Unauthenticated(_) => "UNAUTHENTICATED",
            Self::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Caller-facing message.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::Validation(message)
            | Self::NotFound(message)
            | Self::PolicyDenied(message)
            | Self::Unavailable(message)
            | Self::UpstreamFailure(message)
            | Self::Unauthenticated(message)
            | Self::Internal(message) => *message,
            Self::RateLimited {
                ..
            } => "rate limit exceeded",
            Self::PayloadTooLarge => "request body exceeds size limit",
        }
    }
}

// ============================================================================
// SECTION: Envelope
// ============================================================================

/// `{"success": false, "error": {...}}` body.
#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    /// Always false.
    success: bool,
    /// Error payload.
    error: ErrorBody,
}

/// Error payload inside the envelope.
#[derive(Debug, Serialize)]
struct ErrorBody {
    /// Stable code.
    code: &'static str,
    /// Generic message.
    message: &'static str,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let envelope = ErrorEnvelope {
            success: false,
            error: ErrorBody {
                code: self.code(),
                message: self.message(),
            },
        };
        let mut response = (self.status(), Json(envelope)).into_response();
        if let Self::RateLimited {
            retry_after_secs,
        } = self
        {
            response.headers_mut().insert(RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::GatewayError;

    #[test]
    fn every_variant_has_distinct_code() {
        let variants = [
            GatewayError::Validation("v"),
            GatewayError::NotFound("n"),
            GatewayError::PolicyDenied("p"),
            GatewayError::Unavailable("u"),
            GatewayError::RateLimited {
                retry_after_secs: 1,
            },
            GatewayError::UpstreamFailure("f"),
            GatewayError::Unauthenticated("a"),
            GatewayError::PayloadTooLarge,
            GatewayError::Internal("i"),
        ];
        let mut codes: Vec<_> = variants.iter().map(GatewayError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), variants.len());
    }

    #[test]
    fn statuses_follow_taxonomy() {
        assert_eq!(GatewayError::Validation("x").status().as_u16(), 400);
        assert_eq!(GatewayError::NotFound("x").status().as_u16(), 404);
        assert_eq!(GatewayError::PolicyDenied("x").status().as_u16(), 403);
        assert_eq!(GatewayError::Unavailable("x").status().as_u16(), 503);
        assert_eq!(
            GatewayError::RateLimited {
                retry_after_secs: 3
            }
            .status()
            .as_u16(),
            429
        );
        assert_eq!(GatewayError::UpstreamFailure("x").status().as_u16(), 502);
        assert_eq!(GatewayError::Internal("x").status().as_u16(), 500);
    }
}
