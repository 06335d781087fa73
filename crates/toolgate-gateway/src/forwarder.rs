// crates/toolgate-gateway/src/forwarder.rs
// ============================================================================
// Module: HTTP Forwarder
// Description: reqwest-backed Forwarder for upstream MCP tool servers.
// Purpose: Deliver one tool call per request with strict size and time limits.
// Dependencies: base64, reqwest, serde_json, toolgate-core
// ============================================================================

//! ## Overview
//! [`HttpForwarder`] POSTs the call arguments to `{endpoint}/tools/{tool}`.
//! Redirects are never followed. Response bodies are read chunk by chunk
//! against a hard byte limit. HTTP error statuses come back as ordinary
//! [`ForwardResponse`] values; only transport failures are errors.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use reqwest::Url;
use reqwest::header::AUTHORIZATION;
use reqwest::header::HeaderValue;
use reqwest::redirect::Policy;
use serde_json::Value;
use toolgate_config::ForwarderConfig;
use toolgate_core::AuthType;
use toolgate_core::ForwardError;
use toolgate_core::ForwardResponse;
use toolgate_core::Forwarder;
use toolgate_core::ProxyRequest;
use toolgate_core::UpstreamCredential;

// ============================================================================
// SECTION: Forwarder
// ============================================================================

/// Forwarder that calls upstream tool servers over HTTP.
#[derive(Debug, Clone)]
pub struct HttpForwarder {
    /// Shared HTTP client.
    client: Client,
    /// Maximum upstream response size.
    max_response_bytes: usize,
}

impl HttpForwarder {
    /// Builds a forwarder from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ForwardError::Transport`] when the HTTP client cannot be built.
    pub fn new(config: &ForwarderConfig) -> Result<Self, ForwardError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .redirect(Policy::none())
            .build()
            .map_err(|err| ForwardError::Transport(err.to_string()))?;
        Ok(Self {
            client,
            max_response_bytes: config.max_response_bytes,
        })
    }
}

#[async_trait]
impl Forwarder for HttpForwarder {
    async fn forward(&self, request: &ProxyRequest) -> Result<ForwardResponse, ForwardError> {
        let url = tool_url(&request.endpoint, &request.tool_name)?;
        let mut builder = self.client.post(url).json(&request.arguments);
        if let Some(credential) = &request.credential
            && let Some(header) = authorization_header(credential)?
        {
            builder = builder.header(AUTHORIZATION, header);
        }
        let response = builder.send().await.map_err(map_transport_error)?;
        let status_code = response.status().as_u16();
        let bytes = read_response_body_with_limit(response, self.max_response_bytes).await?;
        Ok(ForwardResponse {
            status_code,
            body: decode_body(&bytes),
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds `{endpoint}/tools/{tool_name}` with the tool as one path segment.
///
/// # Errors
///
/// Returns [`ForwardError::InvalidRequest`] when the endpoint is not a base URL.
pub fn tool_url(endpoint: &str, tool_name: &str) -> Result<Url, ForwardError> {
    let mut url = Url::parse(endpoint)
        .map_err(|err| ForwardError::InvalidRequest(format!("invalid endpoint: {err}")))?;
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|()| ForwardError::InvalidRequest("endpoint cannot be a base".to_string()))?;
        segments.pop_if_empty().push("tools").push(tool_name);
    }
    Ok(url)
}

/// Renders the `Authorization` header for a credential.
fn authorization_header(
    credential: &UpstreamCredential,
) -> Result<Option<HeaderValue>, ForwardError> {
    let value = match credential.scheme {
        AuthType::None => return Ok(None),
        AuthType::Bearer => format!("Bearer {}", credential.secret.expose()),
        AuthType::Basic => format!("Basic {}", STANDARD.encode(credential.secret.expose())),
    };
    let mut header = HeaderValue::from_str(&value)
        .map_err(|_| ForwardError::InvalidRequest("credential is not a valid header".to_string()))?;
    header.set_sensitive(true);
    Ok(Some(header))
}

/// Classifies reqwest failures.
fn map_transport_error(err: reqwest::Error) -> ForwardError {
    if err.is_timeout() {
        ForwardError::Timeout
    } else {
        ForwardError::Transport(err.without_url().to_string())
    }
}

/// Reads a response body while enforcing a hard byte limit.
async fn read_response_body_with_limit(
    mut response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, ForwardError> {
    let mut body = Vec::new();
    let mut total: usize = 0;
    while let Some(chunk) = response.chunk().await.map_err(map_transport_error)? {
        let next_total =
            total.checked_add(chunk.len()).ok_or(ForwardError::ResponseTooLarge(limit))?;
        if next_total > limit {
            return Err(ForwardError::ResponseTooLarge(limit));
        }
        body.extend_from_slice(&chunk);
        total = next_total;
    }
    Ok(body)
}

/// JSON passes through; other bodies become a JSON string; empty is null.
fn decode_body(bytes: &[u8]) -> Value {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
