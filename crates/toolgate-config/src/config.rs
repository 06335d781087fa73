// crates/toolgate-config/src/config.rs
// ============================================================================
// Module: Toolgate Configuration
// Description: Configuration loading and validation for the Toolgate gateway.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: toolgate-core, serde, toml, url
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Missing or invalid configuration fails closed: the gateway never starts on
//! a config it could not fully validate. Upstream and trust sections are
//! converted into the in-memory stores consumed by the gateway.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::env;
use std::fmt;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use toolgate_core::AgentTrustOverride;
use toolgate_core::AuthType;
use toolgate_core::CircuitBreakerConfig;
use toolgate_core::CredentialKey;
use toolgate_core::InMemoryServerStore;
use toolgate_core::InMemoryTrustPolicy;
use toolgate_core::Tier;
use toolgate_core::TrustDefault;
use toolgate_core::TrustRule;
use toolgate_core::UpstreamServer;
use toolgate_core::credential::decode_stored;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "toolgate.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "TOOLGATE_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default bind address for the HTTP listener.
const DEFAULT_BIND: &str = "127.0.0.1:8088";
/// Upper bound for `server.max_body_bytes`.
pub(crate) const MAX_BODY_BYTES_LIMIT: usize = 16 * 1024 * 1024;
/// Maximum number of configured bearer callers.
pub(crate) const MAX_AUTH_CALLERS: usize = 64;
/// Maximum length of a caller token.
pub(crate) const MAX_AUTH_TOKEN_LENGTH: usize = 256;
/// Default environment variable holding the credential key.
pub const DEFAULT_CREDENTIAL_KEY_ENV: &str = "TOOLGATE_CREDENTIAL_KEY";
/// Upper bound for `rate_limit.max_requests`.
pub(crate) const MAX_RATE_LIMIT_REQUESTS: u32 = 100_000;
/// Lower bound for `rate_limit.window_ms`.
pub(crate) const MIN_RATE_LIMIT_WINDOW_MS: u64 = 100;
/// Upper bound for `rate_limit.window_ms`.
pub(crate) const MAX_RATE_LIMIT_WINDOW_MS: u64 = 3_600_000;
/// Upper bound for forwarder timeouts.
pub(crate) const MAX_TIMEOUT_MS: u64 = 600_000;
/// Upper bound for `forwarder.max_response_bytes`.
pub(crate) const MAX_RESPONSE_BYTES_LIMIT: usize = 64 * 1024 * 1024;
/// Maximum number of upstream records.
pub(crate) const MAX_UPSTREAMS: usize = 256;
/// Maximum upstream label length.
pub(crate) const MAX_LABEL_LENGTH: usize = 128;
/// Maximum entries per trust table.
pub(crate) const MAX_TRUST_ENTRIES: usize = 4096;

// ============================================================================
// SECTION: Root Config
// ============================================================================

/// Toolgate configuration root.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolgateConfig {
    /// HTTP listener configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Credential key source.
    #[serde(default)]
    pub credentials: CredentialsConfig,
    /// Per-caller gateway rate limit.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Outbound HTTP forwarder settings.
    #[serde(default)]
    pub forwarder: ForwarderConfig,
    /// Audit sink selection.
    #[serde(default)]
    pub audit: AuditConfig,
    /// Upstream tool servers.
    #[serde(default)]
    pub upstreams: Vec<UpstreamConfig>,
    /// Trust policy tables.
    #[serde(default)]
    pub trust: TrustConfig,
}

impl ToolgateConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.credentials.validate()?;
        self.rate_limit.validate()?;
        self.forwarder.validate()?;
        self.audit.validate()?;
        if self.upstreams.len() > MAX_UPSTREAMS {
            return Err(ConfigError::Invalid("too many upstreams".to_string()));
        }
        let mut labels = BTreeSet::new();
        for upstream in &self.upstreams {
            upstream.validate()?;
            if !labels.insert(upstream.label.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "upstreams.label must be unique: {}",
                    upstream.label
                )));
            }
        }
        self.trust.validate()?;
        Ok(())
    }

    /// Returns true when any upstream needs a decrypted credential.
    #[must_use]
    pub fn requires_credential_key(&self) -> bool {
        self.upstreams.iter().any(|upstream| upstream.auth_type != AuthType::None)
    }

    /// Loads the credential key from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the key is required but missing, or set
    /// but not a base64-encoded 32-byte key.
    pub fn credential_key(&self) -> Result<Option<CredentialKey>, ConfigError> {
        self.credential_key_with(|name| env::var(name).ok())
    }

    /// Loads the credential key through a caller-supplied variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`ToolgateConfig::credential_key`].
    pub fn credential_key_with<F>(&self, lookup: F) -> Result<Option<CredentialKey>, ConfigError>
    where
        F: FnOnce(&str) -> Option<String>,
    {
        let name = self.credentials.key_env.trim();
        match lookup(name).filter(|value| !value.trim().is_empty()) {
            Some(value) => CredentialKey::from_base64(&value).map(Some).map_err(|_| {
                ConfigError::Invalid(format!("{name} must hold a base64-encoded 32-byte key"))
            }),
            None if self.requires_credential_key() => Err(ConfigError::Invalid(format!(
                "credentials.key_env: {name} is not set but an upstream requires a credential"
            ))),
            None => Ok(None),
        }
    }

    /// Builds the upstream server store from `[[upstreams]]`.
    #[must_use]
    pub fn server_store(&self) -> InMemoryServerStore {
        InMemoryServerStore::from_servers(self.upstreams.iter().map(UpstreamConfig::to_server))
    }

    /// Builds the trust policy from `[trust]`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the policy store rejects an entry.
    pub fn trust_policy(&self) -> Result<InMemoryTrustPolicy, ConfigError> {
        let policy = InMemoryTrustPolicy::new();
        let store_err = |err: toolgate_core::StoreError| ConfigError::Invalid(err.to_string());
        for entry in &self.trust.agent_overrides {
            policy
                .add_agent_override(AgentTrustOverride {
                    agent_id: entry.agent_id.clone(),
                    tool_name: entry.tool_name.clone(),
                    tier: entry.tier,
                })
                .map_err(store_err)?;
        }
        for rule in &self.trust.rules {
            policy
                .add_workspace_rule(
                    &rule.workspace_id,
                    TrustRule {
                        tool_pattern: rule.pattern.clone(),
                        tier: rule.tier,
                    },
                )
                .map_err(store_err)?;
        }
        for default in &self.trust.defaults {
            policy
                .add_default(TrustDefault {
                    tool_pattern: default.pattern.clone(),
                    tier: default.tier,
                    priority: default.priority,
                })
                .map_err(store_err)?;
        }
        Ok(policy)
    }
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the HTTP listener.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Inbound caller authentication.
    #[serde(default)]
    pub auth: ServerAuthConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
            auth: ServerAuthConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Parses the bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the address is not a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid("server.bind is not a valid address".to_string()))
    }

    /// Validates listener configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_body_bytes == 0 || self.max_body_bytes > MAX_BODY_BYTES_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "server.max_body_bytes must be between 1 and {MAX_BODY_BYTES_LIMIT}"
            )));
        }
        self.auth.validate()?;
        let addr = self.bind_addr()?;
        if !addr.ip().is_loopback() && self.auth.mode == ServerAuthMode::LocalOnly {
            return Err(ConfigError::Invalid(
                "non-loopback bind disallowed with local_only auth".to_string(),
            ));
        }
        Ok(())
    }
}

/// Inbound auth modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServerAuthMode {
    /// Loopback peers only; caller id is `loopback`.
    #[default]
    LocalOnly,
    /// Bearer tokens mapped to caller ids.
    BearerToken,
}

/// Inbound auth configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerAuthConfig {
    /// Auth mode.
    #[serde(default)]
    pub mode: ServerAuthMode,
    /// Callers accepted in `bearer_token` mode.
    #[serde(default)]
    pub callers: Vec<CallerConfig>,
}

impl ServerAuthConfig {
    /// Validates auth configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.callers.len() > MAX_AUTH_CALLERS {
            return Err(ConfigError::Invalid("too many server.auth.callers".to_string()));
        }
        match self.mode {
            ServerAuthMode::LocalOnly => {
                if !self.callers.is_empty() {
                    return Err(ConfigError::Invalid(
                        "server.auth.callers requires bearer_token mode".to_string(),
                    ));
                }
            }
            ServerAuthMode::BearerToken => {
                if self.callers.is_empty() {
                    return Err(ConfigError::Invalid(
                        "bearer_token mode requires at least one server.auth.callers entry"
                            .to_string(),
                    ));
                }
            }
        }
        let mut ids = BTreeSet::new();
        let mut tokens = BTreeSet::new();
        for caller in &self.callers {
            caller.validate()?;
            if !ids.insert(caller.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "server.auth.callers id must be unique: {}",
                    caller.id
                )));
            }
            if !tokens.insert(caller.token.as_str()) {
                return Err(ConfigError::Invalid(
                    "server.auth.callers tokens must be unique".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Bearer caller entry.
#[derive(Clone, Deserialize)]
pub struct CallerConfig {
    /// Caller id used as audit actor and rate-limit key component.
    pub id: String,
    /// Bearer token presented by the caller.
    pub token: String,
}

impl fmt::Debug for CallerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallerConfig")
            .field("id", &self.id)
            .field("token", &"[redacted]")
            .finish()
    }
}

impl CallerConfig {
    /// Validates a caller entry.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.id.trim().is_empty() || self.id.trim() != self.id {
            return Err(ConfigError::Invalid(
                "server.auth.callers id must be non-empty without surrounding whitespace"
                    .to_string(),
            ));
        }
        if self.id.contains(':') {
            return Err(ConfigError::Invalid(
                "server.auth.callers id must not contain ':'".to_string(),
            ));
        }
        let token = self.token.trim();
        if token.is_empty() {
            return Err(ConfigError::Invalid("server.auth.callers token must be set".to_string()));
        }
        if token.len() > MAX_AUTH_TOKEN_LENGTH {
            return Err(ConfigError::Invalid("server.auth.callers token too long".to_string()));
        }
        if token != self.token || token.chars().any(char::is_whitespace) {
            return Err(ConfigError::Invalid(
                "server.auth.callers token must not contain whitespace".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Credentials
// ============================================================================

/// Credential key source.
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialsConfig {
    /// Environment variable holding the base64 key.
    #[serde(default = "default_credential_key_env")]
    pub key_env: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            key_env: default_credential_key_env(),
        }
    }
}

impl CredentialsConfig {
    /// Validates the key variable name.
    fn validate(&self) -> Result<(), ConfigError> {
        let name = self.key_env.trim();
        if name.is_empty() {
            return Err(ConfigError::Invalid("credentials.key_env must be non-empty".to_string()));
        }
        if !name.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_') {
            return Err(ConfigError::Invalid(
                "credentials.key_env must be an environment variable name".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Rate Limit
// ============================================================================

/// Gateway rate limit per `(server, tool, caller)`.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum requests per window.
    #[serde(default = "default_rate_limit_max_requests")]
    pub max_requests: u32,
    /// Window duration in milliseconds.
    #[serde(default = "default_rate_limit_window_ms")]
    pub window_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_rate_limit_max_requests(),
            window_ms: default_rate_limit_window_ms(),
        }
    }
}

impl RateLimitConfig {
    /// Returns the window as a [`Duration`].
    #[must_use]
    pub const fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Validates rate limit settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_requests == 0 {
            return Err(ConfigError::Invalid(
                "rate_limit max_requests must be greater than zero".to_string(),
            ));
        }
        if self.max_requests > MAX_RATE_LIMIT_REQUESTS {
            return Err(ConfigError::Invalid("rate_limit max_requests too large".to_string()));
        }
        if self.window_ms < MIN_RATE_LIMIT_WINDOW_MS || self.window_ms > MAX_RATE_LIMIT_WINDOW_MS {
            return Err(ConfigError::Invalid(format!(
                "rate_limit window_ms must be between {MIN_RATE_LIMIT_WINDOW_MS} and \
                 {MAX_RATE_LIMIT_WINDOW_MS}",
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Forwarder
// ============================================================================

/// Outbound HTTP forwarder limits.
#[derive(Debug, Clone, Deserialize)]
pub struct ForwarderConfig {
    /// TCP connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Whole-request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Maximum upstream response body size in bytes.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            max_response_bytes: default_max_response_bytes(),
        }
    }
}

impl ForwarderConfig {
    /// Connect timeout as a [`Duration`].
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Request timeout as a [`Duration`].
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Validates forwarder limits.
    fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("forwarder.connect_timeout_ms", self.connect_timeout_ms),
            ("forwarder.request_timeout_ms", self.request_timeout_ms),
        ] {
            if value == 0 || value > MAX_TIMEOUT_MS {
                return Err(ConfigError::Invalid(format!(
                    "{field} must be between 1 and {MAX_TIMEOUT_MS}"
                )));
            }
        }
        if self.connect_timeout_ms > self.request_timeout_ms {
            return Err(ConfigError::Invalid(
                "forwarder.connect_timeout_ms must not exceed request_timeout_ms".to_string(),
            ));
        }
        if self.max_response_bytes == 0 || self.max_response_bytes > MAX_RESPONSE_BYTES_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "forwarder.max_response_bytes must be between 1 and {MAX_RESPONSE_BYTES_LIMIT}"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Audit sink selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to `audit.path`.
    File,
    /// Audit disabled.
    None,
}

/// Audit configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditConfig {
    /// Sink kind.
    #[serde(default)]
    pub sink: AuditSinkKind,
    /// Audit log path for the `file` sink.
    #[serde(default)]
    pub path: Option<String>,
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkKind::File, Some(path)) => validate_path_string("audit.path", path),
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("audit.path is required for the file sink".to_string()))
            }
            (_, Some(_)) => {
                Err(ConfigError::Invalid("audit.path is only valid with the file sink".to_string()))
            }
            (_, None) => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Upstreams
// ============================================================================

/// Upstream tool server entry.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Unique label used in proxy paths.
    pub label: String,
    /// Base URL (`http` or `https`).
    pub endpoint: String,
    /// Credential scheme.
    #[serde(default)]
    pub auth_type: AuthType,
    /// Base64 ciphertext produced by `toolgate credential encrypt`.
    #[serde(default)]
    pub auth_credential: Option<String>,
    /// Whether calls may be proxied.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Raw circuit breaker JSON (`{"fail_threshold":5,"open_duration_s":30}`).
    #[serde(default)]
    pub circuit_breaker: Option<String>,
}

impl UpstreamConfig {
    /// Converts the entry into a store record.
    #[must_use]
    pub fn to_server(&self) -> UpstreamServer {
        UpstreamServer {
            label: self.label.clone(),
            endpoint: self.endpoint.trim().to_string(),
            auth_type: self.auth_type,
            auth_credential: self.auth_credential.clone(),
            is_enabled: self.enabled,
            circuit_breaker_config: self.circuit_breaker.clone(),
        }
    }

    /// Validates an upstream entry.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_label(&self.label)?;
        let label = &self.label;
        let url = Url::parse(self.endpoint.trim()).map_err(|_| {
            ConfigError::Invalid(format!("upstreams[{label}].endpoint is not a valid url"))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "upstreams[{label}].endpoint must use http:// or https://"
            )));
        }
        if url.host_str().is_none() || url.cannot_be_a_base() {
            return Err(ConfigError::Invalid(format!(
                "upstreams[{label}].endpoint must include a host"
            )));
        }
        if !url.username().is_empty() || url.password().is_some() {
            return Err(ConfigError::Invalid(format!(
                "upstreams[{label}].endpoint must not embed credentials"
            )));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(ConfigError::Invalid(format!(
                "upstreams[{label}].endpoint must not include a query or fragment"
            )));
        }
        match (self.auth_type, self.auth_credential.as_deref()) {
            (AuthType::None, Some(_)) => {
                return Err(ConfigError::Invalid(format!(
                    "upstreams[{label}].auth_credential requires auth_type bearer or basic"
                )));
            }
            (AuthType::None, None) => {}
            (_, None) => {
                return Err(ConfigError::Invalid(format!(
                    "upstreams[{label}].auth_credential is required for auth_type {}",
                    self.auth_type.as_str()
                )));
            }
            (_, Some(stored)) => {
                decode_stored(stored).map_err(|_| {
                    ConfigError::Invalid(format!(
                        "upstreams[{label}].auth_credential must be base64 ciphertext"
                    ))
                })?;
            }
        }
        if let Some(raw) = &self.circuit_breaker {
            CircuitBreakerConfig::parse(Some(raw.as_str())).map_err(|err| {
                ConfigError::Invalid(format!("upstreams[{label}].circuit_breaker: {err}"))
            })?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Trust
// ============================================================================

/// Trust policy tables.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrustConfig {
    /// Global defaults, evaluated by ascending priority.
    #[serde(default)]
    pub defaults: Vec<TrustDefaultConfig>,
    /// Workspace-scoped rules, evaluated in file order.
    #[serde(default)]
    pub rules: Vec<TrustRuleConfig>,
    /// Exact per-agent overrides.
    #[serde(default)]
    pub agent_overrides: Vec<AgentOverrideConfig>,
}

impl TrustConfig {
    /// Validates trust tables.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.defaults.len() > MAX_TRUST_ENTRIES
            || self.rules.len() > MAX_TRUST_ENTRIES
            || self.agent_overrides.len() > MAX_TRUST_ENTRIES
        {
            return Err(ConfigError::Invalid("too many trust entries".to_string()));
        }
        for default in &self.defaults {
            require_non_empty("trust.defaults.pattern", &default.pattern)?;
        }
        for rule in &self.rules {
            require_non_empty("trust.rules.workspace_id", &rule.workspace_id)?;
            require_non_empty("trust.rules.pattern", &rule.pattern)?;
        }
        let mut pairs = BTreeSet::new();
        for entry in &self.agent_overrides {
            require_non_empty("trust.agent_overrides.agent_id", &entry.agent_id)?;
            require_non_empty("trust.agent_overrides.tool_name", &entry.tool_name)?;
            if !pairs.insert((entry.agent_id.as_str(), entry.tool_name.as_str())) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate trust.agent_overrides entry for {}/{}",
                    entry.agent_id, entry.tool_name
                )));
            }
        }
        Ok(())
    }
}

/// Global trust default entry.
#[derive(Debug, Clone, Deserialize)]
pub struct TrustDefaultConfig {
    /// Tool name glob.
    pub pattern: String,
    /// Tier on match.
    pub tier: Tier,
    /// Evaluation order (lower first).
    #[serde(default)]
    pub priority: i32,
}

/// Workspace trust rule entry.
#[derive(Debug, Clone, Deserialize)]
pub struct TrustRuleConfig {
    /// Workspace the rule belongs to.
    pub workspace_id: String,
    /// Tool name glob.
    pub pattern: String,
    /// Tier on match.
    pub tier: Tier,
}

/// Agent override entry.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentOverrideConfig {
    /// Agent id.
    pub agent_id: String,
    /// Exact tool name.
    pub tool_name: String,
    /// Tier for the pair.
    pub tier: Tier,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a configured file path string.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates an upstream label; labels appear in URL paths and rate-limit keys.
fn validate_label(label: &str) -> Result<(), ConfigError> {
    if label.is_empty() {
        return Err(ConfigError::Invalid("upstreams.label must be non-empty".to_string()));
    }
    if label.len() > MAX_LABEL_LENGTH {
        return Err(ConfigError::Invalid(format!("upstreams.label too long: {label}")));
    }
    if !label.chars().all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.')) {
        return Err(ConfigError::Invalid(format!(
            "upstreams.label may only contain [A-Za-z0-9._-]: {label}"
        )));
    }
    Ok(())
}

/// Rejects blank strings.
fn require_non_empty(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    Ok(())
}

/// Default bind address.
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

/// Default maximum request body size in bytes.
pub(crate) const fn default_max_body_bytes() -> usize {
    1024 * 1024
}

/// Default credential key variable.
fn default_credential_key_env() -> String {
    DEFAULT_CREDENTIAL_KEY_ENV.to_string()
}

/// Default max requests per rate limit window.
pub(crate) const fn default_rate_limit_max_requests() -> u32 {
    60
}

/// Default rate limit window in milliseconds.
pub(crate) const fn default_rate_limit_window_ms() -> u64 {
    60_000
}

/// Default forwarder connect timeout.
pub(crate) const fn default_connect_timeout_ms() -> u64 {
    2_000
}

/// Default forwarder request timeout.
pub(crate) const fn default_request_timeout_ms() -> u64 {
    30_000
}

/// Default upstream response size cap.
pub(crate) const fn default_max_response_bytes() -> usize {
    4 * 1024 * 1024
}

/// Upstreams are enabled unless stated otherwise.
const fn default_enabled() -> bool {
    true
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use super::*;

    #[test]
    fn validate_path_string_rejects_blank() {
        let result = validate_path_string("audit.path", "   ");
        assert!(result.unwrap_err().to_string().contains("audit.path must be non-empty"));
    }

    #[test]
    fn validate_path_string_rejects_component_too_long() {
        let path = format!("./{}", "a".repeat(MAX_PATH_COMPONENT_LENGTH + 1));
        let result = validate_path_string("audit.path", &path);
        assert!(result.unwrap_err().to_string().contains("component too long"));
    }

    #[test]
    fn labels_reject_path_separators() {
        assert!(validate_label("github").is_ok());
        assert!(validate_label("git.hub-2_x").is_ok());
        assert!(validate_label("a/b").is_err());
        assert!(validate_label("has space").is_err());
        assert!(validate_label("").is_err());
    }

    #[test]
    fn resolve_path_prefers_explicit_path() {
        let resolved = resolve_path(Some(Path::new("custom.toml"))).unwrap();
        assert_eq!(resolved, PathBuf::from("custom.toml"));
    }
}
