// crates/toolgate-cli/src/main.rs
// ============================================================================
// Module: Toolgate CLI Entry Point
// Description: Command dispatcher for the gateway server and operator tasks.
// Purpose: Run the gateway, validate configs, and seal upstream credentials.
// Dependencies: clap, tokio, toolgate-config, toolgate-core, toolgate-gateway,
// tracing-subscriber
// ============================================================================

//! ## Overview
//! `toolgate serve` loads and validates configuration, then runs the gateway
//! until Ctrl+C or SIGTERM. `toolgate config validate` checks a config file
//! without binding. `toolgate credential encrypt` reads a secret from stdin
//! and prints the base64 ciphertext for an upstream's `auth_credential`.

// ============================================================================
// SECTION: Modules
// ============================================================================

#[cfg(test)]
mod main_tests;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Read;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use thiserror::Error;
use toolgate_config::DEFAULT_CREDENTIAL_KEY_ENV;
use toolgate_config::ToolgateConfig;
use toolgate_core::CredentialKey;
use toolgate_core::credential;
use toolgate_gateway::GatewayServer;
use tracing_subscriber::EnvFilter;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum size of a secret read from stdin.
const MAX_SECRET_BYTES: usize = 8 * 1024;
/// Log filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "info";

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "toolgate", version, disable_help_subcommand = true)]
struct Cli {
    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Log output formats.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per line.
    Json,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the gateway HTTP server.
    Serve(ServeCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Upstream credential utilities.
    Credential {
        /// Selected credential subcommand.
        #[command(subcommand)]
        command: CredentialCommand,
    },
}

/// Arguments for `serve`.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Config file path (overrides `TOOLGATE_CONFIG`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load and validate a config file.
    Validate(ConfigValidateCommand),
}

/// Arguments for `config validate`.
#[derive(Args, Debug)]
struct ConfigValidateCommand {
    /// Config file path (overrides `TOOLGATE_CONFIG`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Credential subcommands.
#[derive(Subcommand, Debug)]
enum CredentialCommand {
    /// Encrypt a secret read from stdin.
    Encrypt(CredentialEncryptCommand),
}

/// Arguments for `credential encrypt`.
#[derive(Args, Debug)]
struct CredentialEncryptCommand {
    /// Environment variable holding the base64 credential key.
    #[arg(long, value_name = "VAR", default_value = DEFAULT_CREDENTIAL_KEY_ENV)]
    key_env: String,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(command) => {
            init_tracing(cli.log_format)?;
            command_serve(command).await
        }
        Commands::Config {
            command: ConfigCommand::Validate(command),
        } => command_config_validate(&command),
        Commands::Credential {
            command: CredentialCommand::Encrypt(command),
        } => command_credential_encrypt(&command),
    }
}

/// Installs the global tracing subscriber on stderr.
fn init_tracing(format: LogFormat) -> CliResult<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    let result = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    result.map_err(|err| CliError::new(format!("logging init failed: {err}")))
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Executes the `serve` command.
async fn command_serve(command: ServeCommand) -> CliResult<ExitCode> {
    let config = ToolgateConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    let server = GatewayServer::from_config(&config)
        .map_err(|err| CliError::new(format!("gateway init failed: {err}")))?;
    tracing::info!(
        bind = %server.bind_addr(),
        upstreams = config.upstreams.len(),
        "starting gateway"
    );
    server
        .serve(shutdown_signal())
        .await
        .map_err(|err| CliError::new(format!("gateway failed: {err}")))?;
    tracing::info!("gateway stopped");
    Ok(ExitCode::SUCCESS)
}

/// Executes `config validate`.
fn command_config_validate(command: &ConfigValidateCommand) -> CliResult<ExitCode> {
    let config = ToolgateConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("config invalid: {err}")))?;
    write_stdout_line(&validation_summary(&config))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `credential encrypt`.
fn command_credential_encrypt(command: &CredentialEncryptCommand) -> CliResult<ExitCode> {
    let key_text = std::env::var(&command.key_env).ok();
    let secret = read_secret(std::io::stdin().lock())?;
    let sealed = seal_secret(&secret, key_text.as_deref(), &command.key_env)?;
    write_stdout_line(&sealed).map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// One-line summary printed by `config validate`.
fn validation_summary(config: &ToolgateConfig) -> String {
    let enabled = config.upstreams.iter().filter(|upstream| upstream.enabled).count();
    format!(
        "config ok: {} upstream(s), {enabled} enabled, bind {}",
        config.upstreams.len(),
        config.server.bind
    )
}

/// Reads a secret from `reader`, stripping one trailing line ending.
fn read_secret(reader: impl Read) -> CliResult<String> {
    let mut buffer = Vec::new();
    let limit = u64::try_from(MAX_SECRET_BYTES).unwrap_or(u64::MAX).saturating_add(1);
    reader
        .take(limit)
        .read_to_end(&mut buffer)
        .map_err(|err| CliError::new(format!("failed to read secret from stdin: {err}")))?;
    if buffer.len() > MAX_SECRET_BYTES {
        return Err(CliError::new(format!("secret exceeds {MAX_SECRET_BYTES} bytes")));
    }
    let text = String::from_utf8(buffer)
        .map_err(|_| CliError::new("secret must be utf-8".to_string()))?;
    let trimmed = text
        .strip_suffix("\r\n")
        .or_else(|| text.strip_suffix('\n'))
        .unwrap_or(&text)
        .to_string();
    if trimmed.is_empty() {
        return Err(CliError::new("secret is empty".to_string()));
    }
    Ok(trimmed)
}

/// Seals `secret` under the key held in `key_env`.
fn seal_secret(secret: &str, key_text: Option<&str>, key_env: &str) -> CliResult<String> {
    let key_text = key_text
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .ok_or_else(|| CliError::new(format!("{key_env} is not set")))?;
    let key = CredentialKey::from_base64(key_text).map_err(|_| {
        CliError::new(format!("{key_env} must hold a base64-encoded 32-byte key"))
    })?;
    credential::seal_to_base64(secret, &key)
        .map_err(|err| CliError::new(format!("encryption failed: {err}")))
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
