// crates/toolgate-cli/src/main_tests.rs
// ============================================================================
// Module: CLI Tests
// Description: Argument parsing and credential helper tests.
// Purpose: Keep operator-facing commands stable and fail closed.
// Dependencies: clap, tempfile, toolgate-core
// ============================================================================

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only assertions use unwrap and debug output for clarity."
)]

use std::fs;

use clap::Parser;
use tempfile::TempDir;
use toolgate_config::ToolgateConfig;
use toolgate_core::CredentialKey;
use toolgate_core::credential;

use super::Cli;
use super::Commands;
use super::ConfigCommand;
use super::CredentialCommand;
use super::LogFormat;
use super::read_secret;
use super::seal_secret;
use super::validation_summary;

const KEY_B64: &str = "AQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQE=";

#[test]
fn serve_accepts_config_and_log_format() {
    let cli =
        Cli::try_parse_from(["toolgate", "--log-format", "json", "serve", "--config", "gw.toml"])
            .unwrap();
    assert_eq!(cli.log_format, LogFormat::Json);
    match cli.command {
        Commands::Serve(command) => {
            assert_eq!(command.config.unwrap().to_str(), Some("gw.toml"));
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn credential_encrypt_defaults_key_env() {
    let cli = Cli::try_parse_from(["toolgate", "credential", "encrypt"]).unwrap();
    match cli.command {
        Commands::Credential {
            command: CredentialCommand::Encrypt(command),
        } => assert_eq!(command.key_env, "TOOLGATE_CREDENTIAL_KEY"),
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn config_validate_parses() {
    let cli = Cli::try_parse_from(["toolgate", "config", "validate"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Config {
            command: ConfigCommand::Validate(_)
        }
    ));
}

#[test]
fn unknown_log_format_is_rejected() {
    assert!(Cli::try_parse_from(["toolgate", "--log-format", "xml", "serve"]).is_err());
}

#[test]
fn read_secret_strips_one_line_ending() {
    assert_eq!(read_secret(&b"hunter2\n"[..]).unwrap(), "hunter2");
    assert_eq!(read_secret(&b"hunter2\r\n"[..]).unwrap(), "hunter2");
    assert_eq!(read_secret(&b"  spaced  \n\n"[..]).unwrap(), "  spaced  \n");
}

#[test]
fn read_secret_rejects_empty_and_oversized() {
    assert!(read_secret(&b"\n"[..]).is_err());
    assert!(read_secret(&b""[..]).is_err());
    let big = vec![b'x'; 8 * 1024 + 1];
    assert!(read_secret(big.as_slice()).is_err());
    assert!(read_secret(&[0xff_u8, 0xfe][..]).is_err());
}

#[test]
fn sealed_secret_opens_with_same_key() {
    let sealed = seal_secret("user:pass", Some(KEY_B64), "TOOLGATE_CREDENTIAL_KEY").unwrap();
    let key = CredentialKey::from_base64(KEY_B64).unwrap();
    assert_eq!(credential::open_stored(&sealed, &key).unwrap().expose(), "user:pass");
}

#[test]
fn seal_secret_requires_valid_key() {
    let missing = seal_secret("s", None, "MY_KEY").unwrap_err();
    assert!(missing.to_string().contains("MY_KEY is not set"));
    let short = seal_secret("s", Some("AAAA"), "MY_KEY").unwrap_err();
    assert!(short.to_string().contains("32-byte key"));
}

#[test]
fn validation_summary_counts_enabled_upstreams() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("toolgate.toml");
    fs::write(
        &path,
        r#"
        [[upstreams]]
        label = "search"
        endpoint = "http://127.0.0.1:9100"

        [[upstreams]]
        label = "archive"
        endpoint = "http://127.0.0.1:9200"
        enabled = false
        "#,
    )
    .unwrap();
    let config = ToolgateConfig::load(Some(&path)).unwrap();
    assert_eq!(
        validation_summary(&config),
        "config ok: 2 upstream(s), 1 enabled, bind 127.0.0.1:8088"
    );
}
