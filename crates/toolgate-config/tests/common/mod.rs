// crates/toolgate-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config validation tests.
// Purpose: Reduce duplication across integration tests for toolgate-config.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use toolgate_config::ConfigError;
use toolgate_config::ToolgateConfig;

/// Test result alias used across suites.
pub type TestResult = Result<(), String>;

/// Parses a TOML string into a `ToolgateConfig` for tests.
pub fn config_from_toml(toml_str: &str) -> Result<ToolgateConfig, toml::de::Error> {
    toml::from_str(toml_str)
}

/// Returns a minimal config with all defaults applied.
pub fn minimal_config() -> Result<ToolgateConfig, toml::de::Error> {
    config_from_toml("")
}

/// Base64 text of a 32-byte all-zero key.
pub fn zero_key_base64() -> String {
    format!("{}=", "A".repeat(43))
}

/// Asserts that a validation result is an error containing `needle`.
pub fn assert_invalid(result: Result<(), ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error '{message}' did not contain '{needle}'"))
            }
        }
        Ok(()) => Err("expected invalid config".to_string()),
    }
}
