// crates/toolgate-gateway/src/audit.rs
// ============================================================================
// Module: Audit Sinks
// Description: JSON-lines audit sinks for gateway tool calls.
// Purpose: Persist one audit entry per proxied call that reached a server.
// Dependencies: async-trait, serde_json, tokio, toolgate-core
// ============================================================================

//! ## Overview
//! Sinks write one JSON object per line through tokio's async I/O, so a
//! detached audit task never blocks a runtime worker. The gateway dispatches
//! entries off the response path; a slow or failing sink never changes a
//! response.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use toolgate_config::AuditConfig;
use toolgate_config::AuditSinkKind;
use toolgate_core::AuditEntry;
use toolgate_core::AuditError;
use toolgate_core::AuditSink;

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

#[async_trait]
impl AuditSink for StderrAuditSink {
    async fn record(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        let line = encode_line(entry)?;
        let mut stderr = tokio::io::stderr();
        stderr.write_all(line.as_bytes()).await.map_err(write_error)?;
        stderr.flush().await.map_err(write_error)
    }
}

/// Audit sink that appends JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging; the lock keeps lines whole.
    file: Mutex<File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(File::from_std(file)),
        })
    }
}

#[async_trait]
impl AuditSink for FileAuditSink {
    async fn record(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        let line = encode_line(entry)?;
        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await.map_err(write_error)?;
        file.flush().await.map_err(write_error)
    }
}

/// Builds the configured sink; `None` when audit is disabled.
///
/// # Errors
///
/// Returns an error when the file sink cannot be opened.
pub fn audit_sink_from_config(config: &AuditConfig) -> io::Result<Option<Arc<dyn AuditSink>>> {
    match config.sink {
        AuditSinkKind::Stderr => Ok(Some(Arc::new(StderrAuditSink))),
        AuditSinkKind::None => Ok(None),
        AuditSinkKind::File => {
            let path = config.path.as_deref().ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, "audit.path is required for the file sink")
            })?;
            Ok(Some(Arc::new(FileAuditSink::open(Path::new(path))?)))
        }
    }
}

/// Maps an I/O failure to an audit write error.
fn write_error(err: io::Error) -> AuditError {
    AuditError::Write(err.to_string())
}

/// Serializes an entry to a single newline-terminated JSON line.
fn encode_line(entry: &AuditEntry) -> Result<String, AuditError> {
    let mut line =
        serde_json::to_string(entry).map_err(|err| AuditError::Serialization(err.to_string()))?;
    line.push('\n');
    Ok(line)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use std::fs;
    use std::sync::Arc;

    use tempfile::TempDir;
    use toolgate_config::AuditConfig;
    use toolgate_config::AuditSinkKind;
    use toolgate_core::AuditDetails;
    use toolgate_core::AuditEntry;
    use toolgate_core::ProxyOutcome;

    use super::FileAuditSink;
    use super::audit_sink_from_config;

    fn entry(outcome: ProxyOutcome) -> AuditEntry {
        AuditEntry::tool_call(
            "alice",
            "search",
            "lookup",
            AuditDetails {
                outcome,
                latency_ms: 12,
                upstream_status: Some(200),
            },
        )
    }

    #[tokio::test]
    async fn file_sink_appends_one_json_line_per_entry() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.jsonl");
        let sink = FileAuditSink::open(&path).unwrap();
        toolgate_core::AuditSink::record(&sink, &entry(ProxyOutcome::Success)).await.unwrap();
        toolgate_core::AuditSink::record(&sink, &entry(ProxyOutcome::Upstream5xx)).await.unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["action"], "gateway_tool_call");
        assert_eq!(first["resource_id"], "search/lookup");
        assert_eq!(first["details"]["outcome"], "success");
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["details"]["outcome"], "upstream_5xx");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_file_writes_keep_lines_whole() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.jsonl");
        let sink = Arc::new(FileAuditSink::open(&path).unwrap());
        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let sink = Arc::clone(&sink);
                tokio::spawn(async move {
                    toolgate_core::AuditSink::record(sink.as_ref(), &entry(ProxyOutcome::Success))
                        .await
                        .unwrap();
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 32);
        for line in lines {
            let parsed: serde_json::Value = serde_json::from_str(line).unwrap();
            assert_eq!(parsed["actor"], "alice");
        }
    }

    #[test]
    fn none_sink_disables_audit() {
        let config = AuditConfig {
            sink: AuditSinkKind::None,
            path: None,
        };
        assert!(audit_sink_from_config(&config).unwrap().is_none());
    }

    #[test]
    fn file_sink_without_path_is_rejected() {
        let config = AuditConfig {
            sink: AuditSinkKind::File,
            path: None,
        };
        assert!(audit_sink_from_config(&config).is_err());
    }
}
