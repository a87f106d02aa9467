//! Execution entries, results and the remote backend seam.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{config::Config, language::Language, source::SourceSnapshot};

pub mod piston;

pub const STOPPED_MESSAGE: &str = "Execution stopped by user";
pub const SUPERSEDED_MESSAGE: &str = "Execution superseded by a new run";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(Uuid);

impl EntryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Running,
    Completed,
    Error,
}

impl EntryStatus {
    pub fn is_terminal(&self) -> bool {
        *self != Self::Running
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Running => "Running",
            Self::Completed => "Completed",
            Self::Error => "Error",
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Outcome of one remote run. `stdout`/`stderr` are trimmed when the result
/// is built and never again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub elapsed_ms: u64,
}

impl ExecutionResult {
    pub fn failure(message: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            stdout: String::new(),
            stderr: message.into(),
            exit_code: 1,
            elapsed_ms,
        }
    }

    pub fn status(&self) -> EntryStatus {
        classify(self)
    }
}

/// `Completed` only for exit code 0 with nothing on stderr.
pub fn classify(result: &ExecutionResult) -> EntryStatus {
    if result.exit_code == 0 && result.stderr.is_empty() {
        EntryStatus::Completed
    } else {
        EntryStatus::Error
    }
}

/// One tracked attempt to run a snapshot of source code.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionEntry {
    id: EntryId,
    timestamp: DateTime<Local>,
    source_text: String,
    stdin: String,
    language: Language,
    filename: String,
    status: EntryStatus,
    result: Option<ExecutionResult>,
}

impl ExecutionEntry {
    pub(crate) fn start(snapshot: &SourceSnapshot, stdin: &str) -> Self {
        Self {
            id: EntryId::new(),
            timestamp: Local::now(),
            source_text: snapshot.text.clone(),
            stdin: stdin.to_string(),
            language: snapshot.language(),
            filename: snapshot.filename.clone(),
            status: EntryStatus::Running,
            result: None,
        }
    }

    /// Move a running entry to its terminal state. Returns `false` (and
    /// changes nothing) if the entry has already settled.
    pub(crate) fn settle(&mut self, result: ExecutionResult) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = classify(&result);
        self.result = Some(result);
        true
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    pub fn stdin(&self) -> &str {
        &self.stdin
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn status(&self) -> EntryStatus {
        self.status
    }

    pub fn result(&self) -> Option<&ExecutionResult> {
        self.result.as_ref()
    }

    pub fn elapsed_since_start_ms(&self) -> u64 {
        (Local::now() - self.timestamp).num_milliseconds().max(0) as u64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    #[error("Language not supported for file: {filename}")]
    Unsupported { filename: String },
    #[error("Execution request failed: {0}")]
    Transport(String),
    #[error("Invalid response from execution service: {0}")]
    Decode(String),
    #[error("{}", STOPPED_MESSAGE)]
    Cancelled,
}

/// Compile/run budgets passed to the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionLimits {
    pub compile_timeout_ms: u64,
    pub run_timeout_ms: u64,
    pub compile_memory_limit: i64,
    pub run_memory_limit: i64,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            compile_timeout_ms: 10_000,
            run_timeout_ms: 3_000,
            compile_memory_limit: -1,
            run_memory_limit: -1,
        }
    }
}

impl ExecutionLimits {
    pub fn from_config(cfg: &Config) -> Self {
        let defaults = Self::default();
        Self {
            compile_timeout_ms: cfg.get_u64("COMPILE_TIMEOUT").unwrap_or(defaults.compile_timeout_ms),
            run_timeout_ms: cfg.get_u64("RUN_TIMEOUT").unwrap_or(defaults.run_timeout_ms),
            ..defaults
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFilePayload {
    pub name: String,
    pub content: String,
}

/// Request body for `POST /execute`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionRequest {
    pub language: String,
    pub version: String,
    pub files: Vec<SourceFilePayload>,
    pub stdin: String,
    pub args: Vec<String>,
    pub compile_timeout: u64,
    pub run_timeout: u64,
    pub compile_memory_limit: i64,
    pub run_memory_limit: i64,
}

impl ExecutionRequest {
    pub fn new(language: Language, source: &str, stdin: &str, limits: &ExecutionLimits) -> Self {
        Self {
            language: language.token().to_string(),
            version: "*".to_string(),
            files: vec![SourceFilePayload {
                name: language.synthetic_filename(),
                content: source.to_string(),
            }],
            stdin: stdin.to_string(),
            args: Vec::new(),
            compile_timeout: limits.compile_timeout_ms,
            run_timeout: limits.run_timeout_ms,
            compile_memory_limit: limits.compile_memory_limit,
            run_memory_limit: limits.run_memory_limit,
        }
    }
}

#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult, ExecError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(stderr: &str, exit_code: i32) -> ExecutionResult {
        ExecutionResult { stdout: "out".into(), stderr: stderr.into(), exit_code, elapsed_ms: 5 }
    }

    #[test]
    fn classification_is_strict() {
        assert_eq!(classify(&result("", 0)), EntryStatus::Completed);
        assert_eq!(classify(&result("warning", 0)), EntryStatus::Error);
        assert_eq!(classify(&result("", 2)), EntryStatus::Error);
        assert_eq!(classify(&result("boom", 1)), EntryStatus::Error);
        assert_eq!(classify(&result("", -1)), EntryStatus::Error);
    }

    #[test]
    fn entry_settles_once() {
        let snap = SourceSnapshot::new("main.py", "print(1)");
        let mut entry = ExecutionEntry::start(&snap, "");
        assert_eq!(entry.status(), EntryStatus::Running);
        assert!(entry.result().is_none());

        assert!(entry.settle(result("", 0)));
        assert_eq!(entry.status(), EntryStatus::Completed);
        assert!(!entry.settle(ExecutionResult::failure(STOPPED_MESSAGE, 1)));
        assert_eq!(entry.status(), EntryStatus::Completed);
        assert_eq!(entry.result().map(|r| r.stdout.as_str()), Some("out"));
    }

    #[test]
    fn request_carries_wire_fields() {
        let req = ExecutionRequest::new(Language::Java, "class Main {}", "5\n", &ExecutionLimits::default());
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["language"], "java");
        assert_eq!(v["version"], "*");
        assert_eq!(v["files"][0]["name"], "Main.java");
        assert_eq!(v["files"][0]["content"], "class Main {}");
        assert_eq!(v["stdin"], "5\n");
        assert_eq!(v["args"], serde_json::json!([]));
        assert_eq!(v["compile_timeout"], 10000);
        assert_eq!(v["run_timeout"], 3000);
        assert_eq!(v["compile_memory_limit"], -1);
        assert_eq!(v["run_memory_limit"], -1);
    }

    #[test]
    fn limits_read_config() {
        let cfg = Config::from_pairs([("COMPILE_TIMEOUT", "2000"), ("RUN_TIMEOUT", "bogus")]);
        let limits = ExecutionLimits::from_config(&cfg);
        assert_eq!(limits.compile_timeout_ms, 2000);
        assert_eq!(limits.run_timeout_ms, 3000);
    }

    #[test]
    fn cancelled_error_uses_stop_message() {
        assert_eq!(ExecError::Cancelled.to_string(), STOPPED_MESSAGE);
        let e = ExecError::Unsupported { filename: "main.ts".into() };
        assert!(e.to_string().contains("not supported"));
    }
}
