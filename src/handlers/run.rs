//! One-shot run: submit the file once, print the entry, report its exit code.

use std::path::Path;

use anyhow::{anyhow, Result};
use owo_colors::OwoColorize;

use crate::config::Config;
use crate::execution::{piston::PistonClient, ExecutionBackend, ExecutionEntry};
use crate::printer::{print_entry_json, EntryPrinter};
use crate::session::ExecutionSession;
use crate::source::SourceSnapshot;

pub struct RunHandler;

impl RunHandler {
    /// Returns the process exit code the CLI should finish with.
    pub async fn run(cfg: &Config, path: &Path, stdin: &str, json: bool, color: bool) -> Result<i32> {
        let backend = PistonClient::from_config(cfg)?;
        let snapshot = SourceSnapshot::load(path)?;

        if stdin.is_empty() && snapshot.needs_stdin() && !json {
            let note = format!("note: {} looks like it reads stdin, but none was given", snapshot.filename);
            if color {
                eprintln!("{}", note.yellow());
            } else {
                eprintln!("{}", note);
            }
        }

        let entry = Self::execute(&backend, ExecutionSession::from_config(cfg), &snapshot, stdin).await?;
        if json {
            print_entry_json(&entry)?;
        } else {
            EntryPrinter { color }.print(&entry);
        }
        Ok(entry.result().map(|r| r.exit_code).unwrap_or(1))
    }

    /// Run `snapshot` to completion on `backend` and hand back its entry.
    pub async fn execute<B>(
        backend: &B,
        mut session: ExecutionSession,
        snapshot: &SourceSnapshot,
        stdin: &str,
    ) -> Result<ExecutionEntry>
    where
        B: ExecutionBackend + ?Sized,
    {
        let id = session.run(backend, snapshot, stdin).await;
        session
            .entry(id)
            .cloned()
            .ok_or_else(|| anyhow!("run {} left no entry", id))
    }
}
