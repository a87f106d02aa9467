//! Printers: execution entries (owo-colors) and markdown (termimad).

use std::fmt::Write as _;

use owo_colors::OwoColorize;
use termimad::MadSkin;

use crate::{
    execution::{EntryStatus, ExecutionEntry},
    language::Language,
};

/// One-line summary used by both the CLI and the console.
pub fn entry_header(entry: &ExecutionEntry) -> String {
    let mut header = format!(
        "{} · {} · {}",
        entry.filename(),
        entry.language().display_name(),
        entry.status().label()
    );
    if let Some(result) = entry.result() {
        let _ = write!(header, " · {} ms", result.elapsed_ms);
    }
    header
}

pub struct EntryPrinter {
    pub color: bool,
}

impl EntryPrinter {
    pub fn print(&self, entry: &ExecutionEntry) {
        print!("{}", self.render(entry));
    }

    pub fn render(&self, entry: &ExecutionEntry) -> String {
        let mut out = String::new();
        let header = entry_header(entry);
        if self.color {
            let colored = match entry.status() {
                EntryStatus::Running => header.yellow().to_string(),
                EntryStatus::Completed => header.green().to_string(),
                EntryStatus::Error => header.red().to_string(),
            };
            let _ = writeln!(out, "{}", colored);
        } else {
            let _ = writeln!(out, "{}", header);
        }

        if !entry.stdin().is_empty() {
            let _ = writeln!(out, "--- stdin ---\n{}", entry.stdin().trim_end_matches('\n'));
        }
        if let Some(result) = entry.result() {
            if !result.stdout.is_empty() {
                let _ = writeln!(out, "{}", result.stdout);
            }
            if !result.stderr.is_empty() {
                if self.color {
                    let _ = writeln!(out, "{}", result.stderr.red());
                } else {
                    let _ = writeln!(out, "{}", result.stderr);
                }
            }
            let _ = writeln!(out, "exit code: {}", result.exit_code);
        }
        out
    }
}

pub fn print_entry_json(entry: &ExecutionEntry) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(entry)?);
    Ok(())
}

pub fn language_table() -> String {
    let mut out = String::new();
    for lang in Language::all() {
        let exts: Vec<String> = lang.extensions().iter().map(|e| format!(".{}", e)).collect();
        let _ = writeln!(out, "{:<12} {:<11} {}", lang.display_name(), lang.token(), exts.join(" "));
    }
    out
}

pub struct MarkdownPrinter {
    pub skin: MadSkin,
}

impl Default for MarkdownPrinter {
    fn default() -> Self {
        Self { skin: MadSkin::default() }
    }
}

impl MarkdownPrinter {
    pub fn print(&self, text: &str) {
        self.skin.print_text(text);
        println!();
    }
}
