//! System prompt for the assistant panel.

use crate::{language::Language, source::SourceSnapshot};

const BASE_PROMPT: &str = "You are a programming assistant inside a terminal code runner.\n\
Answer concisely. When you show code, put it in a fenced Markdown block tagged with its language.\n\
Programs run in a sandbox that only sees the single file and the provided stdin.";

pub fn system_prompt(source: Option<&SourceSnapshot>) -> String {
    match source {
        None => BASE_PROMPT.to_string(),
        Some(snap) => {
            let lang = snap.language();
            let fence_tag = match lang {
                Language::Unsupported => String::new(),
                other => other.token().to_string(),
            };
            format!(
                "{BASE_PROMPT}\n\nThe user is editing `{name}` ({display}). Current contents:\n```{fence_tag}\n{text}\n```",
                name = snap.filename,
                display = lang.display_name(),
                text = snap.text.trim_end(),
            )
        }
    }
}

/// Prompt used for the console's "explain last error" shortcut.
pub fn explain_error_prompt(stderr: &str) -> String {
    format!("My program failed with this error output. Explain the cause and show a fix:\n\n```\n{}\n```", stderr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_without_source() {
        assert_eq!(system_prompt(None), BASE_PROMPT);
    }

    #[test]
    fn prompt_embeds_source() {
        let snap = SourceSnapshot::new("main.rs", "fn main() {}\n\n");
        let p = system_prompt(Some(&snap));
        assert!(p.contains("`main.rs` (Rust)"));
        assert!(p.ends_with("```rust\nfn main() {}\n```"));
    }
}
