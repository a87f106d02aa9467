//! System clipboard access for the console's copy shortcuts.

use anyhow::{Context, Result};

/// Put `text` on the clipboard exactly as given.
pub fn copy_to_clipboard(text: &str) -> Result<()> {
    let mut clipboard = arboard::Clipboard::new().context("no clipboard available")?;
    clipboard
        .set_text(text.to_string())
        .context("failed to set clipboard text")?;
    Ok(())
}
