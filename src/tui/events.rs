//! Custom event types for the console.

use crossterm::event::KeyEvent;

use crate::assistant::StreamEvent;
use crate::session::Settled;

/// Events that can occur in the console
#[derive(Debug)]
pub enum TuiEvent {
    /// User keyboard input
    Key(KeyEvent),
    /// Bracketed paste content
    Paste(String),
    /// A remote run finished, failed or was cancelled
    ExecutionSettled(Settled),
    /// Prompt for the assistant panel
    AssistantPrompt(String),
    /// Assistant streaming response event
    AssistantStream(StreamEvent),
    /// Assistant request failed before or during streaming
    AssistantFailed(String),
    /// Send the next queued prompt
    ProcessNextMessage,
    /// Request to quit the console
    Quit,
}
