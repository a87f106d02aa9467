//! Async event handler for the console.

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use crossterm::event::{
    self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers,
};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::ExecutableCommand;
use futures_util::StreamExt;
use is_terminal::IsTerminal;
use ratatui::prelude::*;
use tokio::sync::mpsc;

use super::{
    app::{App, View},
    clipboard,
    events::TuiEvent,
    ui::render_ui,
};
use crate::{
    assistant::{
        history::ChatHistory, prompt, AssistantClient, ChatMessage, ChatOptions, Role, StreamEvent,
    },
    config::Config,
    execution::{piston::PistonClient, ExecutionBackend},
    session::{dispatch, CopyField, ExecutionSession, Submission},
    source::SourceFile,
};

/// Everything the event loop needs besides the app state.
struct Services {
    backend: Arc<dyn ExecutionBackend>,
    assistant: AssistantClient,
    options: ChatOptions,
    history: ChatHistory,
}

/// Run the interactive console for `path`.
pub async fn run_console(
    path: &Path,
    cfg: &Config,
    model: Option<&str>,
    temperature: f32,
    chat_id: Option<&str>,
) -> Result<()> {
    if !io::stdout().is_terminal() {
        return Err(anyhow!("console mode requires a proper terminal environment"));
    }

    let source = SourceFile::new(path);
    // fail early on a missing file rather than inside the alternate screen
    source.snapshot()?;

    let services = Services {
        backend: Arc::new(PistonClient::from_config(cfg)?),
        assistant: AssistantClient::from_config(cfg)?,
        options: ChatOptions::from_config(cfg, model, temperature),
        history: ChatHistory::from_config(cfg),
    };

    let history = match chat_id {
        Some(id) => services.history.read(id)?,
        None => Vec::new(),
    };
    let mut app = App::new(
        source,
        ExecutionSession::from_config(cfg),
        services.options.model.clone(),
        chat_id.map(str::to_string),
        history,
    );

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    stdout.execute(EnterAlternateScreen)?;
    stdout.execute(EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let (event_tx, event_rx) = mpsc::unbounded_channel::<TuiEvent>();
    log::info!("console started for {}", path.display());

    let result = run_app(&mut terminal, &mut app, &services, event_tx, event_rx).await;

    app.session.shutdown();

    // Restore terminal
    disable_raw_mode()?;
    terminal.backend_mut().execute(DisableBracketedPaste)?;
    terminal.backend_mut().execute(LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

/// Main application loop
async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    services: &Services,
    event_tx: mpsc::UnboundedSender<TuiEvent>,
    mut event_rx: mpsc::UnboundedReceiver<TuiEvent>,
) -> Result<()> {
    // Spawn input reader
    let input_tx = event_tx.clone();
    tokio::task::spawn_blocking(move || loop {
        if event::poll(Duration::from_millis(100)).unwrap_or(false) {
            let forwarded = match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => input_tx.send(TuiEvent::Key(key)),
                Ok(Event::Paste(text)) => input_tx.send(TuiEvent::Paste(text)),
                _ => Ok(()),
            };
            if forwarded.is_err() {
                break; // Channel closed
            }
        } else if input_tx.is_closed() {
            break;
        }
    });

    loop {
        terminal.draw(|frame| render_ui(frame, app))?;

        while let Ok(tui_event) = event_rx.try_recv() {
            match tui_event {
                TuiEvent::Key(key) => {
                    if handle_key_event(app, key, services, &event_tx) {
                        return Ok(());
                    }
                }
                TuiEvent::Paste(text) => app.paste(&text),
                TuiEvent::ExecutionSettled(settled) => {
                    app.apply_settled(settled);
                }
                TuiEvent::AssistantPrompt(prompt) => {
                    if !app.try_queue_message(prompt.clone()) {
                        send_prompt(app, prompt, services, &event_tx);
                    }
                }
                TuiEvent::ProcessNextMessage => {
                    if let Some(next) = app.dequeue_message() {
                        send_prompt(app, next, services, &event_tx);
                    }
                }
                TuiEvent::AssistantStream(stream_event) => {
                    handle_stream_event(app, stream_event, services, &event_tx);
                }
                TuiEvent::AssistantFailed(error) => {
                    log::warn!("assistant request failed: {}", error);
                    app.fail_response(&error);
                    let _ = event_tx.send(TuiEvent::ProcessNextMessage);
                }
                TuiEvent::Quit => return Ok(()),
            }
        }

        // Small delay to prevent busy waiting
        tokio::time::sleep(Duration::from_millis(16)).await; // ~60 FPS
    }
}

/// Handle keyboard events. Returns `true` when the console should quit.
fn handle_key_event(
    app: &mut App,
    key: KeyEvent,
    services: &Services,
    event_tx: &mpsc::UnboundedSender<TuiEvent>,
) -> bool {
    if app.show_help {
        app.toggle_help();
        return false;
    }

    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('c') if ctrl => return app.handle_ctrl_c(),
        KeyCode::Char('q') if ctrl => {
            let _ = event_tx.send(TuiEvent::Quit);
        }
        KeyCode::Char('h') if ctrl => app.toggle_help(),
        KeyCode::F(1) => app.toggle_help(),
        KeyCode::Char('r') if ctrl => start_run(app, services, event_tx),
        KeyCode::F(5) => start_run(app, services, event_tx),
        KeyCode::Char('s') if ctrl => {
            if !app.stop_run() {
                app.set_status("Nothing is running");
            }
        }
        KeyCode::Char('l') if ctrl => app.clear_output(),
        KeyCode::Char('y') if ctrl => copy(app, CopyField::Stdout),
        KeyCode::Char('e') if ctrl => copy(app, CopyField::Stderr),
        KeyCode::Char('t') if ctrl => copy(app, CopyField::Stdin),
        KeyCode::Char('b') if ctrl => match app.last_code_block() {
            Some(block) => report_copy(app, clipboard::copy_to_clipboard(&block.code), "code block"),
            None => app.set_status("No code block in the assistant's answers"),
        },
        KeyCode::Char('x') if ctrl => match app.last_error() {
            Some(stderr) => {
                if app.view != View::Assistant {
                    app.toggle_view();
                }
                let _ = event_tx.send(TuiEvent::AssistantPrompt(prompt::explain_error_prompt(&stderr)));
            }
            None => app.set_status("The last run did not fail"),
        },
        KeyCode::Tab => app.toggle_view(),
        KeyCode::Up => app.scroll_up(),
        KeyCode::Down => app.scroll_down(),
        KeyCode::End => app.scroll_to_bottom(),
        KeyCode::Enter => match app.view {
            View::Output => app.insert_newline(),
            View::Assistant => {
                if let Some(text) = app.take_assistant_input() {
                    let _ = event_tx.send(TuiEvent::AssistantPrompt(text));
                }
            }
        },
        KeyCode::Backspace => app.backspace(),
        KeyCode::Char(c) if !ctrl => app.insert_char(c),
        _ => {}
    }
    false
}

fn start_run(app: &mut App, services: &Services, event_tx: &mpsc::UnboundedSender<TuiEvent>) {
    let submission = match app.start_run() {
        Ok(s) => s,
        Err(e) => {
            app.set_status(format!("Cannot read source: {}", e));
            return;
        }
    };
    if let Submission::Dispatch(job) = submission {
        let handle = dispatch(services.backend.clone(), job);
        let tx = event_tx.clone();
        tokio::spawn(async move {
            match handle.await {
                Ok(settled) => {
                    let _ = tx.send(TuiEvent::ExecutionSettled(settled));
                }
                Err(e) => log::error!("execution task panicked: {}", e),
            }
        });
    }
}

fn copy(app: &mut App, field: CopyField) {
    let label = match field {
        CopyField::Stdin => "stdin",
        CopyField::Stdout => "stdout",
        CopyField::Stderr => "stderr",
    };
    match app.copy_text(field) {
        Some(text) => {
            let result = clipboard::copy_to_clipboard(&text);
            report_copy(app, result, label);
        }
        None => app.set_status(format!("No {} to copy", label)),
    }
}

fn report_copy(app: &mut App, result: Result<()>, label: &str) {
    match result {
        Ok(()) => app.set_status(format!("Copied {} to clipboard", label)),
        Err(e) => app.set_status(format!("Clipboard unavailable: {}", e)),
    }
}

/// Start streaming an answer for `input`.
fn send_prompt(
    app: &mut App,
    input: String,
    services: &Services,
    event_tx: &mpsc::UnboundedSender<TuiEvent>,
) {
    if input.trim().is_empty() {
        return;
    }

    app.add_message(ChatMessage::new(Role::User, input));
    app.start_response();

    let snapshot = app.source.snapshot().ok();
    let mut messages = vec![ChatMessage::new(Role::System, prompt::system_prompt(snapshot.as_ref()))];
    messages.extend(app.messages.iter().cloned());

    let mut stream = services.assistant.chat_stream(messages, services.options.clone());
    let tx = event_tx.clone();
    log::info!("assistant request started ({} messages)", app.messages.len());
    tokio::spawn(async move {
        while let Some(event_result) = stream.next().await {
            let forwarded = match event_result {
                Ok(stream_event) => tx.send(TuiEvent::AssistantStream(stream_event)),
                Err(e) => {
                    let _ = tx.send(TuiEvent::AssistantFailed(e.to_string()));
                    break;
                }
            };
            if forwarded.is_err() {
                break; // Channel closed
            }
        }
    });
}

fn handle_stream_event(
    app: &mut App,
    event: StreamEvent,
    services: &Services,
    event_tx: &mpsc::UnboundedSender<TuiEvent>,
) {
    match event {
        StreamEvent::Content(content) => app.append_response(&content),
        StreamEvent::Done => {
            // a failure may already have closed this answer
            if !app.is_receiving_response {
                return;
            }
            app.finish_response();
            log::info!("assistant answer finished");
            save_chat(app, &services.history);
            let _ = event_tx.send(TuiEvent::ProcessNextMessage);
        }
    }
}

/// Persist the conversation when a chat id is set. Failures only reach the
/// status bar; the panel stays usable.
fn save_chat(app: &mut App, history: &ChatHistory) {
    let Some(id) = app.chat_id.clone() else {
        return;
    };
    let mut persisted = vec![ChatMessage::new(Role::System, prompt::system_prompt(None))];
    persisted.extend(app.messages.iter().cloned());
    if let Err(e) = history.write(&id, persisted) {
        log::warn!("failed to save chat {}: {}", id, e);
        app.set_status(format!("Could not save chat: {}", e));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::ExecutionLimits;
    use std::fs;

    #[test]
    fn unwritable_history_only_sets_status() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("main.py");
        fs::write(&path, "print(1)")?;
        // a regular file where the history directory should be
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "")?;
        let history = ChatHistory::new(blocker.join("chats"), 10);

        let mut app = App::new(
            SourceFile::new(path),
            ExecutionSession::new(ExecutionLimits::default()),
            "test-model".into(),
            Some("demo".into()),
            Vec::new(),
        );
        app.add_message(ChatMessage::new(Role::User, "hi"));
        app.start_response();
        app.append_response("hello");
        app.finish_response();

        save_chat(&mut app, &history);
        assert!(app.status_message.starts_with("Could not save chat"));
        assert_eq!(app.messages.len(), 2);
        Ok(())
    }
}
