//! Console state: the execution session, the stdin box and the assistant panel.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::assistant::{code_blocks, ChatMessage, CodeBlock, Role};
use crate::execution::{EntryStatus, ExecutionEntry};
use crate::session::{CopyField, ExecutionSession, Settled, Submission};
use crate::source::{SourceFile, SourceSnapshot};

/// Which panel owns the main area and the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Output,
    Assistant,
}

#[derive(Debug)]
pub struct App {
    /// File re-read on every run
    pub source: SourceFile,
    pub filename: String,
    pub session: ExecutionSession,
    pub view: View,
    /// Program stdin, sent verbatim with the next run
    pub stdin_input: String,
    /// Whether the source looks like it reads stdin
    pub needs_stdin: bool,
    pub assistant_input: String,
    /// Persisted conversation id, if any
    pub chat_id: Option<String>,
    /// Conversation without the system message, which is rebuilt per request
    pub messages: Vec<ChatMessage>,
    pub current_response: String,
    pub is_receiving_response: bool,
    pub message_queue: VecDeque<String>,
    pub status_message: String,
    pub model: String,
    pub show_help: bool,
    /// Lines scrolled up from the bottom; 0 follows the newest entry
    pub output_scroll_offset: usize,
    pub chat_scroll_offset: usize,
    pub max_display_messages: usize,
    pub last_ctrl_c_time: Option<Instant>,
}

impl App {
    pub fn new(
        source: SourceFile,
        session: ExecutionSession,
        model: String,
        chat_id: Option<String>,
        history: Vec<ChatMessage>,
    ) -> Self {
        let snapshot = source.snapshot().ok();
        let filename = snapshot
            .as_ref()
            .map(|s| s.filename.clone())
            .unwrap_or_else(|| source.path().display().to_string());
        let needs_stdin = snapshot.as_ref().map(SourceSnapshot::needs_stdin).unwrap_or(false);

        let mut app = Self {
            source,
            filename,
            session,
            view: View::Output,
            stdin_input: String::new(),
            needs_stdin,
            assistant_input: String::new(),
            chat_id,
            messages: history.into_iter().filter(|m| m.role != Role::System).collect(),
            current_response: String::new(),
            is_receiving_response: false,
            message_queue: VecDeque::new(),
            status_message: String::new(),
            model,
            show_help: false,
            output_scroll_offset: 0,
            chat_scroll_offset: 0,
            max_display_messages: 100,
            last_ctrl_c_time: None,
        };
        app.update_status_message();
        app
    }

    pub fn toggle_view(&mut self) {
        self.view = match self.view {
            View::Output => View::Assistant,
            View::Assistant => View::Output,
        };
        self.update_status_message();
    }

    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    // ----- Execution -----

    /// Snapshot the file and submit it with the current stdin.
    pub fn start_run(&mut self) -> Result<Submission> {
        let snapshot = self.source.snapshot()?;
        self.filename = snapshot.filename.clone();
        self.needs_stdin = snapshot.needs_stdin();
        let submission = self.session.submit(&snapshot, &self.stdin_input);
        self.entries_changed();
        Ok(submission)
    }

    pub fn stop_run(&mut self) -> bool {
        let stopped = self.session.stop();
        if stopped {
            self.entries_changed();
        }
        stopped
    }

    pub fn clear_output(&mut self) {
        self.session.clear();
        self.entries_changed();
    }

    pub fn apply_settled(&mut self, settled: Settled) -> bool {
        let applied = self.session.settle(settled);
        if applied {
            self.entries_changed();
        }
        applied
    }

    pub fn latest_entry(&self) -> Option<&ExecutionEntry> {
        self.session.latest()
    }

    /// Exact text of a field of the newest entry.
    pub fn copy_text(&self, field: CopyField) -> Option<String> {
        let entry = self.session.latest()?;
        self.session.copy_field(entry.id(), field).map(str::to_string)
    }

    /// stderr of the newest entry if it ended in error.
    pub fn last_error(&self) -> Option<String> {
        let entry = self.session.latest()?;
        if entry.status() != EntryStatus::Error {
            return None;
        }
        entry.result().map(|r| r.stderr.clone()).filter(|s| !s.is_empty())
    }

    fn entries_changed(&mut self) {
        if self.view == View::Output {
            self.output_scroll_offset = 0;
        }
        self.update_status_message();
    }

    // ----- Input editing -----

    pub fn active_input_mut(&mut self) -> &mut String {
        match self.view {
            View::Output => &mut self.stdin_input,
            View::Assistant => &mut self.assistant_input,
        }
    }

    pub fn insert_char(&mut self, c: char) {
        self.active_input_mut().push(c);
    }

    pub fn insert_newline(&mut self) {
        self.stdin_input.push('\n');
    }

    pub fn backspace(&mut self) {
        self.active_input_mut().pop();
    }

    pub fn paste(&mut self, text: &str) {
        let normalized = text.replace("\r\n", "\n");
        match self.view {
            View::Output => self.stdin_input.push_str(&normalized),
            // assistant input is a single line
            View::Assistant => self.assistant_input.push_str(&normalized.replace('\n', " ")),
        }
    }

    /// Take the assistant input for sending; `None` if blank.
    pub fn take_assistant_input(&mut self) -> Option<String> {
        let text = std::mem::take(&mut self.assistant_input);
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }

    // ----- Assistant panel -----

    pub fn add_message(&mut self, message: ChatMessage) {
        self.messages.push(message);
        if self.messages.len() > self.max_display_messages {
            self.messages.drain(0..self.messages.len() - self.max_display_messages);
        }
        self.chat_scroll_offset = 0;
    }

    /// Queue the prompt if an answer is still streaming.
    pub fn try_queue_message(&mut self, message: String) -> bool {
        if self.is_receiving_response {
            self.message_queue.push_back(message);
            self.update_status_message();
            true
        } else {
            false
        }
    }

    pub fn dequeue_message(&mut self) -> Option<String> {
        let msg = self.message_queue.pop_front();
        self.update_status_message();
        msg
    }

    pub fn start_response(&mut self) {
        self.current_response.clear();
        self.is_receiving_response = true;
        self.update_status_message();
    }

    pub fn append_response(&mut self, content: &str) {
        self.current_response.push_str(content);
        self.chat_scroll_offset = 0;
    }

    pub fn finish_response(&mut self) {
        if !self.current_response.is_empty() {
            let response = std::mem::take(&mut self.current_response);
            self.add_message(ChatMessage::new(Role::Assistant, response));
        }
        self.is_receiving_response = false;
        self.update_status_message();
    }

    /// Show a failed request as the answer so the panel stays usable.
    pub fn fail_response(&mut self, error: &str) {
        self.current_response.clear();
        self.add_message(ChatMessage::new(Role::Assistant, format!("Assistant error: {}", error)));
        self.is_receiving_response = false;
        self.update_status_message();
    }

    /// Newest code block proposed by the assistant.
    pub fn last_code_block(&self) -> Option<CodeBlock> {
        self.messages
            .iter()
            .rev()
            .filter(|m| m.role == Role::Assistant)
            .find_map(|m| code_blocks::last_code_block(&m.content))
    }

    // ----- Scrolling -----

    pub fn scroll_up(&mut self) {
        match self.view {
            View::Output => self.output_scroll_offset += 1,
            View::Assistant => self.chat_scroll_offset += 1,
        }
    }

    pub fn scroll_down(&mut self) {
        let offset = match self.view {
            View::Output => &mut self.output_scroll_offset,
            View::Assistant => &mut self.chat_scroll_offset,
        };
        *offset = offset.saturating_sub(1);
    }

    pub fn scroll_to_bottom(&mut self) {
        match self.view {
            View::Output => self.output_scroll_offset = 0,
            View::Assistant => self.chat_scroll_offset = 0,
        }
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
    }

    fn update_status_message(&mut self) {
        self.status_message = match self.view {
            View::Output if self.session.is_running() => {
                "Running... ctrl+s stop | ctrl+h help".to_string()
            }
            View::Output => "Output: ctrl+r run, ctrl+l clear, tab assistant | ctrl+h help".to_string(),
            View::Assistant if !self.message_queue.is_empty() => format!(
                "Assistant: answering ({} queued) | tab output",
                self.message_queue.len()
            ),
            View::Assistant if self.is_receiving_response => "Assistant: answering... | tab output".to_string(),
            View::Assistant => "Assistant: enter send, ctrl+x explain error | tab output".to_string(),
        };
    }

    /// Double Ctrl+C within 500ms quits; a single press clears the active input.
    pub fn handle_ctrl_c(&mut self) -> bool {
        const DOUBLE_CTRL_C_TIMEOUT: Duration = Duration::from_millis(500);

        let now = Instant::now();
        if let Some(last_time) = self.last_ctrl_c_time {
            if now.duration_since(last_time) <= DOUBLE_CTRL_C_TIMEOUT {
                self.last_ctrl_c_time = None;
                return true;
            }
        }

        self.active_input_mut().clear();
        self.last_ctrl_c_time = Some(now);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::{ExecutionLimits, ExecutionResult};
    use crate::session::Outcome;
    use std::fs;

    fn app_for(name: &str, text: &str) -> (tempfile::TempDir, App) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        fs::write(&path, text).unwrap();
        let app = App::new(
            SourceFile::new(path),
            ExecutionSession::new(ExecutionLimits::default()),
            "test-model".into(),
            None,
            vec![ChatMessage::new(Role::System, "sys")],
        );
        (dir, app)
    }

    #[test]
    fn new_app_inspects_source() {
        let (_dir, app) = app_for("main.py", "n = input()");
        assert_eq!(app.filename, "main.py");
        assert!(app.needs_stdin);
        assert!(app.messages.is_empty());
    }

    #[test]
    fn run_and_settle_follow_newest_entry() -> Result<()> {
        let (_dir, mut app) = app_for("main.py", "print('hi')");
        app.stdin_input = "1 2\n".into();
        app.output_scroll_offset = 4;

        let sub = app.start_run()?;
        assert_eq!(app.output_scroll_offset, 0);
        assert_eq!(app.latest_entry().unwrap().stdin(), "1 2\n");

        app.output_scroll_offset = 2;
        let applied = app.apply_settled(Settled {
            id: sub.id(),
            outcome: Outcome::Finished(ExecutionResult {
                stdout: "hi".into(),
                stderr: String::new(),
                exit_code: 0,
                elapsed_ms: 3,
            }),
        });
        assert!(applied);
        assert_eq!(app.output_scroll_offset, 0);
        assert_eq!(app.copy_text(CopyField::Stdout).as_deref(), Some("hi"));
        assert_eq!(app.last_error(), None);
        Ok(())
    }

    #[test]
    fn run_picks_up_file_edits() -> Result<()> {
        let (dir, mut app) = app_for("main.py", "print(1)");
        fs::write(dir.path().join("main.py"), "print(2)")?;
        app.start_run()?;
        assert_eq!(app.latest_entry().unwrap().source_text(), "print(2)");
        Ok(())
    }

    #[test]
    fn stop_marks_error_and_exposes_message() -> Result<()> {
        let (_dir, mut app) = app_for("main.go", "package main");
        app.start_run()?;
        assert!(app.stop_run());
        assert!(app.last_error().unwrap().contains("stopped by user"));
        app.clear_output();
        assert!(app.latest_entry().is_none());
        Ok(())
    }

    #[test]
    fn scroll_is_not_reset_while_assistant_is_shown() -> Result<()> {
        let (_dir, mut app) = app_for("main.py", "print(1)");
        app.toggle_view();
        app.output_scroll_offset = 3;
        app.start_run()?;
        assert_eq!(app.output_scroll_offset, 3);
        Ok(())
    }

    #[test]
    fn prompts_queue_while_streaming() {
        let (_dir, mut app) = app_for("main.py", "");
        assert!(!app.try_queue_message("first".into()));
        app.start_response();
        assert!(app.try_queue_message("second".into()));
        app.append_response("Use ```python\nprint(2)\n```");
        app.finish_response();
        assert!(!app.is_receiving_response);
        assert_eq!(app.dequeue_message().as_deref(), Some("second"));
        assert_eq!(app.dequeue_message(), None);
        assert_eq!(app.last_code_block().unwrap().code, "print(2)");
    }

    #[test]
    fn failed_answer_is_shown_and_panel_recovers() {
        let (_dir, mut app) = app_for("main.py", "");
        app.start_response();
        app.append_response("partial");
        app.fail_response("401 Unauthorized");
        assert!(!app.is_receiving_response);
        assert_eq!(app.messages.last().unwrap().content, "Assistant error: 401 Unauthorized");
        assert!(app.current_response.is_empty());
    }

    #[test]
    fn typing_goes_to_the_active_panel() {
        let (_dir, mut app) = app_for("main.py", "");
        app.insert_char('4');
        app.insert_newline();
        app.paste("5\r\n6");
        assert_eq!(app.stdin_input, "4\n5\n6");

        app.toggle_view();
        app.paste("why\nthis");
        app.insert_char('?');
        app.backspace();
        assert_eq!(app.take_assistant_input().as_deref(), Some("why this"));
        assert_eq!(app.take_assistant_input(), None);
    }

    #[test]
    fn double_ctrl_c_quits() {
        let (_dir, mut app) = app_for("main.py", "");
        app.stdin_input = "abc".into();
        assert!(!app.handle_ctrl_c());
        assert!(app.stdin_input.is_empty());
        assert!(app.handle_ctrl_c());
    }
}
