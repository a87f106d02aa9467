//! UI layout and rendering logic for the console.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use super::app::{App, View};
use crate::assistant::Role;
use crate::execution::{EntryStatus, ExecutionEntry};
use crate::printer::entry_header;

/// Render the main UI
pub fn render_ui(frame: &mut Frame, app: &App) {
    let input_height = match app.view {
        View::Output => (app.stdin_input.lines().count() as u16 + 2).clamp(3, 8),
        View::Assistant => 3,
    };
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),            // Tabs
            Constraint::Min(3),               // Output / assistant
            Constraint::Length(input_height), // Input area
            Constraint::Length(1),            // Status bar
        ])
        .split(frame.area());

    render_tabs(frame, app, main_layout[0]);
    match app.view {
        View::Output => render_output_area(frame, app, main_layout[1]),
        View::Assistant => render_assistant_area(frame, app, main_layout[1]),
    }
    render_input_area(frame, app, main_layout[2]);
    render_status_bar(frame, app, main_layout[3]);

    if app.show_help {
        render_help_overlay(frame);
    }
}

fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let tab = |label: &'static str, active: bool| {
        if active {
            Span::styled(
                format!(" {} ", label),
                Style::default().fg(Color::Black).bg(Color::Cyan).add_modifier(Modifier::BOLD),
            )
        } else {
            Span::styled(format!(" {} ", label), Style::default().fg(Color::Gray))
        }
    };
    let line = Line::from(vec![
        tab("Output", app.view == View::Output),
        Span::raw(" "),
        tab("Assistant", app.view == View::Assistant),
        Span::raw("  "),
        Span::styled(app.filename.clone(), Style::default().fg(Color::Yellow)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

fn status_style(status: EntryStatus) -> Style {
    match status {
        EntryStatus::Running => Style::default().fg(Color::Yellow),
        EntryStatus::Completed => Style::default().fg(Color::Green),
        EntryStatus::Error => Style::default().fg(Color::Red),
    }
}

/// Styled lines for every entry, oldest first.
pub fn entry_lines(entries: &[ExecutionEntry]) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for entry in entries {
        let mut header = entry_header(entry);
        if entry.status() == EntryStatus::Running {
            header.push_str(&format!(" · {:.1}s", entry.elapsed_since_start_ms() as f64 / 1000.0));
        }
        lines.push(Line::from(Span::styled(
            header,
            status_style(entry.status()).add_modifier(Modifier::BOLD),
        )));

        if !entry.stdin().is_empty() {
            lines.push(Line::from(Span::styled("stdin:", Style::default().fg(Color::DarkGray))));
            for l in entry.stdin().lines() {
                lines.push(Line::from(Span::styled(l.to_string(), Style::default().fg(Color::DarkGray))));
            }
        }

        if let Some(result) = entry.result() {
            for l in result.stdout.lines() {
                lines.push(Line::from(l.to_string()));
            }
            for l in result.stderr.lines() {
                lines.push(Line::from(Span::styled(l.to_string(), Style::default().fg(Color::Red))));
            }
            lines.push(Line::from(Span::styled(
                format!("exit code {}", result.exit_code),
                Style::default().fg(Color::DarkGray),
            )));
        }
        lines.push(Line::from(""));
    }
    lines
}

/// Vertical scroll that keeps `offset` lines above the bottom.
fn bottom_scroll(total_lines: usize, area: Rect, offset: usize) -> u16 {
    let available_height = area.height.saturating_sub(2) as usize; // Account for borders
    let max_scroll = total_lines.saturating_sub(available_height);
    max_scroll.saturating_sub(offset.min(max_scroll)) as u16
}

fn render_output_area(frame: &mut Frame, app: &App, area: Rect) {
    let mut lines = entry_lines(app.session.entries());
    if lines.is_empty() {
        lines.push(Line::from(Span::styled(
            "No output yet. Press ctrl+r to run.",
            Style::default().fg(Color::DarkGray),
        )));
    }
    let scroll_y = bottom_scroll(lines.len(), area, app.output_scroll_offset);
    let paragraph = Paragraph::new(Text::from(lines))
        .block(Block::default().borders(Borders::ALL).title("Output"))
        .scroll((scroll_y, 0));
    frame.render_widget(paragraph, area);
}

fn render_assistant_area(frame: &mut Frame, app: &App, area: Rect) {
    let mut content_lines = Vec::new();

    for msg in &app.messages {
        let (prefix, style) = match msg.role {
            Role::User => (">>> ", Style::default().fg(Color::Green)),
            Role::Assistant => ("", Style::default().fg(Color::Cyan)),
            Role::System => ("SYS ", Style::default().fg(Color::Yellow)),
        };
        let content = format!("{}{}", prefix, msg.content);
        for line in content.lines() {
            content_lines.push(Line::from(vec![Span::styled(line.to_string(), style)]));
        }
        content_lines.push(Line::from(""));
    }

    if app.is_receiving_response {
        if app.current_response.is_empty() {
            content_lines.push(Line::from(Span::styled("thinking...", Style::default().fg(Color::DarkGray))));
        }
        for line in app.current_response.lines() {
            content_lines.push(Line::from(Span::styled(line.to_string(), Style::default().fg(Color::Cyan))));
        }
    }

    let title = format!("Assistant | Model: {}", app.model);
    let scroll_y = bottom_scroll(content_lines.len(), area, app.chat_scroll_offset);
    let paragraph = Paragraph::new(Text::from(content_lines))
        .block(Block::default().borders(Borders::ALL).title(title))
        .wrap(Wrap { trim: false })
        .scroll((scroll_y, 0));
    frame.render_widget(paragraph, area);
}

fn render_input_area(frame: &mut Frame, app: &App, area: Rect) {
    let (text, title) = match app.view {
        View::Output => {
            let title = if app.needs_stdin {
                "Program input (stdin) - this program reads input"
            } else {
                "Program input (stdin)"
            };
            (app.stdin_input.clone(), title)
        }
        View::Assistant => (app.assistant_input.clone(), "Ask the assistant (enter to send)"),
    };

    let input_paragraph = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title(title))
        .wrap(Wrap { trim: false });
    frame.render_widget(input_paragraph, area);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let status_text = truncate_to_width(&app.status_message, area.width as usize);
    let status_paragraph =
        Paragraph::new(status_text).style(Style::default().bg(Color::DarkGray).fg(Color::White));
    frame.render_widget(status_paragraph, area);
}

/// Cut `s` to at most `width` terminal columns, ending in "..." when cut.
pub fn truncate_to_width(s: &str, width: usize) -> String {
    if s.width() <= width {
        return s.to_string();
    }
    let budget = width.saturating_sub(3);
    let mut used = 0;
    let mut out = String::new();
    for c in s.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        out.push(c);
    }
    if width >= 3 {
        out.push_str("...");
    }
    out
}

fn render_help_overlay(frame: &mut Frame) {
    let popup_area = centered_rect(80, 70, frame.area());
    frame.render_widget(Clear, popup_area);

    let help_lines = vec![
        Line::from("Console Help"),
        Line::from(""),
        Line::from("Running:"),
        Line::from("  Ctrl+R / F5 - Run the file with the stdin box as input"),
        Line::from("  Ctrl+S      - Stop the current run"),
        Line::from("  Ctrl+L      - Clear output"),
        Line::from("  Ctrl+Y      - Copy stdout of the last run"),
        Line::from("  Ctrl+E      - Copy stderr of the last run"),
        Line::from("  Ctrl+T      - Copy stdin of the last run"),
        Line::from(""),
        Line::from("Assistant:"),
        Line::from("  Tab         - Switch between output and assistant"),
        Line::from("  Enter       - Send question"),
        Line::from("  Ctrl+X      - Ask the assistant to explain the last error"),
        Line::from("  Ctrl+B      - Copy the assistant's last code block"),
        Line::from(""),
        Line::from("Navigation:"),
        Line::from("  Up/Down/End - Scroll"),
        Line::from("  Ctrl+C x2   - Quit (Ctrl+Q also quits)"),
        Line::from("  Ctrl+H / F1 - Toggle this help"),
    ];

    let help_paragraph = Paragraph::new(Text::from(help_lines))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Help")
                .title_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(help_paragraph, popup_area);
}

/// Helper function to create a centered rectangle
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
