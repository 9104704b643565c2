//! UI layout and rendering logic for the TUI.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use super::app::{App, Preview};

const GUTTER_WIDTH: u16 = 5;

/// Render the main UI
pub fn render_ui(frame: &mut Frame, app: &App) {
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),    // Editor and preview
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    let panes = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(main_layout[0]);

    render_editor(frame, app, panes[0]);
    render_preview(frame, app, panes[1]);
    render_status_bar(frame, app, main_layout[1]);

    if app.show_help {
        render_help_overlay(frame);
    }
}

fn render_editor(frame: &mut Frame, app: &App, area: Rect) {
    let title = match &app.file {
        Some(path) => {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            if app.dirty {
                format!("{} [+]", name)
            } else {
                name
            }
        }
        None => "scratch".to_string(),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .title_style(Style::default().fg(Color::Green).add_modifier(Modifier::BOLD));
    let inner = block.inner(area);

    // scroll just enough to keep the cursor row visible
    let height = inner.height.max(1) as usize;
    let offset = (app.cursor_row + 1).saturating_sub(height);

    let gutter = Style::default().fg(Color::DarkGray);
    let lines: Vec<Line> = app
        .lines
        .iter()
        .enumerate()
        .skip(offset)
        .take(height)
        .map(|(index, text)| {
            Line::from(vec![
                Span::styled(format!("{:>4} ", index + 1), gutter),
                Span::raw(text.as_str()),
            ])
        })
        .collect();

    frame.render_widget(Paragraph::new(lines).block(block), area);

    if !app.show_help {
        let col = app.current_line()[..app.cursor_col].width() as u16;
        let x = inner.x + GUTTER_WIDTH + col;
        let y = inner.y + (app.cursor_row - offset) as u16;
        if x < inner.x + inner.width && y < inner.y + inner.height {
            frame.set_cursor_position((x, y));
        }
    }
}

fn render_preview(frame: &mut Frame, app: &App, area: Rect) {
    let (title, color) = match (&app.preview, app.running) {
        (Preview::Critical(_), _) => ("Preview (stopped)", Color::Red),
        (_, true) => ("Preview (running)", Color::Yellow),
        _ => ("Preview", Color::Cyan),
    };

    let text = match &app.preview {
        Preview::Empty => Text::default(),
        // two spaces per tab, matching the editor's indentation
        Preview::Output(out) => Text::from(out.replace('\t', "  ")),
        Preview::Diagnostics(diagnostics) => diagnostics_text(diagnostics),
        Preview::Critical(message) => Text::from(Line::from(Span::styled(
            message.clone(),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ))),
    };

    let paragraph = Paragraph::new(text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .title_style(Style::default().fg(color).add_modifier(Modifier::BOLD)),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn diagnostics_text(diagnostics: &[wren_live::Diagnostic]) -> Text<'static> {
    let header = Style::default().fg(Color::Red).add_modifier(Modifier::BOLD);
    let label = Style::default().fg(Color::DarkGray);
    let mut lines = Vec::new();
    for (index, diag) in diagnostics.iter().enumerate() {
        let Some(line) = diag.line else {
            for raw in diag.message.lines() {
                lines.push(Line::from(Span::styled(raw.to_string(), Style::default().fg(Color::Red))));
            }
            continue;
        };
        lines.push(Line::from(Span::styled(format!("Error {}", index), header)));
        lines.push(Line::from(vec![
            Span::styled("  line: ", label),
            Span::raw(line.to_string()),
        ]));
        lines.push(Line::from(vec![
            Span::styled("  context: ", label),
            Span::raw(diag.context.clone()),
        ]));
        lines.push(Line::from(vec![
            Span::styled("  message:", label),
            Span::raw(diag.message.clone()),
        ]));
    }
    Text::from(lines)
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let state = if app.running { "running" } else { "idle" };
    let status_text = format!("{} | {}", app.status_message, state);

    let status_paragraph =
        Paragraph::new(status_text).style(Style::default().bg(Color::DarkGray).fg(Color::White));

    frame.render_widget(status_paragraph, area);
}

fn render_help_overlay(frame: &mut Frame) {
    let popup_area = centered_rect(60, 50, frame.area());
    frame.render_widget(Clear, popup_area);

    let help_lines = vec![
        Line::from("Wren Live Help"),
        Line::from(""),
        Line::from("Every edit re-runs the script; the right pane shows"),
        Line::from("its output or errors."),
        Line::from(""),
        Line::from("  Ctrl+S       - Save to file"),
        Line::from("  Ctrl+Q       - Quit"),
        Line::from("  Ctrl+C x2    - Quit"),
        Line::from("  F1           - Toggle this help"),
        Line::from("  Tab          - Indent two spaces"),
        Line::from(""),
        Line::from("Imports:"),
        Line::from("  import \"!x\"  - bundled library"),
        Line::from("  import \"~x\"  - home directory"),
        Line::from("  import \"#x\"  - ~/.wren"),
        Line::from("  import \"$x\"  - user data"),
    ];

    let help_paragraph = Paragraph::new(Text::from(help_lines))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Help")
                .title_style(
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                ),
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

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{backend::TestBackend, Terminal};

    fn draw(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(60, 10)).unwrap();
        terminal.draw(|frame| render_ui(frame, app)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer.content().iter().map(|cell| cell.symbol()).collect()
    }

    #[test]
    fn shows_source_and_output() {
        let mut app = App::new("System.print(1)", None);
        app.preview = Preview::Output("1\n".into());
        let screen = draw(&app);
        assert!(screen.contains("System.print(1)"));
        assert!(screen.contains("Preview"));
    }

    #[test]
    fn shows_numbered_errors() {
        let mut app = App::new("x", None);
        app.preview = Preview::Diagnostics(wren_live::diagnostics::parse(
            "[main line 1] Error: oops",
        ));
        let screen = draw(&app);
        assert!(screen.contains("Error 0"));
    }

    #[test]
    fn centered_rect_is_inside() {
        let outer = Rect::new(0, 0, 100, 50);
        let inner = centered_rect(60, 50, outer);
        assert!(inner.x >= outer.x && inner.right() <= outer.right());
        assert!(inner.y >= outer.y && inner.bottom() <= outer.bottom());
    }
}
