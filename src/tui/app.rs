//! TUI application state: the editor buffer and the preview it drives.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use wren_live::{Diagnostic, PreviewSink, RevisionCounter, SourceRevision};

const DOUBLE_CTRL_C_TIMEOUT: Duration = Duration::from_millis(500);
const TAB: &str = "  ";

/// What the preview pane currently shows.
#[derive(Debug, Clone, PartialEq)]
pub enum Preview {
    Empty,
    Output(String),
    Diagnostics(Vec<Diagnostic>),
    Critical(String),
}

#[derive(Debug)]
pub struct App {
    /// Editor lines, never empty
    pub lines: Vec<String>,
    pub cursor_row: usize,
    /// Byte index into `lines[cursor_row]`
    pub cursor_col: usize,
    /// File written by Ctrl+S, if any
    pub file: Option<PathBuf>,
    /// Edited since the last save to `file`
    pub dirty: bool,
    pub preview: Preview,
    /// A run is in flight
    pub running: bool,
    pub status_message: String,
    pub show_help: bool,
    pub last_ctrl_c_time: Option<Instant>,
    revisions: RevisionCounter,
}

impl App {
    pub fn new(text: &str, file: Option<PathBuf>) -> Self {
        let mut lines: Vec<String> = text.split('\n').map(str::to_string).collect();
        if lines.is_empty() {
            lines.push(String::new());
        }
        Self {
            lines,
            cursor_row: 0,
            cursor_col: 0,
            file,
            dirty: false,
            preview: Preview::Empty,
            running: false,
            status_message: default_status().to_string(),
            show_help: false,
            last_ctrl_c_time: None,
            revisions: RevisionCounter::default(),
        }
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Snapshot the buffer as the next revision.
    pub fn next_revision(&mut self) -> SourceRevision {
        self.running = true;
        self.revisions.revision(self.text())
    }

    pub fn current_line(&self) -> &str {
        &self.lines[self.cursor_row]
    }

    pub fn insert_char(&mut self, c: char) {
        let col = self.cursor_col;
        self.lines[self.cursor_row].insert(col, c);
        self.cursor_col += c.len_utf8();
        self.dirty = true;
    }

    pub fn insert_tab(&mut self) {
        self.insert_str(TAB);
    }

    /// Insert text that may span lines, leaving the cursor after it.
    pub fn insert_str(&mut self, text: &str) {
        let text = text.replace("\r\n", "\n").replace('\r', "\n");
        let mut parts = text.split('\n');
        if let Some(first) = parts.next() {
            let col = self.cursor_col;
            self.lines[self.cursor_row].insert_str(col, first);
            self.cursor_col += first.len();
        }
        for part in parts {
            self.insert_newline();
            let col = self.cursor_col;
            self.lines[self.cursor_row].insert_str(col, part);
            self.cursor_col += part.len();
        }
        self.dirty = true;
    }

    pub fn insert_newline(&mut self) {
        let col = self.cursor_col;
        let rest = self.lines[self.cursor_row].split_off(col);
        self.cursor_row += 1;
        self.lines.insert(self.cursor_row, rest);
        self.cursor_col = 0;
        self.dirty = true;
    }

    /// Returns true when the buffer changed.
    pub fn backspace(&mut self) -> bool {
        if let Some(prev) = self.prev_boundary() {
            self.lines[self.cursor_row].replace_range(prev..self.cursor_col, "");
            self.cursor_col = prev;
        } else if self.cursor_row > 0 {
            let line = self.lines.remove(self.cursor_row);
            self.cursor_row -= 1;
            self.cursor_col = self.lines[self.cursor_row].len();
            self.lines[self.cursor_row].push_str(&line);
        } else {
            return false;
        }
        self.dirty = true;
        true
    }

    /// Returns true when the buffer changed.
    pub fn delete(&mut self) -> bool {
        if let Some(next) = self.next_boundary() {
            self.lines[self.cursor_row].replace_range(self.cursor_col..next, "");
        } else if self.cursor_row + 1 < self.lines.len() {
            let line = self.lines.remove(self.cursor_row + 1);
            self.lines[self.cursor_row].push_str(&line);
        } else {
            return false;
        }
        self.dirty = true;
        true
    }

    pub fn move_cursor_left(&mut self) {
        if let Some(prev) = self.prev_boundary() {
            self.cursor_col = prev;
        } else if self.cursor_row > 0 {
            self.cursor_row -= 1;
            self.cursor_col = self.current_line().len();
        }
    }

    pub fn move_cursor_right(&mut self) {
        if let Some(next) = self.next_boundary() {
            self.cursor_col = next;
        } else if self.cursor_row + 1 < self.lines.len() {
            self.cursor_row += 1;
            self.cursor_col = 0;
        }
    }

    pub fn move_cursor_up(&mut self) {
        if self.cursor_row > 0 {
            self.cursor_row -= 1;
            self.clamp_col();
        }
    }

    pub fn move_cursor_down(&mut self) {
        if self.cursor_row + 1 < self.lines.len() {
            self.cursor_row += 1;
            self.clamp_col();
        }
    }

    pub fn move_cursor_home(&mut self) {
        self.cursor_col = 0;
    }

    pub fn move_cursor_end(&mut self) {
        self.cursor_col = self.current_line().len();
    }

    fn prev_boundary(&self) -> Option<usize> {
        self.current_line()[..self.cursor_col]
            .chars()
            .next_back()
            .map(|c| self.cursor_col - c.len_utf8())
    }

    fn next_boundary(&self) -> Option<usize> {
        self.current_line()[self.cursor_col..]
            .chars()
            .next()
            .map(|c| self.cursor_col + c.len_utf8())
    }

    /// Keep the column inside the line and on a char boundary.
    fn clamp_col(&mut self) {
        let line = &self.lines[self.cursor_row];
        let mut col = self.cursor_col.min(line.len());
        while !line.is_char_boundary(col) {
            col -= 1;
        }
        self.cursor_col = col;
    }

    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    pub fn mark_saved(&mut self) {
        self.dirty = false;
    }

    /// Returns true when this is the second Ctrl+C within the timeout.
    pub fn handle_ctrl_c(&mut self) -> bool {
        let now = Instant::now();

        if let Some(last_time) = self.last_ctrl_c_time {
            if now.duration_since(last_time) <= DOUBLE_CTRL_C_TIMEOUT {
                self.last_ctrl_c_time = None;
                return true;
            }
        }

        self.status_message = "Press Ctrl+C again to quit".to_string();
        self.last_ctrl_c_time = Some(now);
        false
    }

    pub fn reset_status(&mut self) {
        self.status_message = default_status().to_string();
    }
}

fn default_status() -> &'static str {
    "Ctrl+S save | Ctrl+Q quit | F1 help"
}

impl PreviewSink for App {
    fn on_idle(&mut self) {
        self.running = false;
    }

    fn on_output(&mut self, text: &str) {
        self.preview = if text.is_empty() {
            Preview::Empty
        } else {
            Preview::Output(text.to_string())
        };
    }

    fn on_diagnostics(&mut self, diagnostics: &[Diagnostic]) {
        self.preview = Preview::Diagnostics(diagnostics.to_vec());
    }

    fn on_critical(&mut self, message: &str) {
        self.running = false;
        self.preview = Preview::Critical(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn editing_across_lines() {
        let mut app = App::new("ab", None);
        app.move_cursor_end();
        app.insert_newline();
        app.insert_char('c');
        assert_eq!(app.text(), "ab\nc");
        assert!(app.dirty);

        app.move_cursor_home();
        assert!(app.backspace());
        assert_eq!(app.text(), "abc");
        assert_eq!((app.cursor_row, app.cursor_col), (0, 2));
    }

    #[test]
    fn multibyte_cursor_motion() {
        let mut app = App::new("é1", None);
        app.move_cursor_right();
        assert_eq!(app.cursor_col, 2);
        assert!(app.delete());
        assert_eq!(app.text(), "é");
        assert!(app.backspace());
        assert_eq!(app.text(), "");
        assert!(!app.backspace());
    }

    #[test]
    fn paste_spans_lines() {
        let mut app = App::new("", None);
        app.insert_str("a\r\nb\nc");
        assert_eq!(app.lines, vec!["a", "b", "c"]);
        assert_eq!((app.cursor_row, app.cursor_col), (2, 1));
    }

    #[test]
    fn vertical_motion_clamps_column() {
        let mut app = App::new("long line\né", None);
        app.move_cursor_end();
        app.move_cursor_down();
        assert_eq!(app.cursor_col, 2);
    }

    #[test]
    fn tab_inserts_spaces() {
        let mut app = App::new("", None);
        app.insert_tab();
        assert_eq!(app.text(), "  ");
    }

    #[test]
    fn double_ctrl_c_quits() {
        let mut app = App::new("", None);
        assert!(!app.handle_ctrl_c());
        assert!(app.handle_ctrl_c());
    }

    #[test]
    fn sink_updates_preview() {
        let mut app = App::new("", None);
        let _ = app.next_revision();
        assert!(app.running);
        app.on_output("hi\n");
        assert_eq!(app.preview, Preview::Output("hi\n".into()));
        app.on_output("");
        assert_eq!(app.preview, Preview::Empty);
        app.on_critical("boom");
        assert!(!app.running);
        assert_eq!(app.preview, Preview::Critical("boom".into()));
    }
}
