//! Printers: terminal rendering of preview updates for headless runs.

use owo_colors::OwoColorize;
use wren_live::{Diagnostic, PreviewSink, PreviewUpdate};

/// Prints updates as they arrive. Output is printed incrementally: only the
/// part of the accumulated stdout not yet shown is written.
pub struct PreviewPrinter {
    pub json: bool,
    pub color: bool,
    pub announce_idle: bool,
    shown: String,
    diagnostics: Vec<Diagnostic>,
}

impl PreviewPrinter {
    pub fn new(json: bool, color: bool) -> Self {
        Self {
            json,
            color,
            announce_idle: false,
            shown: String::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn print(&mut self, update: &PreviewUpdate) {
        if self.json {
            match serde_json::to_string(update) {
                Ok(line) => println!("{}", line),
                Err(e) => tracing::warn!("failed to encode update: {}", e),
            }
            return;
        }
        update.apply(self);
    }

    fn flush_diagnostics(&mut self) {
        if self.diagnostics.is_empty() {
            return;
        }
        eprint!("{}", render_diagnostics(&self.diagnostics, self.color));
        self.diagnostics.clear();
    }

    fn reset(&mut self) {
        self.shown.clear();
        self.diagnostics.clear();
    }
}

impl PreviewSink for PreviewPrinter {
    fn on_idle(&mut self) {
        self.flush_diagnostics();
        if self.announce_idle {
            let note = "waiting for changes";
            if self.color {
                eprintln!("{}", note.dimmed());
            } else {
                eprintln!("{}", note);
            }
        }
        self.reset();
    }

    fn on_output(&mut self, text: &str) {
        if text.is_empty() {
            self.shown.clear();
            return;
        }
        match text.strip_prefix(self.shown.as_str()) {
            Some(rest) => print!("{}", rest),
            // a new run started without a terminal update for the old one
            None => print!("{}", text),
        }
        self.shown = text.to_string();
    }

    fn on_output_trimmed(&mut self, bytes: usize) {
        let mut cut = bytes.min(self.shown.len());
        while !self.shown.is_char_boundary(cut) {
            cut += 1;
        }
        self.shown.drain(..cut);
    }

    fn on_diagnostics(&mut self, diagnostics: &[Diagnostic]) {
        self.diagnostics = diagnostics.to_vec();
    }

    fn on_critical(&mut self, message: &str) {
        self.flush_diagnostics();
        if self.color {
            eprintln!("{}", message.red().bold());
        } else {
            eprintln!("{}", message);
        }
        self.reset();
    }
}

/// Numbered error blocks, or the raw text when nothing was structured.
pub fn render_diagnostics(diagnostics: &[Diagnostic], color: bool) -> String {
    let mut out = String::new();
    for (index, diag) in diagnostics.iter().enumerate() {
        let Some(line) = diag.line else {
            out.push_str(&diag.message);
            if !diag.message.ends_with('\n') {
                out.push('\n');
            }
            continue;
        };
        let header = format!("Error {}", index);
        if color {
            out.push_str(&format!("{}\n", header.red().bold()));
        } else {
            out.push_str(&header);
            out.push('\n');
        }
        out.push_str(&format!("  line: {}\n", line));
        out.push_str(&format!("  context: {}\n", diag.context));
        out.push_str(&format!("  message:{}\n", diag.message));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_structured_diagnostics() {
        let diags = wren_live::diagnostics::parse("[main line 3] Error at 'x': boom");
        let text = render_diagnostics(&diags, false);
        assert_eq!(text, "Error 0\n  line: 3\n  context: Error at 'x'\n  message: boom\n");
    }

    #[test]
    fn renders_raw_fallback() {
        let diags = wren_live::diagnostics::parse("Segmentation fault");
        assert_eq!(render_diagnostics(&diags, false), "Segmentation fault\n");
    }

    #[test]
    fn output_prefix_tracking() {
        let mut printer = PreviewPrinter::new(false, false);
        printer.on_output("a\n");
        printer.on_output("a\nb\n");
        assert_eq!(printer.shown, "a\nb\n");
        printer.on_output("");
        assert!(printer.shown.is_empty());
    }

    #[test]
    fn trimmed_window_still_prints_only_new_text() {
        let mut printer = PreviewPrinter::new(false, false);
        printer.on_output("abc");
        printer.on_output_trimmed(2);
        assert_eq!(printer.shown, "c");
        printer.on_output("cd");
        assert_eq!(printer.shown, "cd");
    }
}
