//! Structured diagnostics extracted from interpreter stderr.
//!
//! The interpreter reports errors as lines shaped like
//! `[main line 3] Error at 'foo': Expected expression.`. Each line is matched
//! on its own; lines without the marker (wrapped continuations, stack frames)
//! do not contribute structured records.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// `<anything>line<anything>N] <context>:<message>`, case-insensitive.
/// The context is greedy, so it runs to the last colon on the line.
static DIAGNOSTIC_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i).+line.*?([0-9]+)\]\s*(.+):(.*)").expect("diagnostic pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Source line reported by the interpreter, `None` for unstructured text.
    /// Numbers too large to represent saturate at `u64::MAX`.
    pub line: Option<u64>,
    pub context: String,
    pub message: String,
    /// The whole stderr blob this record was parsed from.
    pub raw: String,
}

impl Diagnostic {
    pub fn unstructured(blob: &str) -> Self {
        Self {
            line: None,
            context: String::new(),
            message: blob.to_string(),
            raw: blob.to_string(),
        }
    }

    pub fn is_structured(&self) -> bool {
        self.line.is_some()
    }
}

/// Parse a stderr blob into diagnostics in line order.
///
/// When no line matches, the whole blob becomes one unstructured record.
/// An empty blob yields no records.
pub fn parse(blob: &str) -> Vec<Diagnostic> {
    if blob.is_empty() {
        return Vec::new();
    }

    let found: Vec<Diagnostic> = blob
        .split('\n')
        .filter_map(|line| DIAGNOSTIC_LINE.captures(line))
        .map(|caps| Diagnostic {
            line: Some(caps[1].parse().unwrap_or(u64::MAX)),
            context: caps[2].to_string(),
            message: caps[3].to_string(),
            raw: blob.to_string(),
        })
        .collect();

    if found.is_empty() {
        vec![Diagnostic::unstructured(blob)]
    } else {
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_marker_line() {
        let diags = parse("...line [3] BadArg: expected a number");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].line, Some(3));
        assert_eq!(diags[0].context, "BadArg");
        assert_eq!(diags[0].message, " expected a number");
        assert_eq!(diags[0].raw, "...line [3] BadArg: expected a number");
    }

    #[test]
    fn interpreter_compile_error() {
        let blob = "[./main line 12] Error at 'x': Variable is used but not defined.\n";
        let diags = parse(blob);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].line, Some(12));
        assert_eq!(diags[0].context, "Error at 'x'");
        assert_eq!(diags[0].message, " Variable is used but not defined.");
        assert_eq!(diags[0].raw, blob);
    }

    #[test]
    fn context_runs_to_last_colon() {
        let diags = parse("[main line 4] Error: at: here");
        assert_eq!(diags[0].context, "Error: at");
        assert_eq!(diags[0].message, " here");
    }

    #[test]
    fn marker_is_case_insensitive() {
        let diags = parse("[main LINE 9] Runtime: boom");
        assert_eq!(diags[0].line, Some(9));
    }

    #[test]
    fn several_lines_keep_document_order_and_share_raw() {
        let blob = "[a line 1] Error at 'a': first\nunrelated\n[b line 20] Error at 'b': second";
        let diags = parse(blob);
        assert_eq!(diags.len(), 2);
        assert_eq!(diags[0].line, Some(1));
        assert_eq!(diags[1].line, Some(20));
        assert_eq!(diags[1].message, " second");
        assert!(diags.iter().all(|d| d.raw == blob));
    }

    #[test]
    fn continuation_lines_are_dropped() {
        let blob = "[main line 2] Error at 'y': Expected\n  a closing brace";
        let diags = parse(blob);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].message, " Expected");
    }

    #[test]
    fn no_marker_falls_back_to_whole_blob() {
        let blob = "Could not find module 'json'.\nat main";
        let diags = parse(blob);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].line, None);
        assert!(!diags[0].is_structured());
        assert_eq!(diags[0].message, blob);
        assert_eq!(diags[0].raw, blob);
    }

    #[test]
    fn marker_needs_leading_text() {
        // `line` at column zero has nothing before it
        let diags = parse("line 3] Oops: x");
        assert_eq!(diags[0].line, None);
    }

    #[test]
    fn oversized_line_numbers_stay_structured() {
        let diags = parse("[main line 4294967296] Error: big");
        assert_eq!(diags[0].line, Some(4_294_967_296));

        let diags = parse("[main line 123456789012345678901234567890] Error: huge");
        assert!(diags[0].is_structured());
        assert_eq!(diags[0].line, Some(u64::MAX));
        assert_eq!(diags[0].message, " huge");
    }

    #[test]
    fn only_ascii_digits_count_as_line_numbers() {
        let diags = parse("[main line \u{0663}] Error: x");
        assert!(!diags[0].is_structured());
    }

    #[test]
    fn empty_blob() {
        assert!(parse("").is_empty());
    }
}
