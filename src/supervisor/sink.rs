//! The contract between the supervisor and whatever renders its results.

use serde::Serialize;
use tokio::sync::mpsc;

use crate::diagnostics::Diagnostic;

/// Receives preview state for the attached handle only.
///
/// `on_output` and `on_diagnostics` always carry the full accumulated state of
/// the current run, so a projector replaces what it shows instead of
/// appending. `on_output("")` clears the preview. `on_idle` and `on_critical`
/// are terminal: each run ends in exactly one of them.
pub trait PreviewSink {
    fn on_idle(&mut self);
    fn on_output(&mut self, text: &str);

    /// Called before `on_output` when the kept stdout window has dropped
    /// `bytes` from its front since the previous `on_output`. Only sinks that
    /// print deltas need it.
    fn on_output_trimmed(&mut self, _bytes: usize) {}

    fn on_diagnostics(&mut self, diagnostics: &[Diagnostic]);
    fn on_critical(&mut self, message: &str);
}

/// Owned form of one sink callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum PreviewUpdate {
    Idle,
    Output(String),
    Trimmed(usize),
    Diagnostics(Vec<Diagnostic>),
    Critical(String),
}

impl PreviewUpdate {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Idle | Self::Critical(_))
    }

    /// Replay this update onto a sink.
    pub fn apply(&self, sink: &mut dyn PreviewSink) {
        match self {
            Self::Idle => sink.on_idle(),
            Self::Output(text) => sink.on_output(text),
            Self::Trimmed(bytes) => sink.on_output_trimmed(*bytes),
            Self::Diagnostics(diagnostics) => sink.on_diagnostics(diagnostics),
            Self::Critical(message) => sink.on_critical(message),
        }
    }
}

impl PreviewSink for Vec<PreviewUpdate> {
    fn on_idle(&mut self) {
        self.push(PreviewUpdate::Idle);
    }

    fn on_output(&mut self, text: &str) {
        self.push(PreviewUpdate::Output(text.to_string()));
    }

    fn on_output_trimmed(&mut self, bytes: usize) {
        self.push(PreviewUpdate::Trimmed(bytes));
    }

    fn on_diagnostics(&mut self, diagnostics: &[Diagnostic]) {
        self.push(PreviewUpdate::Diagnostics(diagnostics.to_vec()));
    }

    fn on_critical(&mut self, message: &str) {
        self.push(PreviewUpdate::Critical(message.to_string()));
    }
}

/// Forward updates to another task; a closed receiver drops them.
impl PreviewSink for mpsc::UnboundedSender<PreviewUpdate> {
    fn on_idle(&mut self) {
        let _ = self.send(PreviewUpdate::Idle);
    }

    fn on_output(&mut self, text: &str) {
        let _ = self.send(PreviewUpdate::Output(text.to_string()));
    }

    fn on_output_trimmed(&mut self, bytes: usize) {
        let _ = self.send(PreviewUpdate::Trimmed(bytes));
    }

    fn on_diagnostics(&mut self, diagnostics: &[Diagnostic]) {
        let _ = self.send(PreviewUpdate::Diagnostics(diagnostics.to_vec()));
    }

    fn on_critical(&mut self, message: &str) {
        let _ = self.send(PreviewUpdate::Critical(message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_round_trips_through_recorder() {
        let updates = vec![
            PreviewUpdate::Output(String::new()),
            PreviewUpdate::Output("1\n".into()),
            PreviewUpdate::Trimmed(2),
            PreviewUpdate::Diagnostics(vec![Diagnostic::unstructured("oops")]),
            PreviewUpdate::Critical("timed out".into()),
            PreviewUpdate::Idle,
        ];
        let mut recorded: Vec<PreviewUpdate> = Vec::new();
        for update in &updates {
            update.apply(&mut recorded);
        }
        assert_eq!(recorded, updates);
    }

    #[test]
    fn json_shape() {
        let json = serde_json::to_string(&PreviewUpdate::Output("hi".into())).unwrap();
        assert_eq!(json, r#"{"kind":"output","data":"hi"}"#);
        let json = serde_json::to_string(&PreviewUpdate::Idle).unwrap();
        assert_eq!(json, r#"{"kind":"idle"}"#);
    }

    #[test]
    fn terminal_updates() {
        assert!(PreviewUpdate::Idle.is_terminal());
        assert!(PreviewUpdate::Critical("x".into()).is_terminal());
        assert!(!PreviewUpdate::Output("x".into()).is_terminal());
        assert!(!PreviewUpdate::Trimmed(1).is_terminal());
    }
}
