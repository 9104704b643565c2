//! Run handler: executes a script once and prints its preview updates.

use std::path::Path;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use wren_live::{
    supervisor::preview_stream, PreviewUpdate, RevisionCounter, Supervisor, SupervisorSettings,
};

use crate::printer::PreviewPrinter;

pub struct RunHandler;

impl RunHandler {
    /// Returns false when the run ended with a critical update.
    pub async fn run(settings: SupervisorSettings, file: &Path, printer: &mut PreviewPrinter) -> Result<bool> {
        let text = std::fs::read_to_string(file)
            .with_context(|| format!("failed to read {}", file.display()))?;

        let (supervisor, events) = Supervisor::new(settings);
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(RevisionCounter::new().revision(text))?;
        drop(tx);

        let mut ok = true;
        let mut stream = preview_stream(supervisor, events, rx);
        while let Some(update) = stream.next().await {
            if matches!(update, PreviewUpdate::Critical(_)) {
                ok = false;
            }
            printer.print(&update);
        }
        Ok(ok)
    }
}
