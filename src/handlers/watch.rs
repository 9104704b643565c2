//! Watch handler: re-runs a script every time it changes on disk.

use std::path::Path;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use wren_live::{supervisor::preview_stream, RevisionCounter, SourceRevision, Supervisor, SupervisorSettings};

use crate::printer::PreviewPrinter;

pub struct WatchHandler;

impl WatchHandler {
    /// Runs until the process is interrupted.
    pub async fn run(settings: SupervisorSettings, file: &Path, printer: &mut PreviewPrinter) -> Result<()> {
        let file = file
            .canonicalize()
            .with_context(|| format!("failed to resolve {}", file.display()))?;
        // Editors often save by renaming over the target, so watch the parent.
        let dir = file
            .parent()
            .map(Path::to_path_buf)
            .context("watched file has no parent directory")?;

        let (change_tx, mut change_rx) = mpsc::unbounded_channel::<()>();
        let target = file.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    if is_change_to(&event, &target) {
                        debug!("File event: {:?} - {:?}", event.kind, event.paths);
                        let _ = change_tx.send(());
                    }
                }
                Err(e) => warn!("Watcher error: {}", e),
            },
            Config::default(),
        )?;
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("failed to watch {}", dir.display()))?;
        info!("watching {}", file.display());

        let (rev_tx, rev_rx) = mpsc::unbounded_channel::<SourceRevision>();
        let counter = RevisionCounter::new();
        let mut last = read_source(&file)?;
        rev_tx.send(counter.revision(last.clone()))?;

        let reader = file.clone();
        tokio::spawn(async move {
            while change_rx.recv().await.is_some() {
                let text = match read_source(&reader) {
                    Ok(text) => text,
                    // mid-rename; the next event will carry the new file
                    Err(e) => {
                        debug!("skipping change: {:#}", e);
                        continue;
                    }
                };
                if text == last {
                    continue;
                }
                last = text.clone();
                if rev_tx.send(counter.revision(text)).is_err() {
                    break;
                }
            }
        });

        printer.announce_idle = true;
        let (supervisor, events) = Supervisor::new(settings);
        let mut stream = preview_stream(supervisor, events, rev_rx);
        while let Some(update) = stream.next().await {
            printer.print(&update);
        }

        drop(watcher);
        Ok(())
    }
}

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn is_change_to(event: &Event, target: &Path) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event.paths.iter().any(|p| p == target)
}
