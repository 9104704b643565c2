//! Pull-style adapter over a supervisor.

use std::pin::Pin;

use async_stream::stream;
use futures_core::Stream;
use tokio::sync::mpsc;

use super::{EventReceiver, PreviewUpdate, Supervisor};
use crate::source::SourceRevision;

/// Drive `supervisor` from a channel of revisions and yield every preview
/// update for the attached handle.
///
/// Each revision received supersedes the previous run. The stream ends once
/// the revision channel is closed and the last run has reached its terminal
/// update; the supervisor is shut down when the stream is dropped.
pub fn preview_stream(
    mut supervisor: Supervisor,
    mut events: EventReceiver,
    mut revisions: mpsc::UnboundedReceiver<SourceRevision>,
) -> Pin<Box<dyn Stream<Item = PreviewUpdate> + Send>> {
    Box::pin(stream! {
        let mut open = true;
        loop {
            if !open && supervisor.is_settled() {
                break;
            }

            let mut batch: Vec<PreviewUpdate> = Vec::new();
            tokio::select! {
                revision = revisions.recv(), if open => match revision {
                    Some(revision) => {
                        supervisor.submit(&revision);
                    }
                    None => open = false,
                },
                Some(envelope) = events.recv() => {
                    supervisor.deliver(envelope, &mut batch);
                }
                else => break,
            }

            for update in batch {
                yield update;
            }
        }
        supervisor.shutdown();
    })
}
