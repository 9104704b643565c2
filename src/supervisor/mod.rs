//! Execution supervisor: runs the interpreter once per edit.
//!
//! A [`Supervisor`] belongs to one editing session and keeps at most one
//! process alive. [`Supervisor::submit`] kills the running process, detaches
//! its events, and starts a new one. Handle tasks report on a single channel;
//! the caller feeds each [`Envelope`] back through [`Supervisor::deliver`] on
//! its own thread, which drops anything not produced by the attached handle.

use std::{
    path::PathBuf,
    process::Stdio,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::{
    config::Config,
    diagnostics,
    directives::{self, DirectiveRoots},
    error::{ErrorKind, ExecError, ExecResult},
    scratch::ScratchFile,
    source::SourceRevision,
};

pub mod handle;
pub mod sink;
pub mod stream;

pub use handle::{CloseReason, Envelope, ExecutionHandle, HandleId, OutputEvent};
pub use sink::{PreviewSink, PreviewUpdate};
pub use stream::preview_stream;

use handle::{kill, Notice, Pump, SharedChild};

pub type EventReceiver = mpsc::UnboundedReceiver<Envelope>;

/// Most recent bytes of stdout, and of stderr, kept per run and shown to the sink.
pub const OUTPUT_WINDOW: usize = 64 * 1024;

// a single coalesced chunk never pushes unseen text out of the window
const _: () = assert!(handle::PENDING_LIMIT + handle::CHUNK_SIZE < OUTPUT_WINDOW);

/// Drop the front of `buf` so at most `limit` bytes remain, cutting on a char
/// boundary. Returns the number of bytes dropped.
fn keep_tail(buf: &mut String, limit: usize) -> usize {
    if buf.len() <= limit {
        return 0;
    }
    let mut cut = buf.len() - limit;
    while !buf.is_char_boundary(cut) {
        cut += 1;
    }
    buf.drain(..cut);
    cut
}

#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    /// Interpreter binary, invoked as `<program> <scratch file>`.
    pub program: PathBuf,
    pub roots: DirectiveRoots,
    pub max_duration: Duration,
    /// Quiet period before a silent run clears the previous preview.
    pub clear_delay: Duration,
    /// Scratch file directory; `None` uses the system temp dir.
    pub scratch_dir: Option<PathBuf>,
}

impl SupervisorSettings {
    pub fn new(program: impl Into<PathBuf>, roots: DirectiveRoots) -> Self {
        Self {
            program: program.into(),
            roots,
            max_duration: Duration::from_millis(crate::config::DEFAULT_MAX_EXECUTION_MS),
            clear_delay: Duration::from_millis(crate::config::DEFAULT_CLEAR_DEBOUNCE_MS),
            scratch_dir: None,
        }
    }

    pub fn from_config(cfg: &Config, program: PathBuf) -> Self {
        Self {
            program,
            roots: cfg.directive_roots(),
            max_duration: cfg.max_execution_time(),
            clear_delay: cfg.clear_debounce(),
            scratch_dir: cfg.scratch_path(),
        }
    }

    pub fn max_duration(mut self, limit: Duration) -> Self {
        self.max_duration = limit;
        self
    }

    pub fn clear_delay(mut self, delay: Duration) -> Self {
        self.clear_delay = delay;
        self
    }

    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running(HandleId),
}

/// How the most recent run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    TimedOut,
    Cancelled,
    Failed,
}

struct ActiveRun {
    handle: ExecutionHandle,
    child: SharedChild,
    cancel: CancellationToken,
}

/// Accumulated state of the handle whose events reach the sink.
struct Attached {
    id: HandleId,
    stdout: String,
    stderr: String,
    /// Any stdout or stderr arrived.
    seen_output: bool,
    cleared: bool,
    finished: bool,
}

impl Attached {
    fn new(id: HandleId) -> Self {
        Self {
            id,
            stdout: String::new(),
            stderr: String::new(),
            seen_output: false,
            cleared: false,
            finished: false,
        }
    }

    fn clear_if_silent(&mut self, sink: &mut dyn PreviewSink) {
        if !self.seen_output && !self.cleared {
            self.cleared = true;
            sink.on_output("");
        }
    }
}

pub struct Supervisor {
    settings: SupervisorSettings,
    tx: mpsc::UnboundedSender<Envelope>,
    next_id: u64,
    attached: Option<Attached>,
    active: Option<ActiveRun>,
    clear_timer: Option<JoinHandle<()>>,
    state: SessionState,
    last_outcome: Option<Outcome>,
}

impl Supervisor {
    pub fn new(settings: SupervisorSettings) -> (Self, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let supervisor = Self {
            settings,
            tx,
            next_id: 0,
            attached: None,
            active: None,
            clear_timer: None,
            state: SessionState::Idle,
            last_outcome: None,
        };
        (supervisor, rx)
    }

    pub fn settings(&self) -> &SupervisorSettings {
        &self.settings
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn last_outcome(&self) -> Option<Outcome> {
        self.last_outcome
    }

    /// The live process, if any.
    pub fn active_handle(&self) -> Option<&ExecutionHandle> {
        self.active.as_ref().map(|run| &run.handle)
    }

    /// True once the attached handle has delivered its terminal event.
    pub fn is_settled(&self) -> bool {
        self.attached.as_ref().map_or(true, |a| a.finished)
    }

    /// Run `revision`, replacing whatever is running. Never blocks; must be
    /// called from within a Tokio runtime.
    pub fn submit(&mut self, revision: &SourceRevision) -> HandleId {
        self.supersede();

        self.next_id += 1;
        let id = HandleId(self.next_id);
        self.attached = Some(Attached::new(id));

        match self.launch(id, revision) {
            Ok(run) => {
                info!(
                    handle = %id,
                    revision = revision.id,
                    pid = ?run.handle.pid,
                    "interpreter started"
                );
                self.state = SessionState::Running(id);
                self.active = Some(run);
                self.arm_clear(id);
            }
            Err(err) => {
                warn!(handle = %id, kind = ?err.kind(), "submission failed: {}", err);
                self.state = SessionState::Idle;
                self.last_outcome = Some(Outcome::Failed);
                let _ = self
                    .tx
                    .send(Envelope::output(id, OutputEvent::Error(err.to_string())));
            }
        }

        id
    }

    /// Kill the running process and detach its events.
    pub fn shutdown(&mut self) {
        self.supersede();
    }

    fn supersede(&mut self) {
        if let Some(timer) = self.clear_timer.take() {
            timer.abort();
        }
        if let Some(run) = self.active.take() {
            debug!(handle = %run.handle.id, pid = ?run.handle.pid, "killing superseded interpreter");
            kill(&run.child, run.handle.id);
            run.cancel.cancel();
            self.last_outcome = Some(Outcome::Cancelled);
        }
        self.attached = None;
        self.state = SessionState::Idle;
    }

    fn launch(&self, id: HandleId, revision: &SourceRevision) -> ExecResult<ActiveRun> {
        let mut scratch = ScratchFile::create(self.settings.scratch_dir.as_deref())?;
        let resolved = directives::resolve(revision, &self.settings.roots, scratch.path());
        scratch.write(&resolved.text)?;

        let mut command = Command::new(&self.settings.program);
        command
            .arg(scratch.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|source| ExecError::Spawn {
            program: self.settings.program.clone(),
            source,
        })?;
        let stdout = child.stdout.take().ok_or(ExecError::MissingPipe("stdout"))?;
        let stderr = child.stderr.take().ok_or(ExecError::MissingPipe("stderr"))?;

        let started_at = Instant::now();
        let handle = ExecutionHandle {
            id,
            revision: resolved.revision,
            pid: child.id(),
            started_at,
            deadline: started_at + self.settings.max_duration,
            scratch_path: scratch.path().to_path_buf(),
        };

        let child = Arc::new(Mutex::new(child));
        let cancel = CancellationToken::new();
        let pump = Pump {
            id,
            child: Arc::clone(&child),
            stdout,
            stderr,
            scratch,
            limit: self.settings.max_duration,
            cancel: cancel.clone(),
            tx: self.tx.clone(),
        };
        tokio::spawn(pump.run());

        Ok(ActiveRun { handle, child, cancel })
    }

    fn arm_clear(&mut self, id: HandleId) {
        let tx = self.tx.clone();
        let delay = self.settings.clear_delay;
        self.clear_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Envelope::clear_due(id));
        }));
    }

    /// Route one envelope to `sink`. Returns false when it was dropped as stale.
    pub fn deliver(&mut self, envelope: Envelope, sink: &mut dyn PreviewSink) -> bool {
        let Some(attached) = self
            .attached
            .as_mut()
            .filter(|a| a.id == envelope.handle && !a.finished)
        else {
            trace!(handle = %envelope.handle, "dropping event from detached handle");
            return false;
        };

        let outcome = match envelope.notice {
            Notice::ClearDue => {
                attached.clear_if_silent(sink);
                None
            }
            Notice::Output(OutputEvent::Stdout(text)) => {
                attached.seen_output = true;
                attached.stdout.push_str(&text);
                let dropped = keep_tail(&mut attached.stdout, OUTPUT_WINDOW);
                if dropped > 0 {
                    sink.on_output_trimmed(dropped);
                }
                sink.on_output(&attached.stdout);
                None
            }
            Notice::Output(OutputEvent::Stderr(text)) => {
                attached.seen_output = true;
                attached.stderr.push_str(&text);
                keep_tail(&mut attached.stderr, OUTPUT_WINDOW);
                debug!(handle = %attached.id, kind = ?ErrorKind::RuntimeError, "interpreter wrote to stderr");
                sink.on_diagnostics(&diagnostics::parse(&attached.stderr));
                None
            }
            Notice::Output(OutputEvent::Closed(CloseReason::Exited)) => {
                attached.clear_if_silent(sink);
                sink.on_idle();
                Some(Outcome::Completed)
            }
            Notice::Output(OutputEvent::Closed(CloseReason::TimedOut)) => {
                let limit = self.settings.max_duration.as_millis();
                warn!(handle = %attached.id, kind = ?ErrorKind::Timeout, limit_ms = limit as u64, "run timed out");
                sink.on_critical(&format!(
                    "Execution stopped: still running after {} ms",
                    limit
                ));
                Some(Outcome::TimedOut)
            }
            Notice::Output(OutputEvent::Error(message)) => {
                sink.on_critical(&message);
                Some(Outcome::Failed)
            }
        };

        if let Some(outcome) = outcome {
            attached.finished = true;
            self.finish(outcome);
        }
        true
    }

    fn finish(&mut self, outcome: Outcome) {
        if let Some(timer) = self.clear_timer.take() {
            timer.abort();
        }
        if let Some(run) = self.active.take() {
            debug!(
                handle = %run.handle.id,
                elapsed_ms = run.handle.started_at.elapsed().as_millis() as u64,
                ?outcome,
                "run finished"
            );
        }
        self.state = SessionState::Idle;
        self.last_outcome = Some(outcome);
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.supersede();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keep_tail_cuts_on_char_boundary() {
        let mut buf = "aé€z".to_string();
        // dropping one byte would split 'é'
        assert_eq!(keep_tail(&mut buf, 6), 3);
        assert_eq!(buf, "€z");
        assert_eq!(keep_tail(&mut buf, 6), 0);
        assert_eq!(buf, "€z");
    }
}
