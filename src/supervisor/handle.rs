//! One spawned interpreter process and the task pumping its output.

use std::{
    fmt,
    path::PathBuf,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStderr, ChildStdout};
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::scratch::ScratchFile;

pub(crate) const CHUNK_SIZE: usize = 8 * 1024;

/// Output envelopes one handle may have queued but not yet delivered.
pub(crate) const IN_FLIGHT: usize = 8;

/// Bytes of undelivered output a pump buffers before it stops reading.
/// Reads resume once the control loop catches up, so a flooding process
/// blocks on its own pipe instead of growing the queue. One coalesced chunk
/// stays smaller than the supervisor's output window.
pub(crate) const PENDING_LIMIT: usize = 32 * 1024;

/// Identity of one execution handle, unique per supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandleId(pub u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Both output pipes reached end of file.
    Exited,
    /// Killed when the deadline fired.
    TimedOut,
}

/// What a handle reports, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    Stdout(String),
    Stderr(String),
    /// Spawn, scratch file, or pipe failure. Terminal.
    Error(String),
    Closed(CloseReason),
}

impl OutputEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error(_) | Self::Closed(_))
    }
}

#[derive(Debug)]
pub(crate) enum Notice {
    Output(OutputEvent),
    /// The quiet period after a submit elapsed.
    ClearDue,
}

/// An event tagged with the handle that produced it.
///
/// Output chunks hold one of their pump's in-flight permits; dropping the
/// envelope, delivered or not, lets the pump send again.
#[derive(Debug)]
pub struct Envelope {
    pub handle: HandleId,
    pub(crate) notice: Notice,
    pub(crate) permit: Option<OwnedSemaphorePermit>,
}

impl Envelope {
    pub(crate) fn output(handle: HandleId, event: OutputEvent) -> Self {
        Self {
            handle,
            notice: Notice::Output(event),
            permit: None,
        }
    }

    pub(crate) fn clear_due(handle: HandleId) -> Self {
        Self {
            handle,
            notice: Notice::ClearDue,
            permit: None,
        }
    }

    /// The output event carried, `None` for internal timer notices.
    pub fn event(&self) -> Option<&OutputEvent> {
        match &self.notice {
            Notice::Output(event) => Some(event),
            Notice::ClearDue => None,
        }
    }
}

/// Record of one spawned process.
#[derive(Debug, Clone)]
pub struct ExecutionHandle {
    pub id: HandleId,
    pub revision: u64,
    pub pid: Option<u32>,
    pub started_at: Instant,
    pub deadline: Instant,
    pub scratch_path: PathBuf,
}

pub(crate) type SharedChild = Arc<Mutex<Child>>;

/// Send SIGKILL (TerminateProcess on Windows) without waiting for the exit.
pub(crate) fn kill(child: &SharedChild, id: HandleId) {
    match child.lock() {
        Ok(mut child) => {
            if let Err(e) = child.start_kill() {
                // Already exited and reaped.
                debug!(handle = %id, "kill skipped: {}", e);
            }
        }
        Err(_) => warn!(handle = %id, "child lock poisoned, cannot kill"),
    }
}

/// Incremental UTF-8 decoding of one pipe. An incomplete sequence at the end
/// of a read is held back until the next read completes it.
#[derive(Debug, Default)]
pub(crate) struct Utf8Carry {
    carry: Vec<u8>,
}

impl Utf8Carry {
    pub fn push(&mut self, bytes: &[u8]) -> String {
        self.carry.extend_from_slice(bytes);
        let mut out = String::new();
        let mut start = 0;
        loop {
            match std::str::from_utf8(&self.carry[start..]) {
                Ok(valid) => {
                    out.push_str(valid);
                    start = self.carry.len();
                    break;
                }
                Err(e) => {
                    let valid_end = start + e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.carry[start..valid_end]));
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            start = valid_end + bad;
                        }
                        None => {
                            start = valid_end;
                            break;
                        }
                    }
                }
            }
        }
        self.carry.drain(..start);
        out
    }

    /// Whatever is left at end of file, decoded lossily.
    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.carry).into_owned();
        self.carry.clear();
        rest
    }
}

enum Finish {
    Closed(CloseReason),
    Failed(String),
    Superseded,
}

/// Reads both pipes until they close, the deadline fires, or the handle is
/// superseded. Owns the scratch file and removes it before reporting.
pub(crate) struct Pump {
    pub id: HandleId,
    pub child: SharedChild,
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
    pub scratch: ScratchFile,
    pub limit: Duration,
    pub cancel: CancellationToken,
    pub tx: mpsc::UnboundedSender<Envelope>,
}

impl Pump {
    pub async fn run(self) {
        let Pump {
            id,
            child,
            mut stdout,
            mut stderr,
            mut scratch,
            limit,
            cancel,
            tx,
        } = self;

        let send = |notice: Notice, permit: Option<OwnedSemaphorePermit>| {
            tx.send(Envelope {
                handle: id,
                notice,
                permit,
            })
            .is_ok()
        };

        let slots = Arc::new(Semaphore::new(IN_FLIGHT));
        let mut out_buf = vec![0u8; CHUNK_SIZE];
        let mut err_buf = vec![0u8; CHUNK_SIZE];
        let mut out_utf8 = Utf8Carry::default();
        let mut err_utf8 = Utf8Carry::default();
        // decoded but not yet sent; chunks coalesce here while the queue is full
        let mut out_pending = String::new();
        let mut err_pending = String::new();
        let mut out_open = true;
        let mut err_open = true;

        let deadline = tokio::time::sleep(limit);
        tokio::pin!(deadline);

        let finish = loop {
            if !out_open && !err_open {
                break Finish::Closed(CloseReason::Exited);
            }
            let has_pending = !out_pending.is_empty() || !err_pending.is_empty();
            let can_read = out_pending.len() + err_pending.len() < PENDING_LIMIT;

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break Finish::Superseded,
                _ = &mut deadline => {
                    warn!(handle = %id, limit_ms = limit.as_millis() as u64, "deadline reached, killing interpreter");
                    kill(&child, id);
                    break Finish::Closed(CloseReason::TimedOut);
                }
                permit = Arc::clone(&slots).acquire_owned(), if has_pending => {
                    let Ok(permit) = permit else {
                        break Finish::Superseded;
                    };
                    let event = if out_pending.is_empty() {
                        OutputEvent::Stderr(std::mem::take(&mut err_pending))
                    } else {
                        OutputEvent::Stdout(std::mem::take(&mut out_pending))
                    };
                    if !send(Notice::Output(event), Some(permit)) {
                        break Finish::Superseded;
                    }
                }
                read = stdout.read(&mut out_buf), if out_open && can_read => match read {
                    Ok(0) => {
                        out_pending.push_str(&out_utf8.finish());
                        out_open = false;
                    }
                    Ok(n) => out_pending.push_str(&out_utf8.push(&out_buf[..n])),
                    Err(e) => {
                        kill(&child, id);
                        break Finish::Failed(format!("failed to read interpreter output: {}", e));
                    }
                },
                read = stderr.read(&mut err_buf), if err_open && can_read => match read {
                    Ok(0) => {
                        err_pending.push_str(&err_utf8.finish());
                        err_open = false;
                    }
                    Ok(n) => err_pending.push_str(&err_utf8.push(&err_buf[..n])),
                    Err(e) => {
                        kill(&child, id);
                        break Finish::Failed(format!("failed to read interpreter errors: {}", e));
                    }
                },
            }
        };

        scratch.close();

        match finish {
            Finish::Closed(reason) => {
                if let Ok(mut guard) = child.lock() {
                    match guard.try_wait() {
                        Ok(Some(status)) => debug!(handle = %id, %status, "interpreter exited"),
                        Ok(None) => debug!(handle = %id, "interpreter pipes closed"),
                        Err(e) => debug!(handle = %id, "could not poll exit status: {}", e),
                    }
                }
                // output read before the close is still reported ahead of it
                if !out_pending.is_empty() {
                    send(Notice::Output(OutputEvent::Stdout(out_pending)), None);
                }
                if !err_pending.is_empty() {
                    send(Notice::Output(OutputEvent::Stderr(err_pending)), None);
                }
                send(Notice::Output(OutputEvent::Closed(reason)), None);
            }
            Finish::Failed(message) => {
                send(Notice::Output(OutputEvent::Error(message)), None);
            }
            Finish::Superseded => debug!(handle = %id, "pump stopped after supersession"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_events() {
        assert!(OutputEvent::Closed(CloseReason::Exited).is_terminal());
        assert!(OutputEvent::Closed(CloseReason::TimedOut).is_terminal());
        assert!(OutputEvent::Error("boom".into()).is_terminal());
        assert!(!OutputEvent::Stdout("x".into()).is_terminal());
        assert!(!OutputEvent::Stderr("x".into()).is_terminal());
    }

    #[test]
    fn handle_ids_display_and_order() {
        assert_eq!(HandleId(4).to_string(), "#4");
        assert!(HandleId(4) < HandleId(5));
    }

    #[test]
    fn split_multibyte_char_is_carried() {
        let mut utf8 = Utf8Carry::default();
        let bytes = "aé€".as_bytes();
        assert_eq!(utf8.push(&bytes[..2]), "a");
        assert_eq!(utf8.push(&bytes[2..4]), "é");
        assert_eq!(utf8.push(&bytes[4..5]), "");
        assert_eq!(utf8.push(&bytes[5..]), "€");
        assert_eq!(utf8.finish(), "");
    }

    #[test]
    fn invalid_bytes_are_replaced_and_decoding_continues() {
        let mut utf8 = Utf8Carry::default();
        assert_eq!(utf8.push(b"a\xffb"), "a\u{FFFD}b");
        assert_eq!(utf8.push(b"\xc3"), "");
        // truncated at end of file
        assert_eq!(utf8.finish(), "\u{FFFD}");
    }

    #[tokio::test]
    async fn undelivered_envelopes_hold_permits() {
        let slots = Arc::new(Semaphore::new(1));
        let permit = Arc::clone(&slots).acquire_owned().await.unwrap();
        let envelope = Envelope {
            handle: HandleId(1),
            notice: Notice::Output(OutputEvent::Stdout("x".into())),
            permit: Some(permit),
        };
        assert_eq!(slots.available_permits(), 0);
        drop(envelope);
        assert_eq!(slots.available_permits(), 1);
    }
}
