//! Live preview runner for Wren scripts.
//!
//! Every edit is rewritten for import directives, written to a scratch file,
//! and run through an external interpreter. The [`supervisor`] keeps a single
//! process alive per session and turns its output into preview updates.

pub mod config;
pub mod diagnostics;
pub mod directives;
pub mod error;
pub mod logging;
pub mod scratch;
pub mod source;
pub mod store;
pub mod supervisor;

pub use diagnostics::Diagnostic;
pub use error::{ErrorKind, ExecError};
pub use source::{ResolvedSource, RevisionCounter, SourceRevision};
pub use supervisor::{PreviewSink, PreviewUpdate, Supervisor, SupervisorSettings};
