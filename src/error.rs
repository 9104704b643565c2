//! Error taxonomy for one execution attempt.

use std::path::PathBuf;

use thiserror::Error;

/// Failure classes a submission can end in. Every class is local to the
/// submission that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The interpreter binary is missing or not executable.
    SpawnFailure,
    /// Non-empty stderr from a process that did start.
    RuntimeError,
    /// The process outlived the configured deadline.
    Timeout,
    /// The scratch file could not be created or written.
    IoFailure,
}

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("failed to start {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
    #[error("interpreter {0} pipe was not captured")]
    MissingPipe(&'static str),
}

impl ExecError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Spawn { .. } => ErrorKind::SpawnFailure,
            Self::Io { .. } | Self::MissingPipe(_) => ErrorKind::IoFailure,
        }
    }
}

pub type ExecResult<T> = Result<T, ExecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_error_names_program() {
        let err = ExecError::Spawn {
            program: PathBuf::from("/opt/wren_cli"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "No such file"),
        };
        assert_eq!(err.kind(), ErrorKind::SpawnFailure);
        assert!(err.to_string().contains("/opt/wren_cli"));
    }

    #[test]
    fn io_error_keeps_context() {
        let err = ExecError::io(
            "create scratch file",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.kind(), ErrorKind::IoFailure);
        assert_eq!(err.to_string(), "create scratch file: denied");
    }
}
