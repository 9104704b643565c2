//! Scratch files holding resolved source for one execution.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{Builder, NamedTempFile};

use crate::error::{ExecError, ExecResult};

const PREFIX: &str = "wren-live-";
const SUFFIX: &str = ".wren";

/// A uniquely named file the interpreter reads. The file is removed on
/// [`ScratchFile::close`] or when the value is dropped, whichever comes first.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
    file: Option<NamedTempFile>,
}

impl ScratchFile {
    /// Allocate a new scratch file in `dir`, or the system temp dir.
    pub fn create(dir: Option<&Path>) -> ExecResult<Self> {
        let mut builder = Builder::new();
        builder.prefix(PREFIX).suffix(SUFFIX);
        let file = match dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(|e| ExecError::io("create scratch file", e))?;

        Ok(Self {
            path: file.path().to_path_buf(),
            file: Some(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `text` and flush it so a child process sees the full content.
    pub fn write(&mut self, text: &str) -> ExecResult<()> {
        let file = self.file.as_mut().ok_or_else(|| {
            ExecError::io(
                "write scratch file",
                std::io::Error::other("scratch file already closed"),
            )
        })?;
        file.write_all(text.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| ExecError::io(format!("write {}", self.path.display()), e))
    }

    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    /// Release the handle and delete the file. Safe to call repeatedly.
    pub fn close(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = file.close() {
                tracing::warn!(path = %self.path.display(), "failed to remove scratch file: {}", e);
            }
        }
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn written_text_reads_back_identically() {
        let dir = tempfile::tempdir().unwrap();
        let mut scratch = ScratchFile::create(Some(dir.path())).unwrap();
        let text = "import \"random\" for Random\nSystem.print(\"héllo\\t\")\r\n";
        scratch.write(text).unwrap();
        assert_eq!(std::fs::read(scratch.path()).unwrap(), text.as_bytes());
    }

    #[test]
    fn names_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let a = ScratchFile::create(Some(dir.path())).unwrap();
        let b = ScratchFile::create(Some(dir.path())).unwrap();
        assert_ne!(a.path(), b.path());
        assert!(a.path().extension().is_some_and(|ext| ext == "wren"));
    }

    #[test]
    fn close_is_idempotent_and_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut scratch = ScratchFile::create(Some(dir.path())).unwrap();
        scratch.write("System.print(1)").unwrap();
        let path = scratch.path().to_path_buf();
        scratch.close();
        scratch.close();
        assert!(scratch.is_closed());
        assert!(!path.exists());
        assert!(scratch.write("again").is_err());
    }

    #[test]
    fn drop_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let scratch = ScratchFile::create(Some(dir.path())).unwrap();
            scratch.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn missing_directory_is_io_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = ScratchFile::create(Some(&dir.path().join("missing"))).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::IoFailure);
    }
}
