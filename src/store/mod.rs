//! Last-known editor source, kept in the user data directory.

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::Config;

const STATE_FILE: &str = "state.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredState {
    #[serde(default)]
    code: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SourceStore {
    storage_path: PathBuf,
}

impl SourceStore {
    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.user_data_path())
    }

    pub fn new(dir: PathBuf) -> Self {
        let _ = fs::create_dir_all(&dir);
        Self { storage_path: dir.join(STATE_FILE) }
    }

    pub fn path(&self) -> &PathBuf {
        &self.storage_path
    }

    /// Last saved source, if any. A missing or unreadable file is treated as empty.
    pub fn load(&self) -> Option<String> {
        let text = fs::read_to_string(&self.storage_path).ok()?;
        let state: StoredState = serde_json::from_str(&text).ok()?;
        state.code
    }

    pub fn save(&self, code: &str) -> Result<()> {
        let state = StoredState { code: Some(code.to_string()) };
        fs::write(&self.storage_path, serde_json::to_string(&state)?)
            .with_context(|| format!("failed to write {}", self.storage_path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = SourceStore::new(dir.path().to_path_buf());
        assert_eq!(store.load(), None);
        store.save("System.print(\"Hello Wren\")").unwrap();
        assert_eq!(store.load().as_deref(), Some("System.print(\"Hello Wren\")"));
    }

    #[test]
    fn corrupt_state_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SourceStore::new(dir.path().to_path_buf());
        fs::write(store.path(), "{not json").unwrap();
        assert_eq!(store.load(), None);
    }

    #[test]
    fn creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let store = SourceStore::new(nested.clone());
        store.save("1").unwrap();
        assert!(nested.join(STATE_FILE).is_file());
    }
}
