use std::{
    collections::HashMap,
    env,
    fs,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
    time::Duration,
};

use directories::BaseDirs;

use crate::directives::{DirectiveRoots, DOTFILE_DIR};

pub const DEFAULT_MAX_EXECUTION_MS: u64 = 3000;
pub const DEFAULT_CLEAR_DEBOUNCE_MS: u64 = 20;

#[derive(Debug, Clone)]
pub struct Config {
    inner: HashMap<String, String>,
    pub config_path: PathBuf,
}

impl Config {
    pub fn load() -> Self {
        Self::load_from(default_config_path())
    }

    pub fn load_from(config_path: PathBuf) -> Self {
        let mut map = default_map();

        // Read .wrenliverc if exists
        if config_path.exists() {
            if let Ok(file) = fs::File::open(&config_path) {
                parse_rc(BufReader::new(file), &mut map);
            }
        }

        // Overlay environment variables (take precedence)
        for (k, v) in env::vars() {
            if is_config_key(&k) {
                map.insert(k, v);
            }
        }

        Self { inner: map, config_path }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        // ENV first
        if let Ok(v) = env::var(key) {
            return Some(v);
        }
        self.inner.get(key).cloned()
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.inner.insert(key.to_string(), value.into());
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.trim().parse::<u64>().ok())
    }

    pub fn get_path(&self, key: &str) -> Option<PathBuf> {
        self.get(key).filter(|v| !v.is_empty()).map(PathBuf::from)
    }

    pub fn max_execution_time(&self) -> Duration {
        Duration::from_millis(
            self.get_u64("MAX_EXECUTION_TIME")
                .unwrap_or(DEFAULT_MAX_EXECUTION_MS),
        )
    }

    pub fn clear_debounce(&self) -> Duration {
        Duration::from_millis(
            self.get_u64("CLEAR_DEBOUNCE_MS")
                .unwrap_or(DEFAULT_CLEAR_DEBOUNCE_MS),
        )
    }

    pub fn user_data_path(&self) -> PathBuf {
        self.get_path("USER_DATA_PATH")
            .unwrap_or_else(default_user_data_path)
    }

    pub fn resources_path(&self) -> PathBuf {
        self.get_path("RESOURCES_PATH")
            .unwrap_or_else(default_resources_path)
    }

    /// Where scratch files go; `None` means the system temp dir.
    pub fn scratch_path(&self) -> Option<PathBuf> {
        self.get_path("SCRATCH_PATH")
    }

    pub fn log_level(&self) -> String {
        self.get("LOG_LEVEL").unwrap_or_else(|| "info".into())
    }

    pub fn home_path(&self) -> PathBuf {
        BaseDirs::new()
            .map(|b| b.home_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn directive_roots(&self) -> DirectiveRoots {
        DirectiveRoots::new(
            self.resources_path().join("lib"),
            self.home_path(),
            self.user_data_path(),
        )
    }

    /// Pick the interpreter binary: explicit path, `WREN_CLI`, a user
    /// installed binary, then the one bundled with the resources.
    pub fn interpreter_path(&self, explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        if let Some(path) = self.get_path("WREN_CLI") {
            return path;
        }

        let user_data = self.user_data_path();
        let dotfile = self.home_path().join(DOTFILE_DIR);
        let candidates = [
            user_data.join(exe_name("wren")),
            dotfile.join(exe_name("wren")),
            user_data.join(exe_name("wren_cli")),
            dotfile.join(exe_name("wren_cli")),
        ];
        if let Some(found) = candidates.into_iter().find(|p| p.is_file()) {
            tracing::info!(path = %found.display(), "using custom interpreter");
            return found;
        }

        let bundled = if cfg!(target_os = "macos") {
            "wren_cli-macos"
        } else if cfg!(windows) {
            "wren_cli-windows.exe"
        } else {
            "wren_cli-linux"
        };
        self.resources_path().join(bundled)
    }
}

fn exe_name(stem: &str) -> String {
    if cfg!(windows) {
        format!("{}.exe", stem)
    } else {
        stem.to_string()
    }
}

fn parse_rc<R: BufRead>(reader: R, map: &mut HashMap<String, String>) {
    for line in reader.lines().map_while(Result::ok) {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((k, v)) = line.split_once('=') {
            map.insert(k.trim().to_string(), v.trim().to_string());
        }
    }
}

fn is_config_key(k: &str) -> bool {
    const KEYS: &[&str] = &[
        "WREN_CLI",
        "MAX_EXECUTION_TIME",
        "CLEAR_DEBOUNCE_MS",
        "USER_DATA_PATH",
        "RESOURCES_PATH",
        "SCRATCH_PATH",
        "LOG_LEVEL",
    ];

    KEYS.contains(&k) || k.starts_with("WREN_LIVE_")
}

fn default_config_path() -> PathBuf {
    let base = BaseDirs::new()
        .map(|b| b.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("~/.config"));
    base.join("wren_live").join(".wrenliverc")
}

fn default_user_data_path() -> PathBuf {
    BaseDirs::new()
        .map(|b| b.data_dir().to_path_buf())
        .unwrap_or_else(env::temp_dir)
        .join("wren_live")
}

fn default_resources_path() -> PathBuf {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("assets")))
        .unwrap_or_else(|| PathBuf::from("assets"))
}

fn default_map() -> HashMap<String, String> {
    let mut m = HashMap::new();
    m.insert("MAX_EXECUTION_TIME".into(), DEFAULT_MAX_EXECUTION_MS.to_string());
    m.insert("CLEAR_DEBOUNCE_MS".into(), DEFAULT_CLEAR_DEBOUNCE_MS.to_string());
    m.insert("LOG_LEVEL".into(), "info".into());
    m
}
