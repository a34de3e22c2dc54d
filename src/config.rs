use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::app_dirs::AppDirs;
use crate::session::{Mode, DEFAULT_COUNTDOWN_SECS};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub mode: Mode,
    pub countdown_secs: u64,
    /// One short passage per line. Built-in passages when unset.
    pub sentences_path: Option<PathBuf>,
    /// One long passage per line. Built-in passages when unset.
    pub long_texts_path: Option<PathBuf>,
    pub scores_path: PathBuf,
    /// Custom passages added on top of the built-in sentences.
    pub custom_texts_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: Mode::Stopwatch,
            countdown_secs: DEFAULT_COUNTDOWN_SECS,
            sentences_path: None,
            long_texts_path: None,
            scores_path: AppDirs::scores_path(),
            custom_texts_path: AppDirs::custom_texts_path(),
        }
    }
}

impl Config {
    /// The mode with the configured countdown length applied.
    pub fn session_mode(&self) -> Mode {
        match self.mode {
            Mode::Stopwatch => Mode::Stopwatch,
            Mode::Countdown { .. } => Mode::Countdown {
                duration_secs: self.countdown_secs,
            },
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            path: AppDirs::config_path(),
        }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        if let Ok(bytes) = fs::read(&self.path) {
            match serde_json::from_slice::<Config>(&bytes) {
                Ok(cfg) => return cfg,
                Err(e) => warn!("ignoring unreadable config {}: {e}", self.path.display()),
            }
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)
    }
}
