use directories::ProjectDirs;
use std::path::PathBuf;

const APP_NAME: &str = "tapwpm";

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    fn project() -> Option<ProjectDirs> {
        ProjectDirs::from("", "", APP_NAME)
    }

    pub fn config_path() -> PathBuf {
        Self::project()
            .map(|pd| pd.config_dir().join("config.json"))
            .unwrap_or_else(|| PathBuf::from("tapwpm_config.json"))
    }

    pub fn scores_path() -> PathBuf {
        Self::project()
            .map(|pd| pd.data_local_dir().join("scores.csv"))
            .unwrap_or_else(|| PathBuf::from("scores.csv"))
    }

    pub fn custom_texts_path() -> PathBuf {
        Self::project()
            .map(|pd| pd.data_local_dir().join("sentences.txt"))
            .unwrap_or_else(|| PathBuf::from("sentences.txt"))
    }

    pub fn log_dir() -> PathBuf {
        if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home)
                .join(".local")
                .join("state")
                .join(APP_NAME)
        } else {
            Self::project()
                .map(|pd| pd.data_local_dir().to_path_buf())
                .unwrap_or_else(|| PathBuf::from("."))
        }
    }
}
