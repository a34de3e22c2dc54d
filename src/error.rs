use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while scoring a session or persisting its results.
#[derive(Debug, Error)]
pub enum TapError {
    /// Malformed timing or an empty passage. The session is aborted.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The score history file exists but could not be parsed.
    #[error("corrupt score history at {}: {reason}", .path.display())]
    CorruptState { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TapError>;
