// Scoring, sessions, passages and score history for the tapwpm typing test.
// The terminal front-end lives in main.rs and ui.rs.
pub mod app_dirs;
pub mod config;
pub mod error;
pub mod history;
pub mod passages;
pub mod runtime;
pub mod scoring;
pub mod session;
pub mod telemetry;

pub use error::{Result, TapError};
pub use history::{CsvHistoryStore, HistoryStore, ScoreHistory, ScoreRecord};
pub use passages::TextSource;
pub use scoring::{finalize, update, CorrectnessVector, Outcome, SessionResult};
pub use session::{Mode, Session};
