use std::cell::RefCell;
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, TapError};
use crate::scoring::SessionResult;

/// Number of results kept in the history.
pub const CAPACITY: usize = 5;

/// One persisted result. Column names follow the CSV header
/// `Time,WPM,Accuracy,Timestamp`; files written without the timestamp
/// column still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    #[serde(rename = "Time")]
    pub elapsed_secs: f64,
    #[serde(rename = "WPM")]
    pub wpm: f64,
    #[serde(rename = "Accuracy")]
    pub accuracy: f64,
    #[serde(rename = "Timestamp", default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ScoreRecord {
    pub fn from_result(result: &SessionResult, timestamp: DateTime<Utc>) -> Self {
        Self {
            elapsed_secs: result.elapsed_secs,
            wpm: result.wpm,
            accuracy: result.accuracy,
            timestamp: Some(timestamp),
        }
    }

    fn is_valid(&self) -> bool {
        [self.elapsed_secs, self.wpm, self.accuracy]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0)
            && self.accuracy <= 100.0
    }
}

/// Ranking: higher wpm first, then higher accuracy, then the older record.
pub fn rank_order(a: &ScoreRecord, b: &ScoreRecord) -> Ordering {
    b.wpm
        .total_cmp(&a.wpm)
        .then_with(|| b.accuracy.total_cmp(&a.accuracy))
        .then_with(|| a.timestamp.cmp(&b.timestamp))
}

pub trait HistoryStore {
    /// Read every stored record. A missing store is an empty history.
    fn load(&self) -> Result<Vec<ScoreRecord>>;
    /// Replace the stored records.
    fn save(&self, records: &[ScoreRecord]) -> Result<()>;
}

/// CSV file store, one record per row.
#[derive(Debug, Clone)]
pub struct CsvHistoryStore {
    path: PathBuf,
}

impl CsvHistoryStore {
    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn corrupt(&self, reason: impl ToString) -> TapError {
        TapError::CorruptState {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }

    fn map_csv_error(&self, err: csv::Error) -> TapError {
        if err.is_io_error() {
            TapError::Io(err.into())
        } else {
            self.corrupt(err)
        }
    }
}

impl HistoryStore for CsvHistoryStore {
    fn load(&self) -> Result<Vec<ScoreRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_path(&self.path).map_err(|e| self.map_csv_error(e))?;
        let mut records = Vec::new();
        for row in reader.deserialize::<ScoreRecord>() {
            let record = row.map_err(|e| self.map_csv_error(e))?;
            if !record.is_valid() {
                return Err(self.corrupt(format!("out of range values in {record:?}")));
            }
            records.push(record);
        }
        debug!(path = %self.path.display(), count = records.len(), "loaded score history");
        Ok(records)
    }

    fn save(&self, records: &[ScoreRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = self.path.with_extension("csv.tmp");

        let mut writer = csv::Writer::from_path(&tmp_path).map_err(|e| self.map_csv_error(e))?;
        for record in records {
            writer
                .serialize(record)
                .map_err(|e| self.map_csv_error(e))?;
        }
        writer.flush()?;
        drop(writer);

        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

/// Store kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    records: RefCell<Vec<ScoreRecord>>,
}

impl MemoryHistoryStore {
    pub fn new(records: Vec<ScoreRecord>) -> Self {
        Self {
            records: RefCell::new(records),
        }
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn load(&self) -> Result<Vec<ScoreRecord>> {
        Ok(self.records.borrow().clone())
    }

    fn save(&self, records: &[ScoreRecord]) -> Result<()> {
        *self.records.borrow_mut() = records.to_vec();
        Ok(())
    }
}

/// The ranked top results, backed by a store.
#[derive(Debug)]
pub struct ScoreHistory<S: HistoryStore> {
    store: S,
    records: Vec<ScoreRecord>,
}

impl<S: HistoryStore> ScoreHistory<S> {
    /// Load the history, starting empty if the store is unreadable. The
    /// store itself is left untouched until the next [`ScoreHistory::record`].
    pub fn open(store: S) -> Self {
        let mut history = Self {
            store,
            records: Vec::new(),
        };
        match history.load() {
            Ok(records) => history.records = records,
            Err(e) => warn!("{e}; starting with an empty score history"),
        }
        history
    }

    /// Read the store and return its records in rank order, capped at
    /// [`CAPACITY`].
    pub fn load(&self) -> Result<Vec<ScoreRecord>> {
        Ok(self
            .store
            .load()?
            .into_iter()
            .sorted_by(rank_order)
            .take(CAPACITY)
            .collect())
    }

    pub fn records(&self) -> &[ScoreRecord] {
        &self.records
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Best wpm on record, 0 when there is none.
    pub fn high_score(&self) -> f64 {
        self.records.first().map_or(0.0, |r| r.wpm)
    }

    /// `(rank, wpm)` points, rank starting at 1, for plotting.
    pub fn wpm_series(&self) -> Vec<(f64, f64)> {
        self.records
            .iter()
            .enumerate()
            .map(|(i, r)| ((i + 1) as f64, r.wpm))
            .collect()
    }

    /// Add a finished session stamped with the current time.
    pub fn record(&mut self, result: &SessionResult) -> Result<Option<ScoreRecord>> {
        self.record_at(result, Utc::now())
    }

    /// Insert in rank order, keep the top [`CAPACITY`] and persist them.
    /// Returns the new record, or `None` when it ranked below the cut.
    /// Nothing changes in memory if persisting fails.
    pub fn record_at(
        &mut self,
        result: &SessionResult,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<ScoreRecord>> {
        let record = ScoreRecord::from_result(result, timestamp);
        let position = self
            .records
            .iter()
            .take_while(|existing| rank_order(existing, &record) != Ordering::Greater)
            .count();

        let mut updated = self.records.clone();
        updated.insert(position, record.clone());
        updated.truncate(CAPACITY);

        self.store.save(&updated)?;
        self.records = updated;

        let kept = position < CAPACITY;
        debug!(wpm = record.wpm, rank = position + 1, kept, "score saved");
        Ok(kept.then_some(record))
    }
}
