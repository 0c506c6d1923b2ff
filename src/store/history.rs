use crate::snapshot::WeeklySnapshot;
use crate::store::write_atomic;
use crate::window::date_key;
use anyhow::{Context, Result, anyhow};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// `label -> (YYYY-MM-DD -> count)`.
pub type HistorySeries = BTreeMap<String, BTreeMap<String, u64>>;

/// Cumulative history file, rewritten wholesale on every append.
///
/// Appends are read-modify-write under a mutex so concurrent weeks in one
/// process never lose each other's entries.
#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<HistorySeries> {
        if !self.path.exists() {
            return Ok(HistorySeries::new());
        }
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("read history {}", self.path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parse history {}", self.path.display()))
    }

    pub fn append(&self, snapshot: &WeeklySnapshot) -> Result<HistorySeries> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| anyhow!("history lock poisoned"))?;
        let mut series = self.load()?;
        merge_snapshot(&mut series, snapshot);
        let body = serde_json::to_vec_pretty(&series)?;
        write_atomic(&self.path, &body)
            .with_context(|| format!("write history {}", self.path.display()))?;
        Ok(series)
    }
}

pub fn merge_snapshot(series: &mut HistorySeries, snapshot: &WeeklySnapshot) {
    let key = date_key(snapshot.week_ending);
    for (label, count) in &snapshot.counts {
        series
            .entry(label.clone())
            .or_default()
            .insert(key.clone(), *count);
    }
}
