use crate::snapshot::{Counts, WeeklySnapshot};
use crate::store::write_atomic;
use crate::window::date_slug;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::path::PathBuf;

/// One JSON file of `{label: count}` per week-ending date.
#[derive(Debug, Clone)]
pub struct ArchiveStore {
    dir: PathBuf,
}

impl ArchiveStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, week_ending: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}.json", date_slug(week_ending)))
    }

    pub fn save(&self, snapshot: &WeeklySnapshot) -> Result<PathBuf> {
        let path = self.path_for(snapshot.week_ending);
        let body = serde_json::to_vec_pretty(&snapshot.counts)?;
        write_atomic(&path, &body)
            .with_context(|| format!("archive week {}", snapshot.week_ending))?;
        Ok(path)
    }

    /// Archived counts for `week_ending`, or an empty map when none exist.
    pub fn load_week(&self, week_ending: NaiveDate) -> Result<Counts> {
        let path = self.path_for(week_ending);
        if !path.exists() {
            return Ok(Counts::new());
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("read archive {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parse archive {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn snapshot() -> WeeklySnapshot {
        WeeklySnapshot {
            week_ending: NaiveDate::from_ymd_opt(2013, 6, 16).unwrap(),
            counts: [("Builds".to_string(), 120), ("Wiki".to_string(), 40)]
                .into_iter()
                .collect(),
        }
    }

    #[test]
    fn saves_plain_counts_object_named_by_date() {
        let tmp = tempdir().unwrap();
        let store = ArchiveStore::new(tmp.path().join("data"));
        let path = store.save(&snapshot()).unwrap();
        assert!(path.ends_with("2013_06_16.json"));

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw, serde_json::json!({"Builds": 120, "Wiki": 40}));
    }

    #[test]
    fn load_week_reads_back_or_returns_empty() {
        let tmp = tempdir().unwrap();
        let store = ArchiveStore::new(tmp.path().join("data"));
        let snap = snapshot();
        store.save(&snap).unwrap();
        assert_eq!(store.load_week(snap.week_ending).unwrap(), snap.counts);

        let missing = NaiveDate::from_ymd_opt(2013, 6, 9).unwrap();
        assert!(store.load_week(missing).unwrap().is_empty());
    }
}
