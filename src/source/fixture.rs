use crate::source::provider::{EventSource, RangeQuery};
use crate::source::{EventMeta, EventPage, RawEvent};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FixtureEvent {
    pub timestamp: i64,
    #[serde(default)]
    pub usernames: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixtureFile {
    #[serde(default)]
    pub topics: BTreeMap<String, Vec<FixtureEvent>>,
}

/// Offline event source answering range queries from a recorded JSON file.
#[derive(Debug, Clone, Default)]
pub struct FixtureSource {
    topics: BTreeMap<String, Vec<FixtureEvent>>,
}

impl FixtureSource {
    pub fn new(file: FixtureFile) -> Self {
        let mut topics = file.topics;
        for events in topics.values_mut() {
            events.sort_by_key(|e| e.timestamp);
        }
        Self { topics }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read fixture {}", path.display()))?;
        let parsed: FixtureFile = serde_json::from_str(&raw)
            .with_context(|| format!("parse fixture {}", path.display()))?;
        Ok(Self::new(parsed))
    }

    fn matching(&self, query: &RangeQuery) -> Vec<&FixtureEvent> {
        self.topics
            .get(&query.topic)
            .map(|events| {
                events
                    .iter()
                    .filter(|e| e.timestamp >= query.start && e.timestamp <= query.end)
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl EventSource for FixtureSource {
    fn total(&self, query: &RangeQuery) -> Result<u64> {
        Ok(self.matching(query).len() as u64)
    }

    fn page(&self, query: &RangeQuery, page: u32, rows_per_page: u32) -> Result<EventPage> {
        if page == 0 || rows_per_page == 0 {
            bail!("fixture pages are 1-based and need a non-zero page size");
        }
        let matching = self.matching(query);
        let rows = rows_per_page as usize;
        let pages = matching.len().div_ceil(rows).max(1) as u32;
        let events = matching
            .into_iter()
            .skip((page as usize - 1) * rows)
            .take(rows)
            .map(|e| RawEvent {
                meta: EventMeta {
                    usernames: e.usernames.clone(),
                },
            })
            .collect();
        Ok(EventPage { pages, events })
    }
}
