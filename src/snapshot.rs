use crate::config::{Category, Config};
use crate::counter;
use crate::run::pool;
use crate::source::provider::EventSource;
use crate::window::TimeWindow;
use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type Counts = BTreeMap<String, u64>;

/// Per-category event counts for one week. Built once, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WeeklySnapshot {
    pub week_ending: NaiveDate,
    pub counts: Counts,
}

impl WeeklySnapshot {
    pub fn get(&self, label: &str) -> Option<u64> {
        self.counts.get(label).copied()
    }
}

/// Counts every configured category over `window`; any single failure fails
/// the whole snapshot.
pub fn build_snapshot(
    cfg: &Config,
    source: &dyn EventSource,
    window: &TimeWindow,
) -> Result<WeeklySnapshot> {
    let counts = count_categories(&cfg.categories, source, window, cfg.pipeline.workers)?;
    Ok(WeeklySnapshot {
        week_ending: window.week_ending(),
        counts,
    })
}

pub fn count_categories(
    categories: &[Category],
    source: &dyn EventSource,
    window: &TimeWindow,
    workers: usize,
) -> Result<Counts> {
    let results = pool::try_map_bounded(categories, workers, |category| {
        counter::count(source, window, category).map(|n| (category.label.clone(), n))
    })?;
    Ok(results.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::EventPage;
    use crate::source::provider::RangeQuery;
    use anyhow::bail;

    struct TopicLengthSource;

    impl EventSource for TopicLengthSource {
        fn total(&self, query: &RangeQuery) -> Result<u64> {
            if query.topic == "broken" {
                bail!("HTTP 502")
            }
            Ok(query.topic.len() as u64)
        }

        fn page(&self, _query: &RangeQuery, _page: u32, _rows: u32) -> Result<EventPage> {
            Ok(EventPage::default())
        }
    }

    fn cfg(topics: &[(&str, &str)]) -> Config {
        let mut cfg = Config::default();
        cfg.categories = topics
            .iter()
            .map(|(label, topic)| Category {
                label: label.to_string(),
                topic: topic.to_string(),
            })
            .collect();
        cfg
    }

    fn window() -> TimeWindow {
        TimeWindow::for_run_date(NaiveDate::from_ymd_opt(2013, 6, 17).unwrap())
    }

    #[test]
    fn snapshot_covers_every_category() {
        let cfg = cfg(&[("Builds", "abcd"), ("Wiki", "ab"), ("Meetings", "a")]);
        let snap = build_snapshot(&cfg, &TopicLengthSource, &window()).unwrap();
        assert_eq!(snap.week_ending, NaiveDate::from_ymd_opt(2013, 6, 16).unwrap());
        assert_eq!(snap.counts.len(), 3);
        assert_eq!(snap.get("Builds"), Some(4));
        assert_eq!(snap.get("Wiki"), Some(2));
        assert_eq!(snap.get("Meetings"), Some(1));
    }

    #[test]
    fn one_failed_category_fails_the_snapshot() {
        let cfg = cfg(&[("Builds", "abcd"), ("Broken", "broken")]);
        let err = build_snapshot(&cfg, &TopicLengthSource, &window()).unwrap_err();
        assert!(format!("{err:#}").contains("`Broken`"));
    }
}
