//! Top contributors per category.
//!
//! Actors are grouped into tiers of identical event counts and the top
//! `limit` *distinct* counts are kept, so a tier may hold any number of actors.

use crate::config::{Category, RankingConfig};
use crate::counter;
use crate::source::RawEvent;
use crate::source::provider::EventSource;
use crate::window::TimeWindow;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tier {
    pub count: u64,
    pub actors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContributorRanking {
    pub category: String,
    pub tiers: Vec<Tier>,
}

impl ContributorRanking {
    /// `(actor, count)` in display order: tiers descending, names ascending.
    pub fn entries(&self) -> impl Iterator<Item = (&str, u64)> {
        self.tiers
            .iter()
            .flat_map(|t| t.actors.iter().map(move |a| (a.as_str(), t.count)))
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }
}

pub fn rank_events(
    category: &str,
    events: &[RawEvent],
    blocklist: &BTreeSet<String>,
    limit: usize,
) -> ContributorRanking {
    let mut tally: HashMap<&str, u64> = HashMap::new();
    for event in events {
        let actors = event
            .meta
            .usernames
            .iter()
            .map(String::as_str)
            .filter(|name| !blocklist.contains(*name))
            .collect::<BTreeSet<_>>();
        for actor in actors {
            *tally.entry(actor).or_insert(0) += 1;
        }
    }

    let mut by_count: BTreeMap<u64, BTreeSet<&str>> = BTreeMap::new();
    for (actor, count) in tally {
        by_count.entry(count).or_default().insert(actor);
    }

    let tiers = by_count
        .into_iter()
        .rev()
        .take(limit)
        .map(|(count, actors)| Tier {
            count,
            actors: actors.into_iter().map(ToString::to_string).collect(),
        })
        .collect();

    ContributorRanking {
        category: category.to_string(),
        tiers,
    }
}

/// Fetches every event of `category` in `window` and ranks its actors.
pub fn top_contributors(
    source: &dyn EventSource,
    window: &TimeWindow,
    category: &Category,
    ranking: &RankingConfig,
    rows_per_page: u32,
) -> Result<ContributorRanking> {
    let events = counter::fetch_events(source, window, category, rows_per_page)?;
    Ok(rank_events(
        &category.label,
        &events,
        &ranking.blocklist,
        ranking.limit,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(users: &[&[&str]]) -> Vec<RawEvent> {
        users.iter().map(|u| RawEvent::by(u)).collect()
    }

    #[test]
    fn groups_actors_into_count_tiers() {
        let evs = events(&[&["a"], &["a"], &["b"], &["c"], &["c"]]);
        let ranking = rank_events("Builds", &evs, &BTreeSet::new(), 3);
        assert_eq!(
            ranking.tiers,
            vec![
                Tier {
                    count: 2,
                    actors: vec!["a".to_string(), "c".to_string()],
                },
                Tier {
                    count: 1,
                    actors: vec!["b".to_string()],
                },
            ]
        );
        assert_eq!(
            ranking.entries().collect::<Vec<_>>(),
            vec![("a", 2), ("c", 2), ("b", 1)]
        );
    }

    #[test]
    fn cutoff_is_by_distinct_count_not_position() {
        let evs = events(&[
            &["d"],
            &["d"],
            &["d"],
            &["a"],
            &["b"],
            &["c"],
            &["e"],
            &["e"],
            &["f"],
            &["f"],
            &["f"],
            &["f"],
        ]);
        let ranking = rank_events("Builds", &evs, &BTreeSet::new(), 2);
        assert_eq!(ranking.tiers.len(), 2);
        assert_eq!(ranking.tiers[0].count, 4);
        assert_eq!(ranking.tiers[1].count, 3);

        let wide = rank_events("Builds", &evs, &BTreeSet::new(), 4);
        assert_eq!(wide.tiers[3].count, 1);
        assert_eq!(wide.tiers[3].actors, vec!["a", "b", "c"]);
    }

    #[test]
    fn actor_counts_once_per_event() {
        let evs = events(&[&["a", "a", "b"], &["a"]]);
        let ranking = rank_events("Wiki", &evs, &BTreeSet::new(), 3);
        assert_eq!(
            ranking.entries().collect::<Vec<_>>(),
            vec![("a", 2), ("b", 1)]
        );
    }

    #[test]
    fn blocked_actors_never_appear() {
        let evs = events(&[&["zodbot", "a"], &["zodbot"], &["zodbot"], &["b"]]);
        let blocklist = ["zodbot".to_string()].into_iter().collect();
        let ranking = rank_events("Meetings", &evs, &blocklist, 3);
        assert!(ranking.entries().all(|(name, _)| name != "zodbot"));
        assert_eq!(ranking.tiers.len(), 1);
        assert_eq!(ranking.tiers[0].actors, vec!["a", "b"]);
    }

    #[test]
    fn ranking_is_deterministic() {
        let evs = events(&[&["x", "y"], &["z"], &["y"], &["x"], &["w"]]);
        let first = rank_events("Builds", &evs, &BTreeSet::new(), 3);
        for _ in 0..10 {
            assert_eq!(rank_events("Builds", &evs, &BTreeSet::new(), 3), first);
        }
    }

    #[test]
    fn no_events_yields_empty_ranking() {
        let ranking = rank_events("Builds", &[], &BTreeSet::new(), 3);
        assert!(ranking.is_empty());
    }
}
