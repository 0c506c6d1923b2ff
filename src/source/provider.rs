use crate::config::SourceConfig;
use crate::source::EventPage;
use crate::window::TimeWindow;
use anyhow::Result;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeQuery {
    pub start: i64,
    pub end: i64,
    pub topic: String,
}

impl RangeQuery {
    pub fn new(window: &TimeWindow, topic: &str) -> Self {
        Self {
            start: window.start_epoch(),
            end: window.end_epoch(),
            topic: topic.to_string(),
        }
    }
}

/// Event-history backend. Implementations are shared across worker threads.
pub trait EventSource: Send + Sync {
    fn total(&self, query: &RangeQuery) -> Result<u64>;
    fn page(&self, query: &RangeQuery, page: u32, rows_per_page: u32) -> Result<EventPage>;
}

pub fn source_for(cfg: &SourceConfig, fixture: Option<&Path>) -> Result<Box<dyn EventSource>> {
    match fixture {
        Some(path) => Ok(Box::new(crate::source::fixture::FixtureSource::load(path)?)),
        None => Ok(Box::new(
            crate::source::datagrepper::DatagrepperSource::new(cfg)?,
        )),
    }
}
