use crate::config::Category;
use crate::source::RawEvent;
use crate::source::provider::{EventSource, RangeQuery};
use crate::window::TimeWindow;
use anyhow::{Context, Result};

/// Number of events for `category` inside `window`.
pub fn count(source: &dyn EventSource, window: &TimeWindow, category: &Category) -> Result<u64> {
    let query = RangeQuery::new(window, &category.topic);
    source
        .total(&query)
        .with_context(|| format!("count events for `{}`", category.label))
}

/// Every raw event for `category` inside `window`, walking pages from 1 until
/// the page count reported by the source is exhausted.
pub fn fetch_events(
    source: &dyn EventSource,
    window: &TimeWindow,
    category: &Category,
    rows_per_page: u32,
) -> Result<Vec<RawEvent>> {
    let query = RangeQuery::new(window, &category.topic);
    let mut events = Vec::new();
    let mut page = 1;
    loop {
        let batch = source
            .page(&query, page, rows_per_page)
            .with_context(|| format!("fetch page {page} for `{}`", category.label))?;
        events.extend(batch.events);
        if page >= batch.pages {
            break;
        }
        page += 1;
    }
    log::debug!(
        "fetched {} events for `{}` over {page} page(s)",
        events.len(),
        category.label
    );
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::EventPage;
    use anyhow::bail;
    use chrono::NaiveDate;
    use std::sync::Mutex;

    struct PagedSource {
        pages: Vec<Vec<RawEvent>>,
        requested: Mutex<Vec<u32>>,
    }

    impl EventSource for PagedSource {
        fn total(&self, _query: &RangeQuery) -> Result<u64> {
            Ok(self.pages.iter().map(|p| p.len() as u64).sum())
        }

        fn page(&self, _query: &RangeQuery, page: u32, _rows: u32) -> Result<EventPage> {
            self.requested.lock().unwrap().push(page);
            Ok(EventPage {
                pages: self.pages.len() as u32,
                events: self.pages[page as usize - 1].clone(),
            })
        }
    }

    struct BrokenSource;

    impl EventSource for BrokenSource {
        fn total(&self, _query: &RangeQuery) -> Result<u64> {
            bail!("connection reset")
        }

        fn page(&self, _query: &RangeQuery, _page: u32, _rows: u32) -> Result<EventPage> {
            bail!("connection reset")
        }
    }

    fn window() -> TimeWindow {
        TimeWindow::for_run_date(NaiveDate::from_ymd_opt(2013, 6, 17).unwrap())
    }

    fn builds() -> Category {
        Category {
            label: "Builds".to_string(),
            topic: "org.fedoraproject.prod.buildsys.build.state.change".to_string(),
        }
    }

    #[test]
    fn walks_every_reported_page() {
        let source = PagedSource {
            pages: vec![
                vec![RawEvent::by(&["a"]), RawEvent::by(&["b"])],
                vec![RawEvent::by(&["c"])],
                vec![RawEvent::by(&["d"])],
            ],
            requested: Mutex::new(Vec::new()),
        };
        let events = fetch_events(&source, &window(), &builds(), 2).unwrap();
        assert_eq!(events.len(), 4);
        assert_eq!(*source.requested.lock().unwrap(), vec![1, 2, 3]);
        assert_eq!(count(&source, &window(), &builds()).unwrap(), 4);
    }

    #[test]
    fn empty_result_reads_a_single_page() {
        let source = PagedSource {
            pages: vec![vec![]],
            requested: Mutex::new(Vec::new()),
        };
        assert!(fetch_events(&source, &window(), &builds(), 10).unwrap().is_empty());
        assert_eq!(*source.requested.lock().unwrap(), vec![1]);
    }

    #[test]
    fn failures_name_the_category() {
        let err = count(&BrokenSource, &window(), &builds()).unwrap_err();
        assert!(format!("{err:#}").contains("count events for `Builds`"));
        assert!(format!("{err:#}").contains("connection reset"));
        assert!(fetch_events(&BrokenSource, &window(), &builds(), 10).is_err());
    }
}
