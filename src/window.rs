use anyhow::{Result, bail};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

pub const WINDOW_DAYS: i64 = 7;

const SLUG_FORMAT: &str = "%Y_%m_%d";
const HUMAN_FORMAT: &str = "%a, %d %b %Y";
const KEY_FORMAT: &str = "%Y-%m-%d";

/// Seven-day lookback ending 23:59 on the week-ending date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
}

impl TimeWindow {
    /// Window reported by a run on `run_date`: the seven full days before it.
    pub fn for_run_date(run_date: NaiveDate) -> Self {
        Self::ending_on(run_date - Duration::days(1))
    }

    pub fn ending_on(week_ending: NaiveDate) -> Self {
        let to = week_ending.and_time(end_of_day());
        let from = (week_ending - Duration::days(WINDOW_DAYS - 1)).and_time(NaiveTime::MIN);
        Self { from, to }
    }

    pub fn previous(&self) -> Self {
        Self {
            from: self.from - Duration::days(WINDOW_DAYS),
            to: self.to - Duration::days(WINDOW_DAYS),
        }
    }

    pub fn week_ending(&self) -> NaiveDate {
        self.to.date()
    }

    pub fn start_epoch(&self) -> i64 {
        self.from.and_utc().timestamp()
    }

    pub fn end_epoch(&self) -> i64 {
        self.to.and_utc().timestamp()
    }

    /// File-name friendly identifier, e.g. `2013_06_16`.
    pub fn slug(&self) -> String {
        date_slug(self.week_ending())
    }

    pub fn human_from(&self) -> String {
        self.from.format(HUMAN_FORMAT).to_string()
    }

    pub fn human_to(&self) -> String {
        self.to.format(HUMAN_FORMAT).to_string()
    }
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 0).unwrap_or(NaiveTime::MIN)
}

pub fn date_slug(date: NaiveDate) -> String {
    date.format(SLUG_FORMAT).to_string()
}

/// Key used for dates inside the history file.
pub fn date_key(date: NaiveDate) -> String {
    date.format(KEY_FORMAT).to_string()
}

pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(trimmed, KEY_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(trimmed, SLUG_FORMAT))
        .map_err(|e| anyhow::anyhow!("invalid date `{trimmed}` (expected YYYY-MM-DD): {e}"))
}

/// Run dates stepped by seven days from `from` up to and including `until`.
pub fn backfill_run_dates(from: NaiveDate, until: NaiveDate) -> Result<Vec<NaiveDate>> {
    if from > until {
        bail!("back-fill start {from} is after end {until}");
    }
    let mut dates = Vec::new();
    let mut current = from;
    while current <= until {
        dates.push(current);
        current = current + Duration::days(WINDOW_DAYS);
    }
    Ok(dates)
}
