pub mod backfill;
pub mod pool;

use crate::config::{self, Config, PreviousPeriod};
use crate::logging::ndjson::{self, RunEvent};
use crate::ranking::{self, ContributorRanking};
use crate::report::{text, trend};
use crate::snapshot::{self, Counts, WeeklySnapshot};
use crate::source::provider::{EventSource, source_for};
use crate::store::archive::ArchiveStore;
use crate::store::history::{HistorySeries, HistoryStore};
use crate::window::{TimeWindow, WINDOW_DAYS};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub use backfill::{BackfillCommand, execute_backfill};

/// Flags shared by every command that touches the output tree.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub root: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub fixture: Option<PathBuf>,
    pub log: Option<PathBuf>,
    pub no_rankings: bool,
    pub no_chart: bool,
}

#[derive(Debug, Clone)]
pub struct RunCommand {
    pub options: RunOptions,
    pub date: Option<NaiveDate>,
}

/// Everything a run needs, resolved once from the command-line options.
pub struct Workspace {
    pub root: PathBuf,
    pub cfg: Config,
    pub source: Box<dyn EventSource>,
    pub archive: ArchiveStore,
    pub history: HistoryStore,
    pub log: Option<PathBuf>,
    pub run_id: String,
    pub rankings: bool,
}

impl Workspace {
    pub fn open(options: &RunOptions) -> Result<Self> {
        let root = match options.root.clone() {
            Some(root) => root,
            None => std::env::current_dir().context("resolve current directory")?,
        };
        let cfg = config::load_config(&root, options.config.as_deref())?;
        let source = source_for(&cfg.source, options.fixture.as_deref())?;
        Ok(Self::with_source(root, cfg, source, options))
    }

    pub fn with_source(
        root: PathBuf,
        cfg: Config,
        source: Box<dyn EventSource>,
        options: &RunOptions,
    ) -> Self {
        let archive = ArchiveStore::new(cfg.data_dir(&root));
        let history = HistoryStore::new(cfg.history_file(&root));
        let rankings = cfg.ranking.enabled && !options.no_rankings;
        Self {
            root,
            cfg,
            source,
            archive,
            history,
            log: options.log.clone(),
            run_id: Uuid::new_v4().to_string(),
            rankings,
        }
    }

    pub fn processor(&self) -> WeekProcessor<'_> {
        WeekProcessor {
            cfg: &self.cfg,
            source: self.source.as_ref(),
            archive: &self.archive,
            history: &self.history,
            posts_dir: self.cfg.posts_dir(&self.root),
            rankings: self.rankings,
            log: self.log.as_deref(),
            run_id: &self.run_id,
        }
    }

    pub fn emit(&self, event: &str, week: Option<String>, details: Value) {
        emit(self.log.as_deref(), &self.run_id, event, week, details)
    }

    pub fn write_chart(&self, series: &HistorySeries) -> Result<PathBuf> {
        let path = self.cfg.chart_file(&self.root);
        trend::write_chart(&path, series)?;
        log::info!("trend chart written to {}", path.display());
        Ok(path)
    }
}

fn emit(
    log: Option<&Path>,
    run_id: &str,
    event: &str,
    week: Option<String>,
    details: Value,
) {
    let Some(path) = log else {
        return;
    };
    if let Err(e) = ndjson::mirror_event(path, &RunEvent::new(run_id, event, week, details)) {
        log::warn!("failed to mirror `{event}` to {}: {e:#}", path.display());
    }
}

#[derive(Debug, Clone)]
pub struct WeekOutcome {
    pub window: TimeWindow,
    pub snapshot: WeeklySnapshot,
    pub previous: Counts,
    pub rankings: Option<Vec<ContributorRanking>>,
    pub archive_path: PathBuf,
    pub report_path: PathBuf,
    pub series: HistorySeries,
}

/// Runs the weekly pipeline for one run date. Stages run strictly in order and
/// the first failure aborts the week.
pub struct WeekProcessor<'a> {
    cfg: &'a Config,
    source: &'a dyn EventSource,
    archive: &'a ArchiveStore,
    history: &'a HistoryStore,
    posts_dir: PathBuf,
    rankings: bool,
    log: Option<&'a Path>,
    run_id: &'a str,
}

impl WeekProcessor<'_> {
    pub fn process(&self, run_date: NaiveDate, generated_at: DateTime<Utc>) -> Result<WeekOutcome> {
        let window = TimeWindow::for_run_date(run_date);
        let week = window.slug();
        log::info!(
            "processing week {week} ({} .. {})",
            window.from,
            window.to
        );
        self.emit(
            "week_started",
            &week,
            json!({"from": window.start_epoch(), "to": window.end_epoch()}),
        );

        let snapshot = snapshot::build_snapshot(self.cfg, self.source, &window)
            .with_context(|| format!("build snapshot for week {week}"))?;
        self.emit("snapshot_built", &week, json!({"counts": snapshot.counts}));

        let rankings = if self.rankings {
            let rankings = self
                .build_rankings(&window)
                .with_context(|| format!("rank contributors for week {week}"))?;
            self.emit(
                "rankings_built",
                &week,
                json!({"categories": rankings.len()}),
            );
            Some(rankings)
        } else {
            None
        };

        let previous = self
            .previous_counts(&window)
            .with_context(|| format!("load previous period for week {week}"))?;
        let report = text::render(&text::ReportInput {
            window: &window,
            current: &snapshot.counts,
            previous: &previous,
            rankings: rankings.as_deref(),
            generated_at,
        });

        let archive_path = self.archive.save(&snapshot)?;
        let series = self.history.append(&snapshot)?;
        self.emit(
            "week_archived",
            &week,
            json!({"archive": archive_path, "history": self.history.path()}),
        );

        let report_path = text::write_report(&self.posts_dir, &window, &report)?;
        log::info!("week {week} report written to {}", report_path.display());
        self.emit("report_written", &week, json!({"path": report_path}));

        Ok(WeekOutcome {
            window,
            snapshot,
            previous,
            rankings,
            archive_path,
            report_path,
            series,
        })
    }

    fn build_rankings(&self, window: &TimeWindow) -> Result<Vec<ContributorRanking>> {
        let categories = self.cfg.ranked_categories();
        pool::try_map_bounded(&categories, self.cfg.pipeline.workers, |category| {
            ranking::top_contributors(
                self.source,
                window,
                category,
                &self.cfg.ranking,
                self.cfg.source.rows_per_page,
            )
        })
    }

    fn previous_counts(&self, window: &TimeWindow) -> Result<Counts> {
        match self.cfg.pipeline.previous {
            PreviousPeriod::Requery => snapshot::count_categories(
                &self.cfg.categories,
                self.source,
                &window.previous(),
                self.cfg.pipeline.workers,
            ),
            PreviousPeriod::Archive => self
                .archive
                .load_week(window.week_ending() - Duration::days(WINDOW_DAYS)),
        }
    }

    fn emit(&self, event: &str, week: &str, details: Value) {
        emit(self.log, self.run_id, event, Some(week.to_string()), details)
    }
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub fn execute_run(cmd: RunCommand) -> Result<()> {
    let ws = Workspace::open(&cmd.options)?;
    let run_date = cmd.date.unwrap_or_else(today);
    ws.emit(
        "run_started",
        None,
        json!({"mode": "single", "run_date": run_date.to_string()}),
    );

    let outcome = ws.processor().process(run_date, Utc::now())?;
    if !cmd.options.no_chart {
        ws.write_chart(&outcome.series)?;
    }

    ws.emit(
        "run_completed",
        None,
        json!({"weeks": 1, "failed": 0}),
    );
    println!(
        "Week ending {} written to {}",
        outcome.window.week_ending(),
        outcome.report_path.display()
    );
    Ok(())
}

/// Re-renders the trend chart from the stored history without querying.
pub fn render_chart(options: &RunOptions) -> Result<()> {
    let ws = Workspace::open(options)?;
    let series = ws.history.load()?;
    let path = ws.write_chart(&series)?;
    println!("Trend chart written to {}", path.display());
    Ok(())
}

pub fn show_history(options: &RunOptions) -> Result<()> {
    let ws = Workspace::open(options)?;
    let series = ws.history.load()?;
    if series.is_empty() {
        println!("No history recorded in {}", ws.history.path().display());
        return Ok(());
    }
    println!("{}", serde_json::to_string_pretty(&series)?);
    Ok(())
}
