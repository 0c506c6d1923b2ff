use crate::config::PreviousPeriod;
use crate::run::{RunOptions, Workspace, pool, today};
use crate::window::{TimeWindow, backfill_run_dates, date_slug};
use anyhow::{Result, bail};
use chrono::{NaiveDate, Utc};
use serde_json::json;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct BackfillCommand {
    pub options: RunOptions,
    pub from: NaiveDate,
    pub until: Option<NaiveDate>,
    pub jobs: usize,
}

#[derive(Debug, Clone)]
pub struct BackfillSummary {
    pub completed: Vec<NaiveDate>,
    pub failed: Vec<(NaiveDate, String)>,
    pub chart: Option<PathBuf>,
}

/// Processes every week from `from` to `until` on at most `jobs` threads.
///
/// Weeks are independent: each writes its own archive and report, and the
/// shared history file is appended through the store's single-writer lock.
/// In archive mode each week reads the archive of the week before it, so the
/// weeks run one at a time in date order.
pub fn run_backfill(
    ws: &Workspace,
    from: NaiveDate,
    until: NaiveDate,
    jobs: usize,
    render_chart: bool,
) -> Result<BackfillSummary> {
    let run_dates = backfill_run_dates(from, until)?;
    let jobs = match ws.cfg.pipeline.previous {
        PreviousPeriod::Archive if jobs > 1 => {
            log::warn!("previous period comes from the archive; running {jobs} job(s) as 1");
            1
        }
        _ => jobs,
    };
    log::info!(
        "back-filling {} week(s) from {from} to {until} with {} job(s)",
        run_dates.len(),
        jobs.max(1)
    );
    ws.emit(
        "run_started",
        None,
        json!({"mode": "backfill", "from": from.to_string(), "until": until.to_string(), "weeks": run_dates.len()}),
    );

    let generated_at = Utc::now();
    let processor = ws.processor();
    let results = pool::map_bounded(&run_dates, jobs, |run_date| {
        processor.process(*run_date, generated_at)
    });

    let mut summary = BackfillSummary {
        completed: Vec::new(),
        failed: Vec::new(),
        chart: None,
    };
    for (run_date, result) in run_dates.iter().zip(results) {
        let week_ending = TimeWindow::for_run_date(*run_date).week_ending();
        match result {
            Ok(outcome) => summary.completed.push(outcome.window.week_ending()),
            Err(e) => {
                log::error!("week {} failed: {e:#}", date_slug(week_ending));
                ws.emit(
                    "week_failed",
                    Some(date_slug(week_ending)),
                    json!({"error": format!("{e:#}")}),
                );
                summary.failed.push((week_ending, format!("{e:#}")));
            }
        }
    }

    if render_chart && !summary.completed.is_empty() {
        let series = ws.history.load()?;
        summary.chart = Some(ws.write_chart(&series)?);
    }

    ws.emit(
        "run_completed",
        None,
        json!({"weeks": run_dates.len(), "failed": summary.failed.len()}),
    );
    Ok(summary)
}

pub fn execute_backfill(cmd: BackfillCommand) -> Result<()> {
    let ws = Workspace::open(&cmd.options)?;
    let until = cmd.until.unwrap_or_else(today);
    let summary = run_backfill(&ws, cmd.from, until, cmd.jobs, !cmd.options.no_chart)?;

    for week in &summary.completed {
        println!("Week ending {week} processed");
    }
    for (week, err) in &summary.failed {
        eprintln!("Week ending {week} failed: {err}");
    }
    if !summary.failed.is_empty() {
        bail!(
            "{} of {} week(s) failed",
            summary.failed.len(),
            summary.failed.len() + summary.completed.len()
        );
    }
    Ok(())
}
