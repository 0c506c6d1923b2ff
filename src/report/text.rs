use crate::ranking::ContributorRanking;
use crate::snapshot::Counts;
use crate::window::TimeWindow;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

const NOT_AVAILABLE: &str = "NA";
const MAX_DISPLAYED_CONTRIBUTORS: usize = 3;
const MIN_LABEL_WIDTH: usize = 25;
const LABEL_HEADER: &str = "Activity";
const COUNT_HEADER: &str = "Amount";
const DELTA_HEADER: &str = "Change";
const CONTRIBUTORS_HEADER: &str = "Top contributors";

/// Week-over-week change, e.g. `+12.34%`; `NA` when there is nothing to compare.
pub fn format_delta(current: u64, previous: Option<u64>) -> String {
    match previous {
        None | Some(0) => NOT_AVAILABLE.to_string(),
        Some(previous) => {
            let pct = (current as f64 / previous as f64 - 1.0) * 100.0;
            format!("{pct:+06.2}%")
        }
    }
}

/// `name (count), ...` capped at three entries even when a tier holds more.
pub fn format_contributors(ranking: &ContributorRanking) -> String {
    let shown = ranking
        .entries()
        .take(MAX_DISPLAYED_CONTRIBUTORS)
        .map(|(name, count)| format!("{name} ({count})"))
        .collect::<Vec<_>>();
    if shown.is_empty() {
        "-".to_string()
    } else {
        shown.join(", ")
    }
}

pub struct ReportInput<'a> {
    pub window: &'a TimeWindow,
    pub current: &'a Counts,
    pub previous: &'a Counts,
    pub rankings: Option<&'a [ContributorRanking]>,
    pub generated_at: DateTime<Utc>,
}

pub fn render(input: &ReportInput<'_>) -> String {
    let mut out = String::new();
    out.push_str(".. link:\n");
    out.push_str(".. description:\n");
    out.push_str(&format!(
        ".. date: {}\n",
        input.generated_at.format("%Y/%m/%d %H:%M:%S")
    ));
    out.push_str(&format!(
        ".. title: Activities from {} to {}\n",
        input.window.human_from(),
        input.window.human_to()
    ));
    out.push_str(&format!(".. slug: {}\n\n", input.window.slug()));

    // BTreeMap keys iterate in lexicographic label order.
    let rows = input
        .current
        .iter()
        .map(|(label, count)| {
            vec![
                label.clone(),
                count.to_string(),
                format_delta(*count, input.previous.get(label).copied()),
            ]
        })
        .collect::<Vec<_>>();
    out.push_str(&render_table(
        &[LABEL_HEADER, COUNT_HEADER, DELTA_HEADER],
        &[Align::Left, Align::Right, Align::Right],
        &rows,
    ));

    if let Some(rankings) = input.rankings {
        let mut sorted = rankings.iter().collect::<Vec<_>>();
        sorted.sort_by(|a, b| a.category.cmp(&b.category));
        let rows = sorted
            .into_iter()
            .map(|r| vec![r.category.clone(), format_contributors(r)])
            .collect::<Vec<_>>();
        out.push('\n');
        out.push_str(&render_table(
            &[LABEL_HEADER, CONTRIBUTORS_HEADER],
            &[Align::Left, Align::Left],
            &rows,
        ));
    }
    out
}

#[derive(Clone, Copy)]
enum Align {
    Left,
    Right,
}

fn render_table(headers: &[&str], aligns: &[Align], rows: &[Vec<String>]) -> String {
    let mut widths = headers.iter().map(|h| h.len()).collect::<Vec<_>>();
    widths[0] = widths[0].max(MIN_LABEL_WIDTH);
    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(cell.chars().count());
        }
    }

    let border = widths
        .iter()
        .map(|w| "=".repeat(*w))
        .collect::<Vec<_>>()
        .join("  ");
    let line = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .zip(aligns)
            .map(|((cell, &width), align)| match align {
                Align::Left => format!("{cell:<width$}"),
                Align::Right => format!("{cell:>width$}"),
            })
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let header_cells = headers.iter().map(|h| h.to_string()).collect::<Vec<_>>();
    let mut out = String::new();
    out.push_str(&border);
    out.push('\n');
    out.push_str(&line(&header_cells));
    out.push('\n');
    out.push_str(&border);
    out.push('\n');
    for row in rows {
        out.push_str(&line(row));
        out.push('\n');
    }
    out.push_str(&border);
    out.push('\n');
    out
}

/// Writes the report as `<posts_dir>/<slug>.txt`.
pub fn write_report(posts_dir: &Path, window: &TimeWindow, text: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(posts_dir)
        .with_context(|| format!("create posts dir {}", posts_dir.display()))?;
    let path = posts_dir.join(format!("{}.txt", window.slug()));
    std::fs::write(&path, text).with_context(|| format!("write report {}", path.display()))?;
    Ok(path)
}
