use crate::store::history::HistorySeries;
use crate::store::write_atomic;
use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::path::Path;

const WIDTH: f64 = 960.0;
const HEIGHT: f64 = 480.0;
const MARGIN_LEFT: f64 = 60.0;
const MARGIN_RIGHT: f64 = 220.0;
const MARGIN_TOP: f64 = 40.0;
const MARGIN_BOTTOM: f64 = 90.0;
const PALETTE: [&str; 10] = [
    "#3c6eb4", "#db3279", "#79db32", "#e59728", "#8e44ad", "#2ab0c4", "#c0392b", "#7f8c8d",
    "#16a085", "#d35400",
];

#[derive(Debug, Clone, PartialEq)]
pub struct TrendLine {
    pub label: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrendChart {
    pub x_labels: Vec<String>,
    pub lines: Vec<TrendLine>,
}

/// `log10(v)`, with zero pinned to 0 so the chart stays finite.
pub fn log_scale(value: u64) -> f64 {
    if value == 0 {
        0.0
    } else {
        (value as f64).log10()
    }
}

pub fn prepare(series: &HistorySeries) -> TrendChart {
    // Every category is expected to carry the same dates; the first one
    // provides the axis.
    let x_labels = series
        .values()
        .next()
        .map(|dates| dates.keys().cloned().collect())
        .unwrap_or_default();
    let lines = series
        .iter()
        .map(|(label, dates)| TrendLine {
            label: label.clone(),
            values: dates.values().map(|v| log_scale(*v)).collect(),
        })
        .collect();
    TrendChart { x_labels, lines }
}

pub fn render_svg(chart: &TrendChart) -> String {
    let plot_w = WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_h = HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
    let y_max = chart
        .lines
        .iter()
        .flat_map(|l| l.values.iter().copied())
        .fold(1.0_f64, f64::max)
        .ceil();
    let points = chart
        .lines
        .iter()
        .map(|l| l.values.len())
        .chain(std::iter::once(chart.x_labels.len()))
        .max()
        .unwrap_or(0);
    let x_at = |idx: usize| {
        if points <= 1 {
            MARGIN_LEFT + plot_w / 2.0
        } else {
            MARGIN_LEFT + plot_w * idx as f64 / (points - 1) as f64
        }
    };
    let y_at = |v: f64| MARGIN_TOP + plot_h - plot_h * v / y_max;

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}" font-family="sans-serif" font-size="11">"#
    );
    let _ = writeln!(
        svg,
        r#"<rect x="0" y="0" width="{WIDTH}" height="{HEIGHT}" fill="white"/>"#
    );
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="24" font-size="15">Fedora activity per week (log10)</text>"#,
        MARGIN_LEFT
    );

    for tick in 0..=(y_max as u32) {
        let y = y_at(tick as f64);
        let _ = writeln!(
            svg,
            r##"<line x1="{MARGIN_LEFT}" y1="{y:.1}" x2="{:.1}" y2="{y:.1}" stroke="#dddddd"/>"##,
            MARGIN_LEFT + plot_w
        );
        let _ = writeln!(
            svg,
            r#"<text x="{:.1}" y="{:.1}" text-anchor="end">{tick}</text>"#,
            MARGIN_LEFT - 8.0,
            y + 4.0
        );
    }

    for (idx, label) in chart.x_labels.iter().enumerate() {
        let x = x_at(idx);
        let y = MARGIN_TOP + plot_h + 12.0;
        let _ = writeln!(
            svg,
            r#"<text x="{x:.1}" y="{y:.1}" text-anchor="end" transform="rotate(-45 {x:.1} {y:.1})">{}</text>"#,
            escape(label)
        );
    }

    for (idx, line) in chart.lines.iter().enumerate() {
        let color = PALETTE[idx % PALETTE.len()];
        let coords = line
            .values
            .iter()
            .enumerate()
            .map(|(i, v)| format!("{:.1},{:.1}", x_at(i), y_at(*v)))
            .collect::<Vec<_>>()
            .join(" ");
        if !coords.is_empty() {
            let _ = writeln!(
                svg,
                r#"<polyline fill="none" stroke="{color}" stroke-width="2" points="{coords}"/>"#
            );
        }
        let legend_y = MARGIN_TOP + 16.0 * idx as f64;
        let legend_x = WIDTH - MARGIN_RIGHT + 16.0;
        let _ = writeln!(
            svg,
            r#"<rect x="{legend_x:.1}" y="{:.1}" width="10" height="10" fill="{color}"/>"#,
            legend_y - 9.0
        );
        let _ = writeln!(
            svg,
            r#"<text x="{:.1}" y="{legend_y:.1}">{}</text>"#,
            legend_x + 16.0,
            escape(&line.label)
        );
    }

    svg.push_str("</svg>\n");
    svg
}

fn escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn write_chart(path: &Path, series: &HistorySeries) -> Result<()> {
    let svg = render_svg(&prepare(series));
    write_atomic(path, svg.as_bytes())
        .with_context(|| format!("write trend chart {}", path.display()))
}
