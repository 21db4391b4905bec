//! Plain-text rendering for the terminal.

use chrono::{DateTime, Utc};
use runsync_core::projection::{KgLink, RunView};
use runsync_core::reconcile::{reconcile_detailed, LogMerge};
use runsync_core::types::{DatasetOption, EstimateResult, RunRecord, RunResultRow};

pub const LOG_RESET_MARKER: &str = "--- log restarted ---";

pub fn format_elapsed(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let (hours, rest) = (seconds / 3600, seconds % 3600);
    let (minutes, secs) = (rest / 60, rest % 60);
    if hours > 0 {
        format!("{hours}h {minutes:02}m {secs:02}s")
    } else if minutes > 0 {
        format!("{minutes}m {secs:02}s")
    } else {
        format!("{secs}s")
    }
}

/// One line summarizing a run, e.g. `r1  [Running]  full  40/100 (40%)  12s`.
pub fn render_status_line(view: &RunView) -> String {
    let mut line = format!(
        "{}  [{}]  {}  {}",
        view.run_id, view.badge.label, view.dataset, view.progress_label
    );
    if let Some(percent) = view.progress.percent() {
        line.push_str(&format!(" ({percent}%)"));
    }
    if let Some(elapsed) = view.elapsed_seconds {
        line.push_str("  ");
        line.push_str(&format_elapsed(elapsed));
    }
    line
}

pub fn render_run_list(runs: &[RunRecord], now: DateTime<Utc>) -> String {
    if runs.is_empty() {
        return "no runs".to_string();
    }
    runs.iter()
        .map(|record| render_status_line(&RunView::project(record, now)))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_datasets(datasets: &[DatasetOption]) -> String {
    if datasets.is_empty() {
        return "no datasets".to_string();
    }
    datasets
        .iter()
        .map(|dataset| {
            let mut line = format!(
                "{}  data_file={}  sector_map={}",
                dataset.label, dataset.data_file, dataset.sector_map
            );
            if !dataset.description.is_empty() {
                line.push_str(&format!("\n    {}", dataset.description));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn optional_number(value: Option<f64>, precision: usize) -> String {
    value
        .map(|v| format!("{v:.precision$}"))
        .unwrap_or_else(|| "-".to_string())
}

pub fn render_results(rows: &[RunResultRow]) -> String {
    if rows.is_empty() {
        return "no results yet".to_string();
    }
    let mut lines = vec![format!(
        "{:<8} {:<10} {:<10} {:>8} {:>8}",
        "ticker", "quarter", "direction", "score", "return"
    )];
    for row in rows {
        let mut line = format!(
            "{:<8} {:<10} {:<10} {:>8} {:>8}",
            row.ticker,
            row.quarter,
            row.predicted_direction.as_deref().unwrap_or("-"),
            optional_number(row.direction_score, 3),
            optional_number(row.actual_return, 4),
        );
        if let Some(error) = &row.error {
            line.push_str(&format!("  error: {error}"));
        }
        lines.push(line.trim_end().to_string());
    }
    lines.join("\n")
}

pub fn render_estimate(estimate: &EstimateResult) -> String {
    let mut lines = Vec::new();
    if let Some(rows) = estimate.rows() {
        lines.push(format!("rows: {rows}"));
    }
    if let Some(avg) = estimate.avg_tokens_per_row() {
        lines.push(format!("avg tokens/row: {avg:.0}"));
    }
    if let Some(total) = estimate.total_tokens() {
        lines.push(format!("total tokens: {total}"));
    }
    if let Some(cost) = estimate.estimated_cost_usd() {
        lines.push(format!("estimated cost: ${cost:.2}"));
    }
    if let Some(seconds) = estimate.estimated_time_seconds() {
        lines.push(format!("estimated time: {}", format_elapsed(seconds.round() as i64)));
    }
    if lines.is_empty() {
        return estimate.raw().to_string();
    }
    lines.join("\n")
}

pub fn render_links(view: &RunView) -> Vec<String> {
    let mut links = vec![format!("log: {}", view.log_download)];
    if let Some(csv) = &view.results_csv {
        links.push(format!("results: {csv}"));
    }
    links
}

pub fn render_graph_link(link: &KgLink) -> String {
    format!("graph: {}", link.path)
}

/// Tracks log text already written to the terminal and hands out only what
/// is new.
#[derive(Debug, Default)]
pub struct LogPrinter {
    printed: String,
}

impl LogPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text to write for the latest full log, if any. A log that no longer
    /// extends what was printed is written again after a marker line.
    pub fn next_chunk(&mut self, log: &str) -> Option<String> {
        let merged = reconcile_detailed(&self.printed, log);
        let chunk = match merged.merge {
            LogMerge::Unchanged => None,
            LogMerge::Appended { appended_bytes } => {
                Some(merged.text[merged.text.len() - appended_bytes..].to_string())
            }
            LogMerge::Replaced { .. } => {
                let mut out = String::new();
                if !self.printed.ends_with('\n') {
                    out.push('\n');
                }
                out.push_str(LOG_RESET_MARKER);
                out.push('\n');
                out.push_str(&merged.text);
                Some(out)
            }
        };
        self.printed = merged.text;
        chunk
    }

    pub fn printed_len(&self) -> usize {
        self.printed.len()
    }
}
