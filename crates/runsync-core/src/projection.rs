//! Presentation fields derived from a [`RunRecord`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::state::RunStatus;
use crate::types::{epoch_to_utc, RunId, RunRecord};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum Progress {
    Indeterminate,
    /// Always within `[0, 1]`.
    Fraction(f64),
}

impl Progress {
    pub fn fraction(&self) -> Option<f64> {
        match self {
            Progress::Indeterminate => None,
            Progress::Fraction(value) => Some(*value),
        }
    }

    pub fn percent(&self) -> Option<u8> {
        self.fraction().map(|value| (value * 100.0).round() as u8)
    }
}

pub fn progress(record: &RunRecord) -> Progress {
    match record.total_rows {
        Some(total) if total > 0 => {
            let raw = record.completed_rows as f64 / total as f64;
            Progress::Fraction(raw.clamp(0.0, 1.0))
        }
        _ => Progress::Indeterminate,
    }
}

pub fn progress_label(record: &RunRecord) -> String {
    match record.total_rows {
        Some(total) => format!("{}/{}", record.completed_rows, total),
        None => format!("{}/?", record.completed_rows),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeTone {
    Neutral,
    Active,
    Success,
    Warning,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusBadge {
    pub label: &'static str,
    pub tone: BadgeTone,
}

pub fn status_badge(status: RunStatus) -> StatusBadge {
    let (label, tone) = match status {
        RunStatus::Queued => ("Queued", BadgeTone::Neutral),
        RunStatus::Running => ("Running", BadgeTone::Active),
        RunStatus::Completed => ("Completed", BadgeTone::Success),
        RunStatus::CompletedWithWarnings => ("Completed (warnings)", BadgeTone::Warning),
        RunStatus::Failed => ("Failed", BadgeTone::Danger),
        RunStatus::Unknown => ("Unknown", BadgeTone::Neutral),
    };
    StatusBadge { label, tone }
}

/// A graph may be shown once the artifact exists, and speculatively while
/// the run is still producing it.
pub fn kg_available(record: &RunRecord) -> bool {
    record.kg_path.is_some() || record.status == RunStatus::Running
}

/// Wall time of the run, measured against `now` while it is still going.
pub fn elapsed_seconds(record: &RunRecord, now: DateTime<Utc>) -> Option<i64> {
    let started = epoch_to_utc(record.created_at)?;
    let end = match record.finished_at.and_then(epoch_to_utc) {
        Some(finished) => finished,
        None if record.status.is_terminal() => return None,
        None => now,
    };
    Some((end - started).num_seconds().max(0))
}

pub fn results_csv_link(record: &RunRecord) -> Option<String> {
    record
        .results_csv
        .as_ref()
        .map(|_| format!("/api/runs/{}/results.csv", record.run_id))
}

pub fn log_download_link(run_id: &RunId) -> String {
    format!("/api/runs/{run_id}/log/download")
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KgLink {
    pub run_id: RunId,
    pub path: String,
}

/// Memoized knowledge-graph links, one per run.
///
/// Once a link has been handed out for a run it is returned unchanged on
/// every later refresh so an embedded viewer is never remounted. The link
/// carries no `live` flag: the server serves the final graph once it exists
/// and the live preview before that.
#[derive(Debug, Clone, Default)]
pub struct KgLinkCache {
    links: HashMap<RunId, KgLink>,
}

impl KgLinkCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&mut self, record: &RunRecord) -> Option<&KgLink> {
        if !self.links.contains_key(&record.run_id) {
            if !kg_available(record) {
                return None;
            }
            let link = KgLink {
                run_id: record.run_id.clone(),
                path: format!("/api/runs/{}/kg", record.run_id),
            };
            self.links.insert(record.run_id.clone(), link);
        }
        self.links.get(&record.run_id)
    }

    pub fn get(&self, run_id: &RunId) -> Option<&KgLink> {
        self.links.get(run_id)
    }

    pub fn forget(&mut self, run_id: &RunId) {
        self.links.remove(run_id);
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

/// Everything a presentation layer needs for one run, computed in one go.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunView {
    pub run_id: RunId,
    pub dataset: String,
    pub status: RunStatus,
    pub badge: StatusBadge,
    pub progress: Progress,
    pub progress_label: String,
    pub kg_available: bool,
    pub elapsed_seconds: Option<i64>,
    pub results_csv: Option<String>,
    pub log_download: String,
    pub error: Option<String>,
}

impl RunView {
    pub fn project(record: &RunRecord, now: DateTime<Utc>) -> Self {
        Self {
            run_id: record.run_id.clone(),
            dataset: record.dataset_name().to_string(),
            status: record.status,
            badge: status_badge(record.status),
            progress: progress(record),
            progress_label: progress_label(record),
            kg_available: kg_available(record),
            elapsed_seconds: elapsed_seconds(record, now),
            results_csv: results_csv_link(record),
            log_download: log_download_link(&record.run_id),
            error: record.error.clone(),
        }
    }
}
