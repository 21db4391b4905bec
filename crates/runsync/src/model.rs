use chrono::{DateTime, Utc};
use runsync_client::error::{FetchError, FetchErrorKind};
use runsync_core::projection::RunView;
use runsync_core::reconcile::LogMerge;
use runsync_core::state::RunStatus;
use runsync_core::types::{RunId, RunRecord, RunResultRow};
use serde::Serialize;

/// Most recent cycle failure, kept until a later cycle succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollError {
    pub kind: FetchErrorKind,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl PollError {
    pub fn from_fetch(err: &FetchError, at: DateTime<Utc>) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The server does not know the run id.
    NotFound,
}

/// Immutable view of one run, published at the end of every poll cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSnapshot {
    pub run_id: RunId,
    /// `None` until the first successful cycle.
    pub record: Option<RunRecord>,
    pub log: String,
    pub last_merge: Option<LogMerge>,
    pub log_resets: u64,
    pub results: Vec<RunResultRow>,
    pub last_error: Option<PollError>,
    pub consecutive_failures: u32,
    pub cycles: u64,
    pub updated_at: Option<DateTime<Utc>>,
    pub stopped: Option<StopReason>,
}

impl RunSnapshot {
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            record: None,
            log: String::new(),
            last_merge: None,
            log_resets: 0,
            results: Vec::new(),
            last_error: None,
            consecutive_failures: 0,
            cycles: 0,
            updated_at: None,
            stopped: None,
        }
    }

    pub fn status(&self) -> Option<RunStatus> {
        self.record.as_ref().map(|record| record.status)
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_some_and(RunStatus::is_terminal)
    }

    pub fn view(&self, now: DateTime<Utc>) -> Option<RunView> {
        self.record
            .as_ref()
            .map(|record| RunView::project(record, now))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollEventKind {
    CycleCommitted {
        cycle: u64,
        status: RunStatus,
    },
    CycleFailed {
        cycle: u64,
        kind: FetchErrorKind,
        message: String,
    },
    StatusChanged {
        from: Option<RunStatus>,
        to: RunStatus,
    },
    /// Server reported a status that moves backwards in the lifecycle.
    StatusRegressed {
        from: RunStatus,
        to: RunStatus,
    },
    /// Fresh log was not an extension of the buffered one.
    LogReset {
        previous_len: usize,
        new_len: usize,
    },
    Stopped {
        reason: StopReason,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollEvent {
    pub run_id: RunId,
    pub at: DateTime<Utc>,
    pub kind: PollEventKind,
}

pub fn poll_event_name(kind: &PollEventKind) -> &'static str {
    match kind {
        PollEventKind::CycleCommitted { .. } => "cycle_committed",
        PollEventKind::CycleFailed { .. } => "cycle_failed",
        PollEventKind::StatusChanged { .. } => "status_changed",
        PollEventKind::StatusRegressed { .. } => "status_regressed",
        PollEventKind::LogReset { .. } => "log_reset",
        PollEventKind::Stopped { .. } => "stopped",
    }
}
