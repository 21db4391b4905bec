use chrono::{DateTime, Utc};
use runsync_core::projection::{KgLinkCache, RunView};
use runsync_core::state::RunStatus;

use crate::model::{RunSnapshot, StopReason};
use crate::render::{render_graph_link, render_links, render_status_line, LogPrinter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    Finished(RunStatus),
    NotFound,
}

/// Terminal output produced by one snapshot.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WatchStep {
    pub log: Option<String>,
    pub status_line: Option<String>,
    pub notices: Vec<String>,
    pub done: Option<WatchOutcome>,
}

/// Turns the stream of snapshots for one run into terminal output.
///
/// A terminal status is followed for one more cycle so the final log tail
/// is printed before the watch ends.
#[derive(Debug, Default)]
pub struct WatchSession {
    printer: LogPrinter,
    kg_links: KgLinkCache,
    last_status: Option<RunStatus>,
    last_error_cycle: Option<u64>,
    terminal_since: Option<u64>,
}

impl WatchSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, snapshot: &RunSnapshot, now: DateTime<Utc>) -> WatchStep {
        let mut step = WatchStep::default();
        if snapshot.cycles == 0 {
            return step;
        }

        if let Some(error) = &snapshot.last_error {
            if self.last_error_cycle != Some(snapshot.cycles) {
                self.last_error_cycle = Some(snapshot.cycles);
                step.notices.push(format!(
                    "refresh failed ({} in a row): {}",
                    snapshot.consecutive_failures, error.message
                ));
            }
        }
        if snapshot.stopped == Some(StopReason::NotFound) {
            step.done = Some(WatchOutcome::NotFound);
            return step;
        }

        let Some(record) = snapshot.record.as_ref() else {
            return step;
        };

        step.log = self.printer.next_chunk(&snapshot.log);

        if self.last_status != Some(record.status) {
            let view = RunView::project(record, now);
            step.status_line = Some(render_status_line(&view));
            if self.last_status.is_none() {
                step.notices.extend(render_links(&view));
            }
            self.last_status = Some(record.status);
        }

        if self.kg_links.get(&record.run_id).is_none() {
            if let Some(link) = self.kg_links.resolve(record) {
                step.notices.push(render_graph_link(link));
            }
        }

        // Only a successful cycle after the terminal one carries the final log tail.
        if snapshot.last_error.is_none() {
            if record.status.is_terminal() {
                match self.terminal_since {
                    None => self.terminal_since = Some(snapshot.cycles),
                    Some(cycle) if snapshot.cycles > cycle => {
                        step.done = Some(WatchOutcome::Finished(record.status));
                    }
                    Some(_) => {}
                }
            } else {
                self.terminal_since = None;
            }
        }
        step
    }
}
