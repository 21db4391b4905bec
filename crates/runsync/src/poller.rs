//! Periodic refresh of a single run.
//!
//! Each poller is one tokio task that owns the run's log buffer and latest
//! snapshot. Consumers only ever see immutable clones through a `watch`
//! channel, plus a `broadcast` stream of [`PollEvent`]s.

use chrono::Utc;
use runsync_client::error::FetchError;
use runsync_client::transport::RunTransport;
use runsync_core::config::{PollConfig, DEFAULT_POLL_INTERVAL_MS};
use runsync_core::reconcile::{LogBuffer, LogMerge};
use runsync_core::state::is_transition_allowed;
use runsync_core::types::{RunId, RunRecord, RunResultRow};
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::model::{PollError, PollEvent, PollEventKind, RunSnapshot, StopReason};

const EVENT_CAPACITY: usize = 256;
/// Floor for the refresh interval; `tokio::time::interval` rejects zero.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    pub interval: Duration,
    pub stop_on_not_found: bool,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            stop_on_not_found: true,
        }
    }
}

impl From<&PollConfig> for PollerConfig {
    fn from(config: &PollConfig) -> Self {
        Self {
            interval: config.interval(),
            stop_on_not_found: config.stop_on_not_found,
        }
    }
}

/// Everything one cycle fetched, before it is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleData {
    pub record: RunRecord,
    pub log: String,
    pub results: Vec<RunResultRow>,
}

/// Issues the three reads concurrently and waits for all of them.
///
/// A not-found on the run itself wins over other failures since it decides
/// whether polling should continue.
pub async fn fetch_cycle<T>(transport: &T, run_id: &RunId) -> Result<CycleData, FetchError>
where
    T: RunTransport + ?Sized,
{
    let (record, log, results) = tokio::join!(
        transport.get_run(run_id),
        transport.get_log(run_id),
        transport.get_results(run_id)
    );
    match (record, log, results) {
        (Ok(record), Ok(log), Ok(results)) => Ok(CycleData {
            record,
            log,
            results,
        }),
        (Err(err), _, _) => Err(err),
        (_, Err(err), _) | (_, _, Err(err)) => Err(err),
    }
}

/// Owned per-run state, mutated only by the poller task.
#[derive(Debug)]
pub struct RunPollerState {
    log: LogBuffer,
    snapshot: RunSnapshot,
}

impl RunPollerState {
    pub fn new(run_id: RunId) -> Self {
        Self {
            log: LogBuffer::new(),
            snapshot: RunSnapshot::new(run_id),
        }
    }

    pub fn snapshot(&self) -> &RunSnapshot {
        &self.snapshot
    }

    /// Applies a fetched cycle and returns the events it produced.
    pub fn apply_success(&mut self, data: CycleData) -> Vec<PollEventKind> {
        let mut events = Vec::new();
        let previous = self.snapshot.status();
        let next = data.record.status;

        match previous {
            Some(from) if !is_transition_allowed(from, next) => {
                tracing::warn!(
                    run_id = %self.snapshot.run_id,
                    from = %from,
                    to = %next,
                    "server reported status regression"
                );
                events.push(PollEventKind::StatusRegressed { from, to: next });
            }
            Some(from) if from == next => {}
            _ => events.push(PollEventKind::StatusChanged {
                from: previous,
                to: next,
            }),
        }

        let merge = self.log.apply(&data.log);
        if let LogMerge::Replaced { previous_len } = merge {
            tracing::info!(
                run_id = %self.snapshot.run_id,
                previous_len,
                new_len = self.log.len(),
                "log snapshot is not an extension of the buffer, replacing"
            );
            events.push(PollEventKind::LogReset {
                previous_len,
                new_len: self.log.len(),
            });
        }

        let snapshot = &mut self.snapshot;
        snapshot.record = Some(data.record);
        snapshot.log = self.log.as_str().to_string();
        snapshot.last_merge = Some(merge);
        snapshot.log_resets = self.log.resets();
        snapshot.results = data.results;
        snapshot.last_error = None;
        snapshot.consecutive_failures = 0;
        snapshot.cycles += 1;
        snapshot.updated_at = Some(Utc::now());

        events.push(PollEventKind::CycleCommitted {
            cycle: snapshot.cycles,
            status: next,
        });
        events
    }

    /// Records a failed cycle. Previously fetched data stays in place.
    pub fn apply_failure(&mut self, err: &FetchError, stop_on_not_found: bool) -> Vec<PollEventKind> {
        let now = Utc::now();
        let snapshot = &mut self.snapshot;
        snapshot.last_error = Some(PollError::from_fetch(err, now));
        snapshot.consecutive_failures = snapshot.consecutive_failures.saturating_add(1);
        snapshot.cycles += 1;
        snapshot.updated_at = Some(now);

        let mut events = vec![PollEventKind::CycleFailed {
            cycle: snapshot.cycles,
            kind: err.kind(),
            message: err.to_string(),
        }];
        if stop_on_not_found && err.is_not_found() {
            snapshot.stopped = Some(StopReason::NotFound);
            events.push(PollEventKind::Stopped {
                reason: StopReason::NotFound,
            });
        }
        events
    }
}

struct RunPoller<T> {
    transport: T,
    config: PollerConfig,
    state: RunPollerState,
    snapshot_tx: watch::Sender<RunSnapshot>,
    events_tx: broadcast::Sender<PollEvent>,
    cancel: CancellationToken,
}

impl<T: RunTransport> RunPoller<T> {
    async fn run(mut self) {
        let run_id = self.state.snapshot().run_id.clone();
        tracing::debug!(run_id = %run_id, interval_ms = self.config.interval.as_millis() as u64, "poller started");

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let outcome = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                outcome = fetch_cycle(&self.transport, &run_id) => outcome,
            };

            if self.commit(outcome).is_break() {
                break;
            }
        }

        tracing::debug!(run_id = %run_id, cycles = self.state.snapshot().cycles, "poller stopped");
    }

    fn commit(&mut self, outcome: Result<CycleData, FetchError>) -> ControlFlow<()> {
        // Nothing reaches a detached consumer.
        if self.cancel.is_cancelled() {
            return ControlFlow::Break(());
        }

        let events = match outcome {
            Ok(data) => self.state.apply_success(data),
            Err(err) => {
                tracing::warn!(
                    run_id = %self.state.snapshot().run_id,
                    error = %err,
                    failures = self.state.snapshot().consecutive_failures + 1,
                    "poll cycle failed"
                );
                self.state.apply_failure(&err, self.config.stop_on_not_found)
            }
        };

        let snapshot = self.state.snapshot().clone();
        let stopped = snapshot.stopped.is_some();
        let at = snapshot.updated_at.unwrap_or_else(Utc::now);
        self.snapshot_tx.send_replace(snapshot);
        for kind in events {
            let _ = self.events_tx.send(PollEvent {
                run_id: self.state.snapshot().run_id.clone(),
                at,
                kind,
            });
        }

        if stopped {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }
}

/// Consumer side of a running poller. Dropping it cancels the poller.
#[derive(Debug)]
pub struct RunPollerHandle {
    run_id: RunId,
    snapshots: watch::Receiver<RunSnapshot>,
    events_tx: broadcast::Sender<PollEvent>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

/// Starts polling `run_id`. The first cycle runs immediately.
///
/// Event subscriptions taken before the caller next yields see every event.
pub fn spawn_run_poller<T>(transport: T, run_id: RunId, mut config: PollerConfig) -> RunPollerHandle
where
    T: RunTransport + 'static,
{
    if config.interval < MIN_INTERVAL {
        tracing::warn!(run_id = %run_id, interval_ms = config.interval.as_millis() as u64, "poll interval too small, clamping");
        config.interval = MIN_INTERVAL;
    }
    let (snapshot_tx, snapshots) = watch::channel(RunSnapshot::new(run_id.clone()));
    let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);
    let cancel = CancellationToken::new();

    let poller = RunPoller {
        transport,
        config,
        state: RunPollerState::new(run_id.clone()),
        snapshot_tx,
        events_tx: events_tx.clone(),
        cancel: cancel.clone(),
    };
    let task = tokio::spawn(poller.run());

    RunPollerHandle {
        run_id,
        snapshots,
        events_tx,
        cancel,
        task: Some(task),
    }
}

impl RunPollerHandle {
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> RunSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<RunSnapshot> {
        self.snapshots.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PollEvent> {
        self.events_tx.subscribe()
    }

    /// Stops scheduling cycles; an in-flight cycle is discarded.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Cancels and waits for the task, after which no update can be published.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                tracing::warn!(run_id = %self.run_id, error = %err, "poller task ended abnormally");
            }
        }
    }

    /// Waits until the poller stops on its own (e.g. unknown run id).
    pub async fn stopped(&mut self) {
        if let Some(task) = self.task.as_mut() {
            if let Err(err) = task.await {
                tracing::warn!(run_id = %self.run_id, error = %err, "poller task ended abnormally");
            }
            self.task = None;
        }
    }
}

impl Drop for RunPollerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
