//! Scripted in-memory transport for poller and cache tests.

use async_trait::async_trait;
use runsync_client::error::FetchError;
use runsync_client::transport::RunTransport;
use runsync_core::types::{
    DatasetOption, EstimateRequest, EstimateResult, RunConfig, RunId, RunRecord, RunResultRow,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::Semaphore;

/// Queue of scripted responses. The last one repeats once the queue drains.
struct Script<T> {
    queue: VecDeque<T>,
    last: Option<T>,
}

impl<T: Clone> Script<T> {
    fn new(initial: Option<T>) -> Self {
        Self {
            queue: VecDeque::new(),
            last: initial,
        }
    }

    fn push(&mut self, value: T) {
        self.queue.push_back(value);
    }

    fn next(&mut self) -> Option<T> {
        if let Some(value) = self.queue.pop_front() {
            self.last = Some(value.clone());
            return Some(value);
        }
        self.last.clone()
    }
}

pub(crate) struct ScriptedTransport {
    runs: Mutex<Script<Result<RunRecord, FetchError>>>,
    logs: Mutex<Script<Result<String, FetchError>>>,
    results: Mutex<Script<Result<Vec<RunResultRow>, FetchError>>>,
    list: Mutex<Script<Result<Vec<RunRecord>, FetchError>>>,
    options: Mutex<Script<Result<Vec<DatasetOption>, FetchError>>>,
    clear: Mutex<Script<Result<(), FetchError>>>,
    created: Mutex<Vec<RunConfig>>,
    gate: Option<Semaphore>,
    run_calls: AtomicUsize,
    clear_calls: AtomicUsize,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self {
            runs: Mutex::new(Script::new(None)),
            logs: Mutex::new(Script::new(Some(Ok(String::new())))),
            results: Mutex::new(Script::new(Some(Ok(Vec::new())))),
            list: Mutex::new(Script::new(Some(Ok(Vec::new())))),
            options: Mutex::new(Script::new(Some(Ok(Vec::new())))),
            clear: Mutex::new(Script::new(Some(Ok(())))),
            created: Mutex::new(Vec::new()),
            gate: None,
            run_calls: AtomicUsize::new(0),
            clear_calls: AtomicUsize::new(0),
        }
    }

    /// Run lookups block until [`ScriptedTransport::release`] hands out permits.
    pub(crate) fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new()
        }
    }

    pub(crate) fn release(&self, permits: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(permits);
        }
    }

    pub(crate) fn push_run(&self, value: Result<RunRecord, FetchError>) {
        self.runs.lock().unwrap().push(value);
    }

    pub(crate) fn push_log(&self, value: Result<String, FetchError>) {
        self.logs.lock().unwrap().push(value);
    }

    pub(crate) fn push_results(&self, value: Result<Vec<RunResultRow>, FetchError>) {
        self.results.lock().unwrap().push(value);
    }

    pub(crate) fn push_list(&self, value: Result<Vec<RunRecord>, FetchError>) {
        self.list.lock().unwrap().push(value);
    }

    pub(crate) fn push_options(&self, value: Result<Vec<DatasetOption>, FetchError>) {
        self.options.lock().unwrap().push(value);
    }

    pub(crate) fn push_clear(&self, value: Result<(), FetchError>) {
        self.clear.lock().unwrap().push(value);
    }

    pub(crate) fn run_calls(&self) -> usize {
        self.run_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn clear_calls(&self) -> usize {
        self.clear_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn created(&self) -> Vec<RunConfig> {
        self.created.lock().unwrap().clone()
    }
}

fn unscripted(what: &str) -> FetchError {
    FetchError::transport(format!("no scripted response for {what}"))
}

#[async_trait]
impl RunTransport for ScriptedTransport {
    async fn get_options(&self) -> Result<Vec<DatasetOption>, FetchError> {
        let next = self.options.lock().unwrap().next();
        next.unwrap_or_else(|| Err(unscripted("options")))
    }

    async fn list_runs(&self) -> Result<Vec<RunRecord>, FetchError> {
        let next = self.list.lock().unwrap().next();
        next.unwrap_or_else(|| Err(unscripted("list")))
    }

    async fn get_run(&self, run_id: &RunId) -> Result<RunRecord, FetchError> {
        self.run_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        let next = self.runs.lock().unwrap().next();
        next.unwrap_or_else(|| Err(unscripted(run_id.as_str())))
    }

    async fn get_log(&self, run_id: &RunId) -> Result<String, FetchError> {
        let next = self.logs.lock().unwrap().next();
        next.unwrap_or_else(|| Err(unscripted(run_id.as_str())))
    }

    async fn get_results(&self, run_id: &RunId) -> Result<Vec<RunResultRow>, FetchError> {
        let next = self.results.lock().unwrap().next();
        next.unwrap_or_else(|| Err(unscripted(run_id.as_str())))
    }

    async fn create_run(&self, config: &RunConfig) -> Result<RunId, FetchError> {
        let mut created = self.created.lock().unwrap();
        created.push(config.clone());
        Ok(RunId::new(format!("run-{}", created.len())))
    }

    async fn estimate(&self, _request: &EstimateRequest) -> Result<EstimateResult, FetchError> {
        Ok(EstimateResult(serde_json::json!({ "rows": 0 })))
    }

    async fn clear_history(&self) -> Result<(), FetchError> {
        self.clear_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.clear.lock().unwrap().next();
        next.unwrap_or_else(|| Err(unscripted("clear")))
    }
}
