use chrono::{DateTime, Utc};
use runsync_client::error::FetchError;
use runsync_client::transport::RunTransport;
use runsync_core::projection::RunView;
use runsync_core::types::{DatasetOption, RunConfig, RunId, RunRecord};

/// Run history and dataset options as last seen on the server.
///
/// Runs keep the server's order. A failed refresh leaves the previous
/// contents in place.
#[derive(Debug)]
pub struct RunListCache<T> {
    transport: T,
    runs: Vec<RunRecord>,
    datasets: Vec<DatasetOption>,
    refreshed_at: Option<DateTime<Utc>>,
}

impl<T: RunTransport> RunListCache<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            runs: Vec::new(),
            datasets: Vec::new(),
            refreshed_at: None,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetches history and options concurrently. Both are adopted together;
    /// if either fails the cache keeps its previous contents.
    pub async fn refresh(&mut self) -> Result<(), FetchError> {
        let (runs, datasets) = tokio::join!(self.transport.list_runs(), self.transport.get_options());
        let (runs, datasets) = match (runs, datasets) {
            (Ok(runs), Ok(datasets)) => (runs, datasets),
            (Err(err), _) | (_, Err(err)) => {
                tracing::warn!(error = %err, "run list refresh failed");
                return Err(err);
            }
        };

        self.runs = runs;
        self.datasets = datasets;
        self.refreshed_at = Some(Utc::now());
        tracing::debug!(runs = self.runs.len(), datasets = self.datasets.len(), "run list refreshed");
        Ok(())
    }

    /// Clears history on the server, then locally. On failure the local
    /// list is untouched.
    pub async fn clear_history(&mut self) -> Result<(), FetchError> {
        self.transport.clear_history().await?;
        tracing::info!(cleared = self.runs.len(), "run history cleared");
        self.runs.clear();
        Ok(())
    }

    /// Creates a run, then refreshes so the new run shows up in history.
    /// A failed refresh is logged; the run id is still returned.
    pub async fn submit(&mut self, config: &RunConfig) -> Result<RunId, FetchError> {
        let run_id = self.transport.create_run(config).await?;
        if let Err(err) = self.refresh().await {
            tracing::warn!(run_id = %run_id, error = %err, "refresh after submit failed");
        }
        Ok(run_id)
    }

    pub fn runs(&self) -> &[RunRecord] {
        &self.runs
    }

    pub fn datasets(&self) -> &[DatasetOption] {
        &self.datasets
    }

    pub fn run(&self, run_id: &RunId) -> Option<&RunRecord> {
        self.runs.iter().find(|record| &record.run_id == run_id)
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    /// Projected views of the cached runs, in server order.
    pub fn views(&self, now: DateTime<Utc>) -> Vec<RunView> {
        self.runs
            .iter()
            .map(|record| RunView::project(record, now))
            .collect()
    }
}
