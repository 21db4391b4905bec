use async_trait::async_trait;
use runsync_core::types::{
    DatasetOption, EstimateRequest, EstimateResult, RunConfig, RunId, RunRecord, RunResultRow,
};
use std::sync::Arc;

use crate::error::FetchError;

/// Read and write operations against the run API.
///
/// Reads return full current snapshots, never deltas.
#[async_trait]
pub trait RunTransport: Send + Sync {
    async fn get_options(&self) -> Result<Vec<DatasetOption>, FetchError>;

    async fn list_runs(&self) -> Result<Vec<RunRecord>, FetchError>;

    /// Fails with [`FetchError::NotFound`] for ids the server does not know.
    async fn get_run(&self, run_id: &RunId) -> Result<RunRecord, FetchError>;

    /// Full current log text of the run.
    async fn get_log(&self, run_id: &RunId) -> Result<String, FetchError>;

    async fn get_results(&self, run_id: &RunId) -> Result<Vec<RunResultRow>, FetchError>;

    /// Fails with [`FetchError::Validation`] when required fields are missing.
    async fn create_run(&self, config: &RunConfig) -> Result<RunId, FetchError>;

    async fn estimate(&self, request: &EstimateRequest) -> Result<EstimateResult, FetchError>;

    async fn clear_history(&self) -> Result<(), FetchError>;
}

#[async_trait]
impl<T: RunTransport + ?Sized> RunTransport for Arc<T> {
    async fn get_options(&self) -> Result<Vec<DatasetOption>, FetchError> {
        (**self).get_options().await
    }

    async fn list_runs(&self) -> Result<Vec<RunRecord>, FetchError> {
        (**self).list_runs().await
    }

    async fn get_run(&self, run_id: &RunId) -> Result<RunRecord, FetchError> {
        (**self).get_run(run_id).await
    }

    async fn get_log(&self, run_id: &RunId) -> Result<String, FetchError> {
        (**self).get_log(run_id).await
    }

    async fn get_results(&self, run_id: &RunId) -> Result<Vec<RunResultRow>, FetchError> {
        (**self).get_results(run_id).await
    }

    async fn create_run(&self, config: &RunConfig) -> Result<RunId, FetchError> {
        (**self).create_run(config).await
    }

    async fn estimate(&self, request: &EstimateRequest) -> Result<EstimateResult, FetchError> {
        (**self).estimate(request).await
    }

    async fn clear_history(&self) -> Result<(), FetchError> {
        (**self).clear_history().await
    }
}
