use runsync_client::error::FetchError;
use runsync_core::config::ConfigError;
use runsync_core::types::RunId;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid configuration ({0})")]
    InvalidConfig(String),
    #[error("invalid run configuration ({0})")]
    InvalidRun(String),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("run {0} is not known to the server")]
    RunNotFound(RunId),
    #[error("refusing to clear run history without --yes")]
    ConfirmationRequired,
}
