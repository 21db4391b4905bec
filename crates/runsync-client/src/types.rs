use runsync_core::types::{DatasetOption, RunId, RunRecord};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionsResponse {
    #[serde(default)]
    pub datasets: Vec<DatasetOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunListResponse {
    #[serde(default)]
    pub runs: Vec<RunRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunDetailResponse {
    pub run: RunRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogResponse {
    #[serde(default)]
    pub log: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRunResponse {
    pub run_id: RunId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

/// Every route of the run API this client talks to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Options,
    ListRuns,
    Run(RunId),
    RunLog(RunId),
    RunResults(RunId),
    CreateRun,
    Estimate,
    ClearHistory,
}

impl Endpoint {
    pub fn method(&self) -> HttpMethod {
        match self {
            Endpoint::Options
            | Endpoint::ListRuns
            | Endpoint::Run(_)
            | Endpoint::RunLog(_)
            | Endpoint::RunResults(_) => HttpMethod::Get,
            Endpoint::CreateRun | Endpoint::Estimate => HttpMethod::Post,
            Endpoint::ClearHistory => HttpMethod::Delete,
        }
    }

    /// Unencoded path segments below the base URL.
    pub fn segments(&self) -> Vec<&str> {
        match self {
            Endpoint::Options => vec!["api", "options"],
            Endpoint::ListRuns | Endpoint::ClearHistory => vec!["api", "runs"],
            Endpoint::Run(id) => vec!["api", "runs", id.as_str()],
            Endpoint::RunLog(id) => vec!["api", "runs", id.as_str(), "log"],
            Endpoint::RunResults(id) => vec!["api", "runs", id.as_str(), "results"],
            Endpoint::CreateRun => vec!["api", "run"],
            Endpoint::Estimate => vec!["api", "estimate"],
        }
    }

    /// Resource label used in not-found errors.
    pub fn resource(&self) -> String {
        match self {
            Endpoint::Run(id) | Endpoint::RunLog(id) | Endpoint::RunResults(id) => {
                format!("run:{id}")
            }
            other => format!("/{}", other.segments().join("/")),
        }
    }
}
