//! Wire-level data model shared by the transport and the sync engine.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::state::RunStatus;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Submission parameters of a run.
///
/// The server echoes this back inside every [`RunRecord`] with paths
/// normalized; keys this client does not model are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub data_file: String,
    #[serde(default)]
    pub sector_map: String,
    #[serde(default = "default_max_workers")]
    pub max_workers: u32,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,
    /// Per-row timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fact_limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_fact_limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rows: Option<u64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl RunConfig {
    pub fn new(data_file: impl Into<String>, sector_map: impl Into<String>) -> Self {
        Self {
            data_file: data_file.into(),
            sector_map: sector_map.into(),
            ..Self::default()
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            data_file: String::new(),
            sector_map: String::new(),
            max_workers: default_max_workers(),
            chunk_size: default_chunk_size(),
            timeout: default_timeout(),
            fact_limit: None,
            current_fact_limit: None,
            top_k: None,
            max_rows: None,
            extra: BTreeMap::new(),
        }
    }
}

fn default_max_workers() -> u32 {
    1
}

fn default_chunk_size() -> u32 {
    2
}

fn default_timeout() -> u64 {
    120
}

/// Identity and status of one submitted run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: RunId,
    #[serde(default)]
    pub config: RunConfig,
    #[serde(default)]
    pub status: RunStatus,
    /// Epoch seconds.
    #[serde(default)]
    pub created_at: f64,
    #[serde(default)]
    pub finished_at: Option<f64>,
    #[serde(default)]
    pub total_rows: Option<u64>,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub completed_rows: u64,
    #[serde(default)]
    pub kg_path: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub log_path: Option<String>,
    #[serde(default)]
    pub results_csv: Option<String>,
    #[serde(default)]
    pub live_results_path: Option<String>,
}

impl RunRecord {
    pub fn new(run_id: RunId, config: RunConfig) -> Self {
        Self {
            run_id,
            config,
            status: RunStatus::Queued,
            created_at: 0.0,
            finished_at: None,
            total_rows: None,
            completed_rows: 0,
            kg_path: None,
            error: None,
            log_path: None,
            results_csv: None,
            live_results_path: None,
        }
    }

    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        epoch_to_utc(self.created_at)
    }

    pub fn finished_at_utc(&self) -> Option<DateTime<Utc>> {
        self.finished_at.and_then(epoch_to_utc)
    }

    pub fn dataset_name(&self) -> &str {
        let path = self.config.data_file.as_str();
        path.rsplit(['/', '\\']).next().unwrap_or(path)
    }
}

pub fn epoch_to_utc(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return None;
    }
    let whole = seconds.trunc() as i64;
    let nanos = ((seconds - seconds.trunc()) * 1e9).round() as u32;
    Utc.timestamp_opt(whole, nanos.min(999_999_999)).single()
}

/// One prediction row from the results table.
///
/// `ticker` and `quarter` form a natural key, but the server may re-emit
/// partial rows so duplicates are possible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResultRow {
    #[serde(default, deserialize_with = "lenient_string")]
    pub ticker: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub quarter: String,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub predicted_direction: Option<String>,
    /// `None` until the model has scored the row.
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub direction_score: Option<f64>,
    /// `None` until ground truth is known.
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub actual_return: Option<f64>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub error: Option<String>,
}

impl RunResultRow {
    pub fn key(&self) -> (&str, &str) {
        (&self.ticker, &self.quarter)
    }

    pub fn is_scored(&self) -> bool {
        self.direction_score.is_some()
    }
}

/// A dataset the server offers for new runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetOption {
    pub label: String,
    pub data_file: String,
    pub sector_map: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimateRequest {
    pub data_file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rows: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fact_limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_fact_limit: Option<u32>,
}

impl EstimateRequest {
    pub fn for_config(config: &RunConfig) -> Self {
        Self {
            data_file: config.data_file.clone(),
            max_rows: config.max_rows,
            top_k: config.top_k,
            fact_limit: config.fact_limit,
            current_fact_limit: config.current_fact_limit,
        }
    }
}

/// Cost/time estimate returned by the server.
///
/// The payload is opaque; only the handful of fields below are ever read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EstimateResult(pub Value);

impl EstimateResult {
    pub fn rows(&self) -> Option<u64> {
        self.0.get("rows").and_then(Value::as_u64)
    }

    pub fn avg_tokens_per_row(&self) -> Option<f64> {
        self.0.get("avg_tokens_per_row").and_then(Value::as_f64)
    }

    pub fn total_tokens(&self) -> Option<u64> {
        self.0.get("total_tokens").and_then(Value::as_u64)
    }

    pub fn estimated_cost_usd(&self) -> Option<f64> {
        self.0.get("estimated_cost_usd").and_then(Value::as_f64)
    }

    pub fn estimated_time_seconds(&self) -> Option<f64> {
        self.0.get("estimated_time_seconds").and_then(Value::as_f64)
    }

    pub fn raw(&self) -> &Value {
        &self.0
    }
}

fn null_as_zero<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    Ok(Option::<u64>::deserialize(deserializer)?.unwrap_or(0))
}

// Result cells come from a CSV on the server: blanks arrive as "" or null and
// numbers sometimes arrive as strings.
fn lenient_opt_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_f64().filter(|x| x.is_finite()),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|x| x.is_finite()),
        _ => None,
    })
}

fn lenient_opt_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(lenient_opt_string(deserializer)?.unwrap_or_default())
}
