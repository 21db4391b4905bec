//! Validation for run submissions and client configuration.

use serde::{Deserialize, Serialize};

use crate::config::WatchConfig;
use crate::types::RunConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationLevel {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub level: ValidationLevel,
    pub code: &'static str,
    pub message: String,
}

pub trait Validate {
    fn validate(&self) -> Vec<ValidationIssue>;
}

/// Error-level issues only, joined for display.
pub fn render_errors(issues: &[ValidationIssue]) -> Option<String> {
    let rendered = issues
        .iter()
        .filter(|issue| issue.level == ValidationLevel::Error)
        .map(|issue| format!("{}: {}", issue.code, issue.message))
        .collect::<Vec<_>>();
    if rendered.is_empty() {
        None
    } else {
        Some(rendered.join("; "))
    }
}

impl Validate for RunConfig {
    fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        if self.data_file.trim().is_empty() {
            issues.push(ValidationIssue {
                level: ValidationLevel::Error,
                code: "run.data_file.missing",
                message: "data_file is required".to_string(),
            });
        }

        if self.sector_map.trim().is_empty() {
            issues.push(ValidationIssue {
                level: ValidationLevel::Error,
                code: "run.sector_map.missing",
                message: "sector_map is required".to_string(),
            });
        }

        if self.max_workers == 0 {
            issues.push(ValidationIssue {
                level: ValidationLevel::Error,
                code: "run.max_workers.zero",
                message: "max_workers must be greater than zero".to_string(),
            });
        }

        if self.chunk_size == 0 {
            issues.push(ValidationIssue {
                level: ValidationLevel::Error,
                code: "run.chunk_size.zero",
                message: "chunk_size must be greater than zero".to_string(),
            });
        }

        if self.timeout == 0 {
            issues.push(ValidationIssue {
                level: ValidationLevel::Error,
                code: "run.timeout.zero",
                message: "timeout must be greater than zero".to_string(),
            });
        }

        if self.max_rows == Some(0) {
            issues.push(ValidationIssue {
                level: ValidationLevel::Warning,
                code: "run.max_rows.zero",
                message: "max_rows is 0; the run will produce no results".to_string(),
            });
        }

        if let (Some(current), Some(limit)) = (self.current_fact_limit, self.fact_limit) {
            if current > limit {
                issues.push(ValidationIssue {
                    level: ValidationLevel::Warning,
                    code: "run.current_fact_limit.above_fact_limit",
                    message: format!(
                        "current_fact_limit {current} exceeds fact_limit {limit}"
                    ),
                });
            }
        }

        issues
    }
}

impl Validate for WatchConfig {
    fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        let url = self.api.base_url.trim();
        if url.is_empty() {
            issues.push(ValidationIssue {
                level: ValidationLevel::Error,
                code: "api.base_url.empty",
                message: "api.base_url must not be empty".to_string(),
            });
        } else if !url.starts_with("http://") && !url.starts_with("https://") {
            issues.push(ValidationIssue {
                level: ValidationLevel::Error,
                code: "api.base_url.scheme",
                message: "api.base_url must start with http:// or https://".to_string(),
            });
        }

        if self.api.request_timeout_secs == 0 {
            issues.push(ValidationIssue {
                level: ValidationLevel::Error,
                code: "api.request_timeout.zero",
                message: "request timeout cannot be 0".to_string(),
            });
        }

        if self.poll.interval_ms == 0 {
            issues.push(ValidationIssue {
                level: ValidationLevel::Error,
                code: "poll.interval.zero",
                message: "poll interval cannot be 0".to_string(),
            });
        } else if self.poll.interval_ms < 500 {
            issues.push(ValidationIssue {
                level: ValidationLevel::Warning,
                code: "poll.interval.low",
                message: format!(
                    "poll interval {}ms issues three requests per tick and may overload the server",
                    self.poll.interval_ms
                ),
            });
        }

        issues
    }
}
