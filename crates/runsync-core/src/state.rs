//! Run lifecycle states as reported by the server.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Server-side status of a run.
///
/// The server moves a run `queued -> running -> {completed, completed_with_warnings, failed}`.
/// Any tag this client does not know decodes to [`RunStatus::Unknown`] instead
/// of failing the whole payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RunStatus {
    #[default]
    Queued,
    Running,
    Completed,
    /// Results were written but a follow-up step (graph generation) failed.
    CompletedWithWarnings,
    Failed,
    Unknown,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::CompletedWithWarnings => "completed_with_warnings",
            RunStatus::Failed => "failed",
            RunStatus::Unknown => "unknown",
        }
    }

    /// Lenient parse used for wire values. Never fails.
    pub fn from_wire(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "queued" => RunStatus::Queued,
            "running" => RunStatus::Running,
            "completed" => RunStatus::Completed,
            "completed_with_warnings" => RunStatus::CompletedWithWarnings,
            "failed" => RunStatus::Failed,
            _ => RunStatus::Unknown,
        }
    }

    /// Returns true once no further status transitions can occur.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::CompletedWithWarnings | RunStatus::Failed
        )
    }

    pub fn is_active(self) -> bool {
        matches!(self, RunStatus::Running)
    }

    pub fn is_success(self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::CompletedWithWarnings
        )
    }

    fn rank(self) -> Option<u8> {
        match self {
            RunStatus::Queued => Some(0),
            RunStatus::Running => Some(1),
            RunStatus::Completed | RunStatus::CompletedWithWarnings | RunStatus::Failed => Some(2),
            RunStatus::Unknown => None,
        }
    }
}

/// Whether `from -> to` is a legal lifecycle step.
///
/// Staying in place is always allowed. Terminal states never change into one
/// another. Transitions involving `Unknown` are accepted since nothing can be
/// said about them.
pub fn is_transition_allowed(from: RunStatus, to: RunStatus) -> bool {
    if from == to {
        return true;
    }
    match (from.rank(), to.rank()) {
        (Some(_), Some(_)) if from.is_terminal() => false,
        (Some(a), Some(b)) => b > a,
        _ => true,
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match RunStatus::from_wire(value) {
            RunStatus::Unknown if value.trim().to_ascii_lowercase() != "unknown" => Err(format!(
                "invalid run status '{value}'. valid values: queued, running, completed, completed_with_warnings, failed"
            )),
            status => Ok(status),
        }
    }
}

impl Serialize for RunStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RunStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(RunStatus::from_wire(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_status_serializes_as_snake_case() {
        let json = serde_json::to_string(&RunStatus::CompletedWithWarnings).unwrap();
        assert_eq!(json, "\"completed_with_warnings\"");

        let json = serde_json::to_string(&RunStatus::Queued).unwrap();
        assert_eq!(json, "\"queued\"");
    }

    #[test]
    fn unrecognized_status_decodes_as_unknown() {
        let status: RunStatus = serde_json::from_str("\"paused\"").unwrap();
        assert_eq!(status, RunStatus::Unknown);
        assert_eq!(status.to_string(), "unknown");
        assert!(!status.is_terminal());
    }

    #[test]
    fn status_decoding_is_case_insensitive() {
        let status: RunStatus = serde_json::from_str("\"RUNNING\"").unwrap();
        assert_eq!(status, RunStatus::Running);
    }

    #[test]
    fn terminal_state_check() {
        assert!(!RunStatus::Queued.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::CompletedWithWarnings.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
    }

    #[test]
    fn forward_transitions_are_allowed() {
        assert!(is_transition_allowed(RunStatus::Queued, RunStatus::Running));
        assert!(is_transition_allowed(RunStatus::Running, RunStatus::Completed));
        assert!(is_transition_allowed(RunStatus::Running, RunStatus::Failed));
        assert!(is_transition_allowed(RunStatus::Queued, RunStatus::Failed));
        assert!(is_transition_allowed(RunStatus::Completed, RunStatus::Completed));
    }

    #[test]
    fn regressions_and_terminal_swaps_are_rejected() {
        assert!(!is_transition_allowed(RunStatus::Running, RunStatus::Queued));
        assert!(!is_transition_allowed(RunStatus::Completed, RunStatus::Running));
        assert!(!is_transition_allowed(RunStatus::Completed, RunStatus::Failed));
        assert!(!is_transition_allowed(RunStatus::Failed, RunStatus::Completed));
    }

    #[test]
    fn unknown_transitions_are_not_judged() {
        assert!(is_transition_allowed(RunStatus::Unknown, RunStatus::Queued));
        assert!(is_transition_allowed(RunStatus::Completed, RunStatus::Unknown));
    }

    #[test]
    fn from_str_rejects_garbage_but_accepts_unknown() {
        assert_eq!("failed".parse::<RunStatus>().unwrap(), RunStatus::Failed);
        assert_eq!("unknown".parse::<RunStatus>().unwrap(), RunStatus::Unknown);
        let err = "bogus".parse::<RunStatus>().unwrap_err();
        assert!(err.contains("invalid run status 'bogus'"));
    }
}
