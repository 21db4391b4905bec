//! Merge of full log snapshots into a locally held log buffer.
//!
//! The server always returns the whole current log. When the fresh snapshot
//! extends what is already buffered only the new suffix is adopted, so text a
//! viewer has already rendered stays untouched. Anything else (rotation,
//! truncation, a restarted run) replaces the buffer outright.

use serde::{Deserialize, Serialize};

/// What a merge did to the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum LogMerge {
    /// Snapshot equals the buffer.
    Unchanged,
    /// Snapshot extends the buffer by `appended_bytes`.
    Appended { appended_bytes: usize },
    /// Snapshot is not an extension of a non-empty buffer. Viewers should
    /// reset scroll/selection state instead of appending.
    Replaced { previous_len: usize },
}

impl LogMerge {
    /// True for the non-prefix replacement case.
    pub fn is_anomaly(&self) -> bool {
        matches!(self, LogMerge::Replaced { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub text: String,
    pub merge: LogMerge,
}

/// Pure merge of `incoming` into `previous`.
pub fn reconcile(previous: &str, incoming: &str) -> String {
    reconcile_detailed(previous, incoming).text
}

pub fn reconcile_detailed(previous: &str, incoming: &str) -> Reconciled {
    match incoming.strip_prefix(previous) {
        Some("") => Reconciled {
            text: previous.to_string(),
            merge: LogMerge::Unchanged,
        },
        Some(suffix) => {
            let mut text = String::with_capacity(incoming.len());
            text.push_str(previous);
            text.push_str(suffix);
            Reconciled {
                text,
                merge: LogMerge::Appended {
                    appended_bytes: suffix.len(),
                },
            }
        }
        None => Reconciled {
            text: incoming.to_string(),
            merge: LogMerge::Replaced {
                previous_len: previous.len(),
            },
        },
    }
}

/// Locally accumulated log text for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogBuffer {
    text: String,
    resets: u64,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a fresh snapshot in place.
    pub fn apply(&mut self, incoming: &str) -> LogMerge {
        let merge = match incoming.strip_prefix(self.text.as_str()) {
            Some("") => LogMerge::Unchanged,
            Some(suffix) => {
                let appended_bytes = suffix.len();
                self.text.push_str(suffix);
                LogMerge::Appended { appended_bytes }
            }
            None => {
                let previous_len = self.text.len();
                self.text.clear();
                self.text.push_str(incoming);
                LogMerge::Replaced { previous_len }
            }
        };
        if merge.is_anomaly() {
            self.resets += 1;
        }
        merge
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Number of non-prefix replacements seen so far.
    pub fn resets(&self) -> u64 {
        self.resets
    }

    /// Last `max_lines` lines, for compact displays.
    pub fn tail_lines(&self, max_lines: usize) -> Vec<&str> {
        let lines = self.text.lines().collect::<Vec<_>>();
        let start = lines.len().saturating_sub(max_lines);
        lines[start..].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconcile_is_idempotent() {
        for sample in ["", "a", "line1\nline2\n", "ünïcødé ✓"] {
            assert_eq!(reconcile(sample, sample), sample);
            assert_eq!(
                reconcile_detailed(sample, sample).merge,
                LogMerge::Unchanged
            );
        }
    }

    #[test]
    fn prefix_extension_adopts_only_the_suffix() {
        let merged = reconcile_detailed("line1\n", "line1\nline2\n");
        assert_eq!(merged.text, "line1\nline2\n");
        assert_eq!(merged.merge, LogMerge::Appended { appended_bytes: 6 });
    }

    #[test]
    fn empty_previous_always_yields_incoming() {
        assert_eq!(reconcile("", "anything"), "anything");
        assert_eq!(
            reconcile_detailed("", "abc").merge,
            LogMerge::Appended { appended_bytes: 3 }
        );
        assert_eq!(reconcile_detailed("", "").merge, LogMerge::Unchanged);
    }

    #[test]
    fn non_prefix_snapshot_replaces_and_flags_anomaly() {
        let merged = reconcile_detailed("abc", "xyz");
        assert_eq!(merged.text, "xyz");
        assert_eq!(merged.merge, LogMerge::Replaced { previous_len: 3 });
        assert!(merged.merge.is_anomaly());
    }

    #[test]
    fn shorter_snapshot_takes_replacement_branch() {
        let merged = reconcile_detailed("line1\nline2\n", "line1\n");
        assert_eq!(merged.text, "line1\n");
        assert!(merged.merge.is_anomaly());
    }

    #[test]
    fn empty_incoming_after_content_resets_buffer() {
        let merged = reconcile_detailed("line1\n", "");
        assert_eq!(merged.text, "");
        assert_eq!(merged.merge, LogMerge::Replaced { previous_len: 6 });
    }

    #[test]
    fn multibyte_prefix_is_matched_on_char_boundaries() {
        let merged = reconcile_detailed("→ step", "→ step done");
        assert_eq!(merged.text, "→ step done");
        assert!(!merged.merge.is_anomaly());
    }

    #[test]
    fn buffer_converges_on_last_of_growing_snapshots() {
        let snapshots = ["line1\n", "line1\nline2\n", "line1\nline2\nline3\n"];
        let mut buffer = LogBuffer::new();
        for snapshot in snapshots {
            assert!(!buffer.apply(snapshot).is_anomaly());
        }
        assert_eq!(buffer.as_str(), "line1\nline2\nline3\n");
        assert_eq!(buffer.resets(), 0);
    }

    #[test]
    fn buffer_repeated_snapshot_is_unchanged() {
        let mut buffer = LogBuffer::new();
        buffer.apply("abc");
        assert_eq!(buffer.apply("abc"), LogMerge::Unchanged);
        assert_eq!(buffer.as_str(), "abc");
    }

    #[test]
    fn buffer_counts_resets() {
        let mut buffer = LogBuffer::new();
        buffer.apply("abc");
        assert_eq!(buffer.apply("xyz"), LogMerge::Replaced { previous_len: 3 });
        assert_eq!(buffer.as_str(), "xyz");
        assert_eq!(buffer.resets(), 1);
    }

    #[test]
    fn buffer_matches_pure_function() {
        let steps = ["a", "ab", "abc", "zz", "zz1", "", "q"];
        let mut buffer = LogBuffer::new();
        let mut expected = String::new();
        for step in steps {
            let merge = buffer.apply(step);
            let pure = reconcile_detailed(&expected, step);
            assert_eq!(merge, pure.merge);
            expected = pure.text;
            assert_eq!(buffer.as_str(), expected);
        }
    }

    #[test]
    fn tail_lines_returns_last_lines() {
        let mut buffer = LogBuffer::new();
        buffer.apply("one\ntwo\nthree\n");
        assert_eq!(buffer.tail_lines(2), vec!["two", "three"]);
        assert_eq!(buffer.tail_lines(10).len(), 3);
    }
}
