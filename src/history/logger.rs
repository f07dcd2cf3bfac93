use std::fs::{self, OpenOptions, create_dir_all};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::schema::LoggingConfig;
use crate::controller::{CycleError, CycleOutcome};

// ---------------------------------------------------------------------------
// Cycle log entry (JSONL)
// ---------------------------------------------------------------------------

/// A single entry in the refresh log (`~/.segdash/refresh-log.jsonl`).
///
/// One line per refresh cycle, successful or not. Read back by the reporter
/// for `segdash history`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleLogEntry {
    pub timestamp: String,
    /// `"startup"`, `"timer"` or `"manual"`.
    pub trigger: String,
    /// `"success"`, `"failure"` or `"cancelled"`.
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub segments: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub total_clients: Option<u64>,
}

impl CycleLogEntry {
    pub fn from_outcome(outcome: &CycleOutcome) -> Self {
        let mut entry = Self {
            timestamp: outcome.started_at.to_rfc3339(),
            trigger: outcome.trigger.to_string(),
            outcome: "success".to_string(),
            error_kind: None,
            error: None,
            duration_ms: u64::try_from(outcome.duration.as_millis()).unwrap_or(u64::MAX),
            segments: None,
            total_clients: None,
        };

        match &outcome.result {
            Ok(report) => {
                entry.segments = Some(report.segments);
                entry.total_clients = Some(report.overview.total_clients);
            }
            Err(CycleError::Cancelled) => entry.outcome = "cancelled".to_string(),
            Err(e) => {
                entry.outcome = "failure".to_string();
                entry.error_kind = Some(e.kind().to_string());
                entry.error = Some(e.to_string());
            }
        }
        entry
    }

    pub fn is_success(&self) -> bool {
        self.outcome == "success"
    }

    pub fn is_failure(&self) -> bool {
        self.outcome == "failure"
    }

    /// `YYYY-MM-DD` part of the timestamp.
    pub fn date(&self) -> &str {
        self.timestamp.get(..10).unwrap_or("unknown")
    }
}

// ---------------------------------------------------------------------------
// RefreshLog
// ---------------------------------------------------------------------------

/// Location of the refresh log, or nowhere when logging is disabled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshLog {
    path: Option<PathBuf>,
}

impl RefreshLog {
    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn from_config(config: &LoggingConfig) -> Self {
        Self {
            path: config.log_path(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append an entry. Best-effort: failures are ignored.
    pub fn append(&self, entry: &CycleLogEntry) {
        if let Some(path) = &self.path {
            let _ = append_log_entry(path, entry);
        }
    }

    /// Read all entries, skipping malformed lines.
    ///
    /// Returns an empty vec if the file does not exist or cannot be read.
    pub fn read_all(&self) -> Vec<CycleLogEntry> {
        let Some(path) = &self.path else {
            return Vec::new();
        };

        let Ok(file) = fs::File::open(path) else {
            return Vec::new();
        };

        BufReader::new(file)
            .lines()
            .map_while(Result::ok)
            .filter_map(|line| serde_json::from_str::<CycleLogEntry>(&line).ok())
            .collect()
    }

    /// Entries from the last `days` days, or all of them when `None`.
    pub fn read_since_days(&self, days: Option<u32>) -> Vec<CycleLogEntry> {
        filter_since_days(self.read_all(), days)
    }
}

/// Keep entries whose timestamp falls within the last `days` days.
pub fn filter_since_days(entries: Vec<CycleLogEntry>, days: Option<u32>) -> Vec<CycleLogEntry> {
    let Some(days) = days else {
        return entries;
    };

    let cutoff = (Utc::now() - chrono::Duration::days(i64::from(days))).to_rfc3339();
    entries
        .into_iter()
        .filter(|e| e.timestamp >= cutoff)
        .collect()
}

fn append_log_entry(path: &Path, entry: &CycleLogEntry) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let json = serde_json::to_string(entry)?;
    writeln!(file, "{json}")?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::api::FetchError;
    use crate::controller::{CycleReport, Trigger};
    use crate::overview::Overview;

    fn outcome(result: Result<CycleReport, CycleError>) -> CycleOutcome {
        CycleOutcome {
            trigger: Trigger::Timer,
            started_at: Utc::now(),
            duration: Duration::from_millis(42),
            result,
        }
    }

    fn temp_log(name: &str) -> (PathBuf, RefreshLog) {
        let dir = std::env::temp_dir().join(format!("segdash-log-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        let path = dir.join("refresh-log.jsonl");
        (dir, RefreshLog::at(path))
    }

    #[test]
    fn success_entry_carries_counts() {
        let report = CycleReport {
            overview: Overview {
                total_clients: 200,
                total_segments: 2,
                average_age: Some(50.0),
                average_consumption: Some(300.0),
            },
            segments: 2,
        };
        let entry = CycleLogEntry::from_outcome(&outcome(Ok(report)));
        assert!(entry.is_success());
        assert_eq!(entry.trigger, "timer");
        assert_eq!(entry.duration_ms, 42);
        assert_eq!(entry.segments, Some(2));
        assert_eq!(entry.total_clients, Some(200));
        assert!(entry.error.is_none());
    }

    #[test]
    fn failure_entry_carries_error() {
        let err = FetchError::network("/api/cluster_profiles", "connection refused");
        let entry = CycleLogEntry::from_outcome(&outcome(Err(err.into())));
        assert!(entry.is_failure());
        assert_eq!(entry.error_kind.as_deref(), Some("network"));
        assert!(entry.error.unwrap().contains("/api/cluster_profiles"));
    }

    #[test]
    fn cancelled_entry_is_neither_success_nor_failure() {
        let entry = CycleLogEntry::from_outcome(&outcome(Err(CycleError::Cancelled)));
        assert_eq!(entry.outcome, "cancelled");
        assert!(!entry.is_success());
        assert!(!entry.is_failure());
    }

    #[test]
    fn append_then_read_skips_garbage() {
        let (dir, log) = temp_log("append");
        log.append(&CycleLogEntry::from_outcome(&outcome(Err(CycleError::Cancelled))));
        {
            let mut file = OpenOptions::new()
                .append(true)
                .open(log.path().unwrap())
                .unwrap();
            writeln!(file, "not json").unwrap();
        }
        log.append(&CycleLogEntry::from_outcome(&outcome(Err(CycleError::Cancelled))));

        assert_eq!(log.read_all().len(), 2);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn disabled_log_reads_nothing() {
        let log = RefreshLog::disabled();
        log.append(&CycleLogEntry::from_outcome(&outcome(Err(CycleError::Cancelled))));
        assert!(log.read_all().is_empty());
    }

    #[test]
    fn day_filter_drops_old_entries() {
        let mut old = CycleLogEntry::from_outcome(&outcome(Err(CycleError::Cancelled)));
        old.timestamp = "2020-01-01T00:00:00+00:00".to_string();
        let recent = CycleLogEntry::from_outcome(&outcome(Err(CycleError::Cancelled)));

        let kept = filter_since_days(vec![old.clone(), recent], Some(7));
        assert_eq!(kept.len(), 1);
        assert_eq!(filter_since_days(vec![old], None).len(), 1);
    }
}
