//! Refresh history reporter: aggregation and daily trends.
//!
//! Reads the JSONL refresh log and provides:
//! - **Stats**: cycle counts, success rate, durations, failures by kind
//! - **Trends**: per-day cycle and failure counts

use std::collections::HashMap;

use serde::Serialize;

use crate::history::logger::CycleLogEntry;

/// Failures listed in [`HistoryStats::recent_failures`].
const RECENT_FAILURES: usize = 5;

// ---------------------------------------------------------------------------
// Aggregated stats
// ---------------------------------------------------------------------------

/// Summary statistics for `segdash history`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HistoryStats {
    pub total_cycles: usize,
    pub successes: usize,
    pub failures: usize,
    pub cancelled: usize,
    pub avg_duration_ms: f64,
    /// Timestamp of the latest successful cycle.
    pub last_success: Option<String>,
    /// Failure counts per error kind, most frequent first.
    pub failures_by_kind: Vec<(String, usize)>,
    /// Latest failures, newest first.
    pub recent_failures: Vec<CycleLogEntry>,
}

impl HistoryStats {
    /// Successful share of finished (non-cancelled) cycles, in percent.
    pub fn success_rate(&self) -> f64 {
        let finished = self.successes + self.failures;
        if finished == 0 {
            0.0
        } else {
            (self.successes as f64 / finished as f64) * 100.0
        }
    }
}

/// A single data point in the daily trend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendEntry {
    pub date: String,
    pub cycles: usize,
    pub failures: usize,
    pub avg_duration_ms: f64,
}

// ---------------------------------------------------------------------------
// Stats computation
// ---------------------------------------------------------------------------

pub fn build_stats(entries: &[CycleLogEntry]) -> HistoryStats {
    if entries.is_empty() {
        return HistoryStats::default();
    }

    let successes = entries.iter().filter(|e| e.is_success()).count();
    let failures = entries.iter().filter(|e| e.is_failure()).count();
    let total_duration: u64 = entries.iter().map(|e| e.duration_ms).sum();

    let last_success = entries
        .iter()
        .filter(|e| e.is_success())
        .map(|e| e.timestamp.clone())
        .max();

    let mut kinds: HashMap<&str, usize> = HashMap::new();
    for entry in entries.iter().filter(|e| e.is_failure()) {
        *kinds
            .entry(entry.error_kind.as_deref().unwrap_or("unknown"))
            .or_default() += 1;
    }
    let mut failures_by_kind: Vec<(String, usize)> = kinds
        .into_iter()
        .map(|(kind, count)| (kind.to_string(), count))
        .collect();
    failures_by_kind.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut recent_failures: Vec<CycleLogEntry> =
        entries.iter().filter(|e| e.is_failure()).cloned().collect();
    recent_failures.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    recent_failures.truncate(RECENT_FAILURES);

    HistoryStats {
        total_cycles: entries.len(),
        successes,
        failures,
        cancelled: entries.len() - successes - failures,
        avg_duration_ms: total_duration as f64 / entries.len() as f64,
        last_success,
        failures_by_kind,
        recent_failures,
    }
}

// ---------------------------------------------------------------------------
// Trends
// ---------------------------------------------------------------------------

/// Group entries by day, oldest first.
pub fn compute_trends(entries: &[CycleLogEntry]) -> Vec<TrendEntry> {
    let mut daily: HashMap<&str, Vec<&CycleLogEntry>> = HashMap::new();
    for entry in entries {
        daily.entry(entry.date()).or_default().push(entry);
    }

    let mut trends: Vec<TrendEntry> = daily
        .into_iter()
        .map(|(date, group)| {
            let cycles = group.len();
            let total: u64 = group.iter().map(|e| e.duration_ms).sum();
            TrendEntry {
                date: date.to_string(),
                cycles,
                failures: group.iter().filter(|e| e.is_failure()).count(),
                avg_duration_ms: total as f64 / cycles as f64,
            }
        })
        .collect();

    trends.sort_by(|a, b| a.date.cmp(&b.date));
    trends
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(timestamp: &str, outcome: &str, kind: Option<&str>, duration_ms: u64) -> CycleLogEntry {
        CycleLogEntry {
            timestamp: timestamp.to_string(),
            trigger: "timer".to_string(),
            outcome: outcome.to_string(),
            error_kind: kind.map(str::to_string),
            error: kind.map(|k| format!("{k} error")),
            duration_ms,
            segments: (outcome == "success").then_some(4),
            total_clients: (outcome == "success").then_some(1200),
        }
    }

    fn sample_entries() -> Vec<CycleLogEntry> {
        vec![
            entry("2025-01-15T10:00:00+00:00", "success", None, 100),
            entry("2025-01-15T10:05:00+00:00", "failure", Some("network"), 300),
            entry("2025-01-16T10:00:00+00:00", "success", None, 200),
            entry("2025-01-16T10:05:00+00:00", "failure", Some("malformed"), 50),
            entry("2025-01-16T10:10:00+00:00", "failure", Some("network"), 250),
            entry("2025-01-16T10:15:00+00:00", "cancelled", None, 100),
        ]
    }

    #[test]
    fn test_build_stats_totals() {
        let stats = build_stats(&sample_entries());
        assert_eq!(stats.total_cycles, 6);
        assert_eq!(stats.successes, 2);
        assert_eq!(stats.failures, 3);
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.avg_duration_ms, 1000.0 / 6.0);
        assert_eq!(stats.success_rate(), 40.0);
        assert_eq!(stats.last_success.as_deref(), Some("2025-01-16T10:00:00+00:00"));
    }

    #[test]
    fn test_failures_grouped_by_kind() {
        let stats = build_stats(&sample_entries());
        assert_eq!(
            stats.failures_by_kind,
            vec![("network".to_string(), 2), ("malformed".to_string(), 1)]
        );
        assert_eq!(stats.recent_failures.len(), 3);
        assert_eq!(stats.recent_failures[0].timestamp, "2025-01-16T10:10:00+00:00");
    }

    #[test]
    fn test_empty_entries() {
        let stats = build_stats(&[]);
        assert_eq!(stats.total_cycles, 0);
        assert_eq!(stats.success_rate(), 0.0);
        assert!(stats.last_success.is_none());
    }

    #[test]
    fn test_trends_grouping() {
        let trends = compute_trends(&sample_entries());
        assert_eq!(trends.len(), 2);
        assert_eq!(trends[0].date, "2025-01-15");
        assert_eq!(trends[0].cycles, 2);
        assert_eq!(trends[0].failures, 1);
        assert_eq!(trends[0].avg_duration_ms, 200.0);
        assert_eq!(trends[1].date, "2025-01-16");
        assert_eq!(trends[1].cycles, 4);
        assert_eq!(trends[1].failures, 2);
    }
}
