/// Dashboard lifecycle tests with an in-memory backend.
///
/// Covers the scheduler (start, trigger, stop), latest-cycle-wins display
/// state, the refresh log and its aggregation, and the HTML target.
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use segdash::api::{Backend, FetchError};
use segdash::controller::{CancelToken, Dashboard, Trigger};
use segdash::display::{
    HtmlDisplay, MemoryDisplay, PageOptions, SharedDisplay, Slot, render_page,
};
use segdash::history::logger::RefreshLog;
use segdash::history::reporter;
use segdash::model::{ChartKind, ChartPayload, SegmentDetails};
use segdash::scheduler;

fn details(size_a: u64, age_a: f64) -> SegmentDetails {
    SegmentDetails::from_json(&format!(
        r#"{{
        "A": {{"size": {size_a}, "percentage": 50.0,
              "mean_values": {{"age": {age_a}, "montant_consommation": 200}},
              "offer": {{"reduction": 0.1, "services_additionnels": ["x", "y"]}}}},
        "B": {{"size": 100, "percentage": 50.0,
              "mean_values": {{"age": 60, "montant_consommation": 400}},
              "offer": {{"reduction": 0.2, "services_additionnels": ["z"]}}}}
    }}"#
    ))
    .unwrap()
}

fn chart() -> ChartPayload {
    serde_json::from_str(r#"{"data": [{"type": "pie"}], "layout": {"title": "t"}}"#).unwrap()
}

/// Serves a queue of detail responses; the last one repeats.
struct ScriptedBackend {
    details: Mutex<Vec<Result<SegmentDetails, FetchError>>>,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    fn new(mut script: Vec<Result<SegmentDetails, FetchError>>) -> Self {
        script.reverse();
        Self {
            details: Mutex::new(script),
            calls: AtomicUsize::new(0),
        }
    }
}

impl Backend for ScriptedBackend {
    fn segment_details(&self) -> Result<SegmentDetails, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.details.lock().unwrap();
        if script.len() > 1 {
            script.pop().unwrap()
        } else {
            script.last().cloned().unwrap()
        }
    }

    fn chart(&self, _kind: ChartKind) -> Result<ChartPayload, FetchError> {
        Ok(chart())
    }
}

fn temp_dir(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("segdash-it-{name}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

#[test]
fn second_cycle_replaces_first() {
    let backend = ScriptedBackend::new(vec![Ok(details(100, 40.0)), Ok(details(300, 80.0))]);
    let mut dashboard = Dashboard::new(backend, MemoryDisplay::new());

    assert!(dashboard.refresh().is_success());
    assert_eq!(dashboard.display().state().slot(Slot::TotalClients), Some("200"));

    assert!(dashboard.refresh().is_success());
    let state = dashboard.display().state();
    assert_eq!(state.slot(Slot::TotalClients), Some("400"));
    // (300 * 80 + 100 * 60) / 400
    assert_eq!(state.slot(Slot::AvgAge), Some("75"));
    assert_eq!(state.table.len(), 2);
    assert_eq!(state.table[0].members, "300 (50.0%)");
}

#[test]
fn failed_cycle_keeps_previous_charts_and_table() {
    let backend = ScriptedBackend::new(vec![
        Ok(details(100, 40.0)),
        Err(FetchError::network("/api/segment_details", "connection refused")),
    ]);
    let mut dashboard = Dashboard::new(backend, MemoryDisplay::new());

    assert!(dashboard.refresh().is_success());
    assert!(!dashboard.refresh().is_success());

    let state = dashboard.display().state();
    assert!(!state.loading);
    assert_eq!(state.charts.len(), 3);
    assert_eq!(state.table.len(), 2);
    assert_eq!(state.alerts.len(), 1);
}

#[test]
fn recovered_cycle_drops_alert_banner() {
    let dir = temp_dir("recover");
    let path = dir.join("dashboard.html");
    let backend = ScriptedBackend::new(vec![
        Err(FetchError::network("/api/segment_details", "connection refused")),
        Ok(details(100, 40.0)),
    ]);
    let mut dashboard = Dashboard::new(backend, (MemoryDisplay::new(), HtmlDisplay::new(&path)));

    assert!(!dashboard.refresh().is_success());
    let failed_page = render_page(dashboard.display().0.state(), &PageOptions::default());
    assert!(failed_page.contains("class=\"alert\""));

    assert!(dashboard.refresh().is_success());
    let (memory, _) = dashboard.display();
    assert!(memory.state().active_alert.is_none());
    assert_eq!(memory.state().alerts.len(), 1);
    let page = render_page(memory.state(), &PageOptions::default());
    assert!(!page.contains("class=\"alert\""));
    let written = std::fs::read_to_string(&path).unwrap();
    assert!(!written.contains("class=\"alert\""));

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn scheduler_runs_trigger_and_returns_dashboard() {
    let display = SharedDisplay::new();
    let backend = ScriptedBackend::new(vec![Ok(details(100, 40.0)), Ok(details(500, 40.0))]);
    let handle = scheduler::start(
        Dashboard::new(backend, display.clone()),
        Duration::from_secs(3600),
    );

    assert!(handle.wait_for_cycles(1, Duration::from_secs(5)));
    assert_eq!(display.snapshot().slot(Slot::TotalClients), Some("200"));

    assert!(handle.trigger());
    assert!(handle.wait_for_cycles(2, Duration::from_secs(5)));

    let dashboard = scheduler::stop(handle).unwrap();
    assert_eq!(dashboard.backend().calls.load(Ordering::SeqCst), 2);
    assert_eq!(display.snapshot().slot(Slot::TotalClients), Some("600"));
    assert!(!display.snapshot().loading);
}

#[test]
fn refresh_log_feeds_history_stats() {
    let dir = temp_dir("log");
    let log = RefreshLog::at(dir.join("refresh-log.jsonl"));
    let backend = ScriptedBackend::new(vec![
        Ok(details(100, 40.0)),
        Err(FetchError::malformed("/api/segment_details", "expected `,`")),
        Ok(details(100, 40.0)),
    ]);
    let mut dashboard = Dashboard::new(backend, MemoryDisplay::new()).with_log(log.clone());

    dashboard.refresh();
    dashboard.refresh();
    dashboard.run_cycle(Trigger::Timer, &CancelToken::new());
    let cancel = CancelToken::new();
    cancel.cancel();
    dashboard.run_cycle(Trigger::Timer, &cancel);

    let entries = log.read_all();
    assert_eq!(entries.len(), 4);
    assert_eq!(entries[0].trigger, "manual");
    assert_eq!(entries[0].total_clients, Some(200));
    assert_eq!(entries[1].error_kind.as_deref(), Some("malformed"));
    assert_eq!(entries[2].trigger, "timer");
    assert_eq!(entries[3].outcome, "cancelled");

    let stats = reporter::build_stats(&entries);
    assert_eq!(stats.successes, 2);
    assert_eq!(stats.failures, 1);
    assert_eq!(stats.cancelled, 1);
    assert_eq!(stats.failures_by_kind, vec![("malformed".to_string(), 1)]);

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn html_and_memory_targets_together() {
    let dir = temp_dir("html");
    let path = dir.join("dashboard.html");
    let backend = ScriptedBackend::new(vec![Ok(details(100, 40.0))]);
    let mut dashboard = Dashboard::new(backend, (MemoryDisplay::new(), HtmlDisplay::new(&path)));

    assert!(dashboard.refresh().is_success());

    let (memory, html) = dashboard.display();
    assert_eq!(memory.state().slots, html.state().slots);
    assert_eq!(memory.state().table, html.state().table);
    let page = std::fs::read_to_string(&path).unwrap();
    assert!(page.contains("<p id=\"total-clients\">200</p>"));
    assert!(page.contains("Plotly.newPlot('feature-importance'"));
    assert!(page.contains("Segment B"));

    let _ = std::fs::remove_dir_all(dir);
}
