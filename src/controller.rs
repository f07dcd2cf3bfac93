//! The dashboard refresh cycle.
//!
//! One cycle runs strictly in sequence:
//!
//! 1. fetch segment details
//! 2. compute and render the overview cards
//! 3. fetch all three charts, then render them
//! 4. render the segment table
//!
//! The whole cycle sits behind a single failure boundary. Any fetch error
//! aborts the remaining steps, shows one alert and is logged; whatever was
//! rendered before the failure stays on screen. The loading indicator is
//! held by a [`LoadingGuard`] and cleared on every exit path.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::api::{Backend, FetchError};
use crate::config::DashboardConfig;
use crate::config::schema::LogLevel;
use crate::display::{DisplayTarget, LoadingGuard, SegmentRow, Slot};
use crate::format::{self, NumberFormat};
use crate::history::logger::{CycleLogEntry, RefreshLog};
use crate::model::{ChartKind, ChartPayload, SegmentDetails};
use crate::overview::{Overview, compute_overview};

/// Alert shown to the user when a cycle fails.
pub const ALERT_MESSAGE: &str = "Une erreur est survenue lors du chargement des données.";

// ---------------------------------------------------------------------------
// Cycle types
// ---------------------------------------------------------------------------

/// What started a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    Startup,
    Timer,
    Manual,
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Startup => write!(f, "startup"),
            Self::Timer => write!(f, "timer"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

/// Why a cycle did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CycleError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// Stop was requested while the cycle was running.
    #[error("refresh cancelled")]
    Cancelled,
}

impl CycleError {
    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fetch(e) => e.kind(),
            Self::Cancelled => "cancelled",
        }
    }
}

/// Figures from a completed cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub overview: Overview,
    pub segments: usize,
}

/// Result of one cycle, successful or not.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub trigger: Trigger,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub result: Result<CycleReport, CycleError>,
}

impl CycleOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Cooperative cancellation flag shared between a cycle and its owner.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), CycleError> {
        if self.is_cancelled() {
            Err(CycleError::Cancelled)
        } else {
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Rendering and fetching options for a [`Dashboard`].
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardOptions {
    pub number_format: NumberFormat,
    pub segment_label_prefix: String,
    pub concurrent_charts: bool,
    /// Stderr verbosity for cycle diagnostics.
    pub log_level: LogLevel,
}

impl Default for DashboardOptions {
    fn default() -> Self {
        Self {
            number_format: NumberFormat::default(),
            segment_label_prefix: "Segment".to_string(),
            concurrent_charts: true,
            log_level: LogLevel::Info,
        }
    }
}

impl DashboardOptions {
    pub fn from_config(config: &DashboardConfig) -> Self {
        Self {
            number_format: config.display.number_format(),
            segment_label_prefix: config.display.segment_label_prefix.clone(),
            concurrent_charts: config.refresh.concurrent_charts,
            log_level: config.logging.level,
        }
    }
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

/// Dashboard controller: a backend, a display and the cycle that joins them.
pub struct Dashboard<B, D> {
    backend: B,
    display: D,
    options: DashboardOptions,
    log: RefreshLog,
}

impl<B: Backend, D: DisplayTarget> Dashboard<B, D> {
    /// Controller with default options and no refresh log.
    pub fn new(backend: B, display: D) -> Self {
        Self {
            backend,
            display,
            options: DashboardOptions::default(),
            log: RefreshLog::disabled(),
        }
    }

    /// Controller configured from the resolved config, logging included.
    pub fn from_config(backend: B, display: D, config: &DashboardConfig) -> Self {
        Self {
            backend,
            display,
            options: DashboardOptions::from_config(config),
            log: RefreshLog::from_config(&config.logging),
        }
    }

    pub fn with_options(mut self, options: DashboardOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_log(mut self, log: RefreshLog) -> Self {
        self.log = log;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }

    pub fn options(&self) -> &DashboardOptions {
        &self.options
    }

    pub fn into_display(self) -> D {
        self.display
    }

    /// Run one user-triggered cycle.
    pub fn refresh(&mut self) -> CycleOutcome {
        self.run_cycle(Trigger::Manual, &CancelToken::new())
    }

    /// Run one cycle, checking `cancel` between phases.
    ///
    /// Never fails: errors are shown, logged and returned in the outcome.
    pub fn run_cycle(&mut self, trigger: Trigger, cancel: &CancelToken) -> CycleOutcome {
        let started_at = Utc::now();
        let clock = Instant::now();

        let result = {
            let mut display = LoadingGuard::new(&mut self.display);
            let result = run_phases(&self.backend, &mut *display, &self.options, cancel);
            if let Err(CycleError::Fetch(_)) = &result {
                display.alert(ALERT_MESSAGE);
            }
            result
        };

        let outcome = CycleOutcome {
            trigger,
            started_at,
            duration: clock.elapsed(),
            result,
        };
        self.report(&outcome);
        outcome
    }

    fn report(&self, outcome: &CycleOutcome) {
        self.log.append(&CycleLogEntry::from_outcome(outcome));

        match &outcome.result {
            Ok(report) => self.diagnostic(
                LogLevel::Debug,
                format!(
                    "{} refresh ok: {} segments, {} clients in {}ms",
                    outcome.trigger,
                    report.segments,
                    report.overview.total_clients,
                    outcome.duration.as_millis()
                ),
            ),
            Err(CycleError::Cancelled) => {
                self.diagnostic(LogLevel::Info, format!("{} refresh cancelled", outcome.trigger))
            }
            Err(e) => self.diagnostic(
                LogLevel::Error,
                format!("{} refresh failed: {e}", outcome.trigger),
            ),
        }
    }

    fn diagnostic(&self, level: LogLevel, message: String) {
        if level <= self.options.log_level {
            eprintln!("[segdash] {message}");
        }
    }
}

fn run_phases<B, D>(
    backend: &B,
    display: &mut D,
    options: &DashboardOptions,
    cancel: &CancelToken,
) -> Result<CycleReport, CycleError>
where
    B: Backend + ?Sized,
    D: DisplayTarget + ?Sized,
{
    cancel.check()?;
    let details = load_segment_details(backend)?;
    cancel.check()?;

    let overview = compute_overview(&details);
    render_overview(display, &overview, &options.number_format);
    cancel.check()?;

    load_charts(backend, display, options.concurrent_charts)?;
    cancel.check()?;

    render_segment_table(
        display,
        &details,
        &options.number_format,
        &options.segment_label_prefix,
    );

    Ok(CycleReport {
        overview,
        segments: details.len(),
    })
}

// ---------------------------------------------------------------------------
// Cycle steps
// ---------------------------------------------------------------------------

/// Fetch and parse the segment details.
pub fn load_segment_details<B: Backend + ?Sized>(backend: &B) -> Result<SegmentDetails, FetchError> {
    backend.segment_details()
}

/// Write the four overview values into their slots.
pub fn render_overview<D: DisplayTarget + ?Sized>(
    display: &mut D,
    overview: &Overview,
    fmt: &NumberFormat,
) {
    display.set_text(Slot::TotalClients, &fmt.number(overview.total_clients as f64));
    display.set_text(Slot::TotalSegments, &overview.total_segments.to_string());
    display.set_text(Slot::AvgAge, &fmt.number_or_placeholder(overview.average_age));
    display.set_text(
        Slot::AvgConsumption,
        &fmt.currency_or_placeholder(overview.average_consumption),
    );
}

/// Fetch all three charts and render them.
///
/// All-or-nothing: nothing is plotted unless every chart arrived.
pub fn load_charts<B, D>(backend: &B, display: &mut D, concurrent: bool) -> Result<(), FetchError>
where
    B: Backend + ?Sized,
    D: DisplayTarget + ?Sized,
{
    let charts = fetch_charts(backend, concurrent)?;
    for (kind, chart) in &charts {
        display.plot(*kind, chart);
    }
    Ok(())
}

/// Fetch the three chart payloads, in parallel when `concurrent` is set.
pub fn fetch_charts<B: Backend + ?Sized>(
    backend: &B,
    concurrent: bool,
) -> Result<Vec<(ChartKind, ChartPayload)>, FetchError> {
    if !concurrent {
        return ChartKind::ALL
            .iter()
            .map(|&kind| backend.chart(kind).map(|chart| (kind, chart)))
            .collect();
    }

    std::thread::scope(|scope| {
        let pending: Vec<_> = ChartKind::ALL
            .iter()
            .map(|&kind| (kind, scope.spawn(move || backend.chart(kind))))
            .collect();

        pending
            .into_iter()
            .map(|(kind, handle)| -> Result<(ChartKind, ChartPayload), FetchError> {
                let chart = handle.join().map_err(|_| {
                    FetchError::network(&kind.to_string(), "chart request panicked")
                })??;
                Ok((kind, chart))
            })
            .collect()
    })
}

/// Build the table rows for a set of segment details, in mapping order.
pub fn segment_rows(details: &SegmentDetails, fmt: &NumberFormat, label_prefix: &str) -> Vec<SegmentRow> {
    details
        .iter()
        .map(|(id, segment)| SegmentRow {
            segment: segment_label(label_prefix, id),
            members: format!(
                "{} ({}%)",
                fmt.number(segment.size as f64),
                format::percentage(segment.percentage)
            ),
            mean_age: fmt.number(segment.mean_values.age),
            mean_consumption: fmt.currency(segment.mean_values.montant_consommation),
            reduction: format!(
                "{}% de réduction",
                format::ratio_as_percent(segment.offer.reduction)
            ),
            services: segment.offer.services_additionnels.join(", "),
        })
        .collect()
}

/// Clear the table and add one row per segment.
pub fn render_segment_table<D: DisplayTarget + ?Sized>(
    display: &mut D,
    details: &SegmentDetails,
    fmt: &NumberFormat,
    label_prefix: &str,
) {
    display.replace_table(&segment_rows(details, fmt, label_prefix));
}

/// `Segment 3`, or the bare id when the prefix is empty.
pub fn segment_label(prefix: &str, id: &str) -> String {
    if prefix.is_empty() {
        id.to_string()
    } else {
        format!("{prefix} {id}")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{DisplayEvent, MemoryDisplay};

    const DETAILS: &str = r#"{
        "A": {"size": 100, "percentage": 50.0,
              "mean_values": {"age": 40, "montant_consommation": 200},
              "offer": {"reduction": 0.1, "services_additionnels": ["x", "y"]}},
        "B": {"size": 100, "percentage": 50.0,
              "mean_values": {"age": 60, "montant_consommation": 400},
              "offer": {"reduction": 0.2, "services_additionnels": ["z"]}}
    }"#;

    struct FakeBackend {
        details: Result<SegmentDetails, FetchError>,
        failing_chart: Option<ChartKind>,
    }

    impl FakeBackend {
        fn ok() -> Self {
            Self {
                details: Ok(SegmentDetails::from_json(DETAILS).unwrap()),
                failing_chart: None,
            }
        }
    }

    impl Backend for FakeBackend {
        fn segment_details(&self) -> Result<SegmentDetails, FetchError> {
            self.details.clone()
        }

        fn chart(&self, kind: ChartKind) -> Result<ChartPayload, FetchError> {
            if self.failing_chart == Some(kind) {
                return Err(FetchError::network(kind.region(), "connection reset"));
            }
            Ok(serde_json::from_value(serde_json::json!({
                "data": [{"type": "bar"}],
                "layout": {"title": kind.heading()}
            }))
            .unwrap())
        }
    }

    #[test]
    fn successful_cycle_renders_everything() {
        let mut dashboard = Dashboard::new(FakeBackend::ok(), MemoryDisplay::new());
        let outcome = dashboard.refresh();
        assert!(outcome.is_success());
        assert_eq!(outcome.trigger, Trigger::Manual);

        let state = dashboard.display().state();
        assert!(!state.loading);
        assert_eq!(state.slot(Slot::TotalClients), Some("200"));
        assert_eq!(state.slot(Slot::TotalSegments), Some("2"));
        assert_eq!(state.slot(Slot::AvgAge), Some("50"));
        assert_eq!(state.slot(Slot::AvgConsumption), Some("300,000\u{a0}TND"));
        assert_eq!(state.charts.len(), 3);
        assert_eq!(state.table.len(), 2);
        assert!(state.alerts.is_empty());
    }

    #[test]
    fn rows_follow_mapping_order() {
        let details = SegmentDetails::from_json(DETAILS).unwrap();
        let rows = segment_rows(&details, &NumberFormat::default(), "Segment");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].segment, "Segment A");
        assert_eq!(rows[0].members, "100 (50.0%)");
        assert_eq!(rows[0].mean_age, "40");
        assert_eq!(rows[0].mean_consumption, "200,000\u{a0}TND");
        assert_eq!(rows[0].reduction, "10% de réduction");
        assert_eq!(rows[0].services, "x, y");
        assert_eq!(rows[1].segment, "Segment B");
        assert_eq!(rows[1].services, "z");
    }

    #[test]
    fn details_failure_aborts_cycle() {
        let backend = FakeBackend {
            details: Err(FetchError::malformed("/api/segment_details", "expected value")),
            failing_chart: None,
        };
        let mut dashboard = Dashboard::new(backend, MemoryDisplay::new());
        let outcome = dashboard.refresh();

        assert_eq!(outcome.result.as_ref().unwrap_err().kind(), "malformed");
        let display = dashboard.display();
        assert!(!display.state().loading);
        assert!(display.state().slots.is_empty());
        assert_eq!(display.state().alerts, vec![ALERT_MESSAGE.to_string()]);
    }

    #[test]
    fn chart_failure_renders_no_chart() {
        for failing in ChartKind::ALL {
            for concurrent in [true, false] {
                let backend = FakeBackend {
                    failing_chart: Some(failing),
                    ..FakeBackend::ok()
                };
                let options = DashboardOptions {
                    concurrent_charts: concurrent,
                    ..DashboardOptions::default()
                };
                let mut dashboard =
                    Dashboard::new(backend, MemoryDisplay::new()).with_options(options);
                let outcome = dashboard.refresh();

                let err = outcome.result.unwrap_err();
                assert_eq!(err.kind(), "network", "{failing:?}");
                let display = dashboard.display();
                assert!(!display.state().loading);
                assert!(display.state().charts.is_empty(), "{failing:?} concurrent={concurrent}");
                assert!(display.state().table.is_empty());
                let alerts = display
                    .events()
                    .iter()
                    .filter(|e| matches!(e, DisplayEvent::Alert(_)))
                    .count();
                assert_eq!(alerts, 1);
                // The overview rendered before the failure stays visible.
                assert_eq!(display.state().slot(Slot::TotalClients), Some("200"));
            }
        }
    }

    #[test]
    fn cancelled_cycle_shows_no_alert() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut dashboard = Dashboard::new(FakeBackend::ok(), MemoryDisplay::new());
        let outcome = dashboard.run_cycle(Trigger::Timer, &cancel);

        assert_eq!(outcome.result.unwrap_err(), CycleError::Cancelled);
        let display = dashboard.display();
        assert!(!display.state().loading);
        assert!(display.state().alerts.is_empty());
        assert_eq!(
            display.events(),
            &[DisplayEvent::Loading(true), DisplayEvent::Loading(false)]
        );
    }

    #[test]
    fn empty_details_render_placeholders() {
        let backend = FakeBackend {
            details: Ok(SegmentDetails::new()),
            failing_chart: None,
        };
        let mut dashboard = Dashboard::new(backend, MemoryDisplay::new());
        assert!(dashboard.refresh().is_success());

        let state = dashboard.display().state();
        assert_eq!(state.slot(Slot::TotalClients), Some("0"));
        assert_eq!(state.slot(Slot::TotalSegments), Some("0"));
        assert_eq!(state.slot(Slot::AvgAge), Some(format::PLACEHOLDER));
        assert_eq!(state.slot(Slot::AvgConsumption), Some(format::PLACEHOLDER));
        assert!(state.table.is_empty());
    }

    #[test]
    fn segment_label_without_prefix() {
        assert_eq!(segment_label("", "3"), "3");
        assert_eq!(segment_label("Groupe", "3"), "Groupe 3");
    }

    #[test]
    fn fetch_charts_keeps_kind_order() {
        let charts = fetch_charts(&FakeBackend::ok(), true).unwrap();
        let kinds: Vec<ChartKind> = charts.iter().map(|(k, _)| *k).collect();
        assert_eq!(kinds, ChartKind::ALL.to_vec());
    }
}
