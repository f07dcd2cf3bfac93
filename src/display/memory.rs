use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{DisplayTarget, SegmentRow, Slot};
use crate::model::{ChartKind, ChartPayload};

/// Events kept for inspection; older ones are dropped.
const EVENT_HISTORY: usize = 256;

/// Alerts kept in [`DisplayState::alerts`].
const ALERT_HISTORY: usize = 20;

/// Everything currently visible on the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DisplayState {
    pub loading: bool,
    pub slots: BTreeMap<Slot, String>,
    pub charts: BTreeMap<ChartKind, ChartPayload>,
    pub table: Vec<SegmentRow>,
    /// Alert raised by the current cycle; cleared when the next one starts.
    pub active_alert: Option<String>,
    /// Most recent alerts, oldest first.
    pub alerts: Vec<String>,
    /// When the loading indicator was last cleared.
    pub updated_at: Option<DateTime<Utc>>,
}

impl DisplayState {
    pub fn slot(&self, slot: Slot) -> Option<&str> {
        self.slots.get(&slot).map(String::as_str)
    }

    pub fn chart(&self, kind: ChartKind) -> Option<&ChartPayload> {
        self.charts.get(&kind)
    }

    fn apply_loading(&mut self, visible: bool) {
        self.loading = visible;
        if visible {
            self.active_alert = None;
        } else {
            self.updated_at = Some(Utc::now());
        }
    }

    fn apply_alert(&mut self, message: &str) {
        self.active_alert = Some(message.to_string());
        self.alerts.push(message.to_string());
        if self.alerts.len() > ALERT_HISTORY {
            let excess = self.alerts.len() - ALERT_HISTORY;
            self.alerts.drain(..excess);
        }
    }
}

/// One call received by a [`MemoryDisplay`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayEvent {
    Loading(bool),
    Text(Slot, String),
    Plot(ChartKind),
    /// Table replaced; carries the row count.
    Table(usize),
    Alert(String),
}

/// In-memory display target.
#[derive(Debug, Clone, Default)]
pub struct MemoryDisplay {
    state: DisplayState,
    events: Vec<DisplayEvent>,
}

impl MemoryDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DisplayState {
        &self.state
    }

    pub fn events(&self) -> &[DisplayEvent] {
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    fn record(&mut self, event: DisplayEvent) {
        self.events.push(event);
        if self.events.len() > EVENT_HISTORY {
            let excess = self.events.len() - EVENT_HISTORY;
            self.events.drain(..excess);
        }
    }
}

impl DisplayTarget for MemoryDisplay {
    fn set_loading(&mut self, visible: bool) {
        self.state.apply_loading(visible);
        self.record(DisplayEvent::Loading(visible));
    }

    fn set_text(&mut self, slot: Slot, text: &str) {
        self.state.slots.insert(slot, text.to_string());
        self.record(DisplayEvent::Text(slot, text.to_string()));
    }

    fn plot(&mut self, kind: ChartKind, chart: &ChartPayload) {
        self.state.charts.insert(kind, chart.clone());
        self.record(DisplayEvent::Plot(kind));
    }

    fn replace_table(&mut self, rows: &[SegmentRow]) {
        self.state.table = rows.to_vec();
        self.record(DisplayEvent::Table(rows.len()));
    }

    fn alert(&mut self, message: &str) {
        self.state.apply_alert(message);
        self.record(DisplayEvent::Alert(message.to_string()));
    }
}

// ---------------------------------------------------------------------------
// SharedDisplay
// ---------------------------------------------------------------------------

/// Cloneable handle to a [`MemoryDisplay`] shared between the refresh worker
/// and readers such as the web server.
#[derive(Debug, Clone, Default)]
pub struct SharedDisplay {
    inner: Arc<Mutex<MemoryDisplay>>,
}

impl SharedDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> DisplayState {
        self.lock().state.clone()
    }

    pub fn events(&self) -> Vec<DisplayEvent> {
        self.lock().events.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryDisplay> {
        // A panicking writer leaves the display in a readable state.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl DisplayTarget for SharedDisplay {
    fn set_loading(&mut self, visible: bool) {
        self.lock().set_loading(visible);
    }

    fn set_text(&mut self, slot: Slot, text: &str) {
        self.lock().set_text(slot, text);
    }

    fn plot(&mut self, kind: ChartKind, chart: &ChartPayload) {
        self.lock().plot(kind, chart);
    }

    fn replace_table(&mut self, rows: &[SegmentRow]) {
        self.lock().replace_table(rows);
    }

    fn alert(&mut self, message: &str) {
        self.lock().alert(message);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
