//! Output surfaces for the dashboard.
//!
//! The controller never writes to a concrete screen. It addresses a
//! [`DisplayTarget`]: a loading indicator, four overview [`Slot`]s, three
//! chart regions, one table and an alert channel. Implementations:
//!
//! - [`MemoryDisplay`] — keeps state and an event history
//! - [`SharedDisplay`] — `MemoryDisplay` behind `Arc<Mutex<_>>` for the web server
//! - [`TerminalDisplay`] — colored redraw on stdout after each cycle
//! - [`HtmlDisplay`] — writes a Plotly page to disk after each cycle
//!
//! A tuple `(A, B)` of targets fans every call out to both; `None` ignores
//! every call.

mod html;
mod memory;
mod terminal;

use std::ops::{Deref, DerefMut};

use serde::Serialize;

use crate::model::{ChartKind, ChartPayload};

pub use html::{HtmlDisplay, PageOptions, render_page};
pub use memory::{DisplayEvent, DisplayState, MemoryDisplay, SharedDisplay};
pub use terminal::{TerminalDisplay, render_text};

// ---------------------------------------------------------------------------
// Slots and rows
// ---------------------------------------------------------------------------

/// The four overview cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Slot {
    TotalClients,
    TotalSegments,
    AvgAge,
    AvgConsumption,
}

impl Slot {
    pub const ALL: [Slot; 4] = [
        Slot::TotalClients,
        Slot::TotalSegments,
        Slot::AvgAge,
        Slot::AvgConsumption,
    ];

    /// Element id of the slot on the HTML page.
    pub fn id(self) -> &'static str {
        match self {
            Self::TotalClients => "total-clients",
            Self::TotalSegments => "total-segments",
            Self::AvgAge => "avg-age",
            Self::AvgConsumption => "avg-consumption",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::TotalClients => "Total Clients",
            Self::TotalSegments => "Nombre de Segments",
            Self::AvgAge => "Âge Moyen",
            Self::AvgConsumption => "Consommation Moyenne",
        }
    }
}

/// One preformatted row of the segment details table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentRow {
    /// `Segment <id>`
    pub segment: String,
    /// `<size> (<pct>%)`
    pub members: String,
    pub mean_age: String,
    pub mean_consumption: String,
    /// `<n>% de réduction`
    pub reduction: String,
    /// Services joined with `, `.
    pub services: String,
}

// ---------------------------------------------------------------------------
// DisplayTarget
// ---------------------------------------------------------------------------

/// A set of addressable output slots.
///
/// Calls are infallible from the controller's point of view. Targets that
/// perform I/O report their own failures.
pub trait DisplayTarget: Send {
    fn set_loading(&mut self, visible: bool);

    fn set_text(&mut self, slot: Slot, text: &str);

    /// Draw a chart into its region, replacing what was there.
    fn plot(&mut self, kind: ChartKind, chart: &ChartPayload);

    /// Clear the table and fill it with `rows`.
    fn replace_table(&mut self, rows: &[SegmentRow]);

    /// Show a user-visible alert.
    fn alert(&mut self, message: &str);
}

impl<D: DisplayTarget + ?Sized> DisplayTarget for Box<D> {
    fn set_loading(&mut self, visible: bool) {
        (**self).set_loading(visible)
    }

    fn set_text(&mut self, slot: Slot, text: &str) {
        (**self).set_text(slot, text)
    }

    fn plot(&mut self, kind: ChartKind, chart: &ChartPayload) {
        (**self).plot(kind, chart)
    }

    fn replace_table(&mut self, rows: &[SegmentRow]) {
        (**self).replace_table(rows)
    }

    fn alert(&mut self, message: &str) {
        (**self).alert(message)
    }
}

impl<A: DisplayTarget, B: DisplayTarget> DisplayTarget for (A, B) {
    fn set_loading(&mut self, visible: bool) {
        self.0.set_loading(visible);
        self.1.set_loading(visible);
    }

    fn set_text(&mut self, slot: Slot, text: &str) {
        self.0.set_text(slot, text);
        self.1.set_text(slot, text);
    }

    fn plot(&mut self, kind: ChartKind, chart: &ChartPayload) {
        self.0.plot(kind, chart);
        self.1.plot(kind, chart);
    }

    fn replace_table(&mut self, rows: &[SegmentRow]) {
        self.0.replace_table(rows);
        self.1.replace_table(rows);
    }

    fn alert(&mut self, message: &str) {
        self.0.alert(message);
        self.1.alert(message);
    }
}

impl<D: DisplayTarget> DisplayTarget for Option<D> {
    fn set_loading(&mut self, visible: bool) {
        if let Some(display) = self {
            display.set_loading(visible);
        }
    }

    fn set_text(&mut self, slot: Slot, text: &str) {
        if let Some(display) = self {
            display.set_text(slot, text);
        }
    }

    fn plot(&mut self, kind: ChartKind, chart: &ChartPayload) {
        if let Some(display) = self {
            display.plot(kind, chart);
        }
    }

    fn replace_table(&mut self, rows: &[SegmentRow]) {
        if let Some(display) = self {
            display.replace_table(rows);
        }
    }

    fn alert(&mut self, message: &str) {
        if let Some(display) = self {
            display.alert(message);
        }
    }
}

// ---------------------------------------------------------------------------
// Loading guard
// ---------------------------------------------------------------------------

/// Shows the loading indicator while alive and hides it on drop.
///
/// Dereferences to the wrapped display, so the whole cycle renders through
/// the guard and every exit path (including `?` and panics) clears the
/// indicator.
pub struct LoadingGuard<'a, D: DisplayTarget + ?Sized> {
    display: &'a mut D,
}

impl<'a, D: DisplayTarget + ?Sized> LoadingGuard<'a, D> {
    pub fn new(display: &'a mut D) -> Self {
        display.set_loading(true);
        Self { display }
    }
}

impl<D: DisplayTarget + ?Sized> Deref for LoadingGuard<'_, D> {
    type Target = D;

    fn deref(&self) -> &D {
        self.display
    }
}

impl<D: DisplayTarget + ?Sized> DerefMut for LoadingGuard<'_, D> {
    fn deref_mut(&mut self) -> &mut D {
        self.display
    }
}

impl<D: DisplayTarget + ?Sized> Drop for LoadingGuard<'_, D> {
    fn drop(&mut self) {
        self.display.set_loading(false);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
