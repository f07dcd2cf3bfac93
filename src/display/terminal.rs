use std::io::{self, Stdout, Write};

use colored::Colorize;

use super::{DisplayState, DisplayTarget, MemoryDisplay, SegmentRow, Slot};
use crate::format::PLACEHOLDER;
use crate::model::{ChartKind, ChartPayload};

/// Redraws the whole dashboard on a terminal each time loading ends.
pub struct TerminalDisplay<W: Write + Send = Stdout> {
    memory: MemoryDisplay,
    out: W,
}

impl TerminalDisplay<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> TerminalDisplay<W> {
    pub fn new(out: W) -> Self {
        Self {
            memory: MemoryDisplay::new(),
            out,
        }
    }

    pub fn state(&self) -> &DisplayState {
        self.memory.state()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> DisplayTarget for TerminalDisplay<W> {
    fn set_loading(&mut self, visible: bool) {
        self.memory.set_loading(visible);
        let result = if visible {
            writeln!(self.out, "{}", "⟳ Chargement des données…".dimmed())
        } else {
            render_text(self.memory.state(), &mut self.out)
        };
        if let Err(e) = result.and_then(|_| self.out.flush()) {
            eprintln!("[segdash] terminal write failed: {e}");
        }
    }

    fn set_text(&mut self, slot: Slot, text: &str) {
        self.memory.set_text(slot, text);
    }

    fn plot(&mut self, kind: ChartKind, chart: &ChartPayload) {
        self.memory.plot(kind, chart);
    }

    fn replace_table(&mut self, rows: &[SegmentRow]) {
        self.memory.replace_table(rows);
    }

    fn alert(&mut self, message: &str) {
        self.memory.alert(message);
        let _ = writeln!(self.out, "{} {}", "✗".red().bold(), message.red());
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Write a text rendering of the dashboard state.
pub fn render_text<W: Write + ?Sized>(state: &DisplayState, out: &mut W) -> io::Result<()> {
    writeln!(out)?;
    writeln!(
        out,
        "{}",
        "Segmentation Clients — Tableau de Bord".bold().cyan()
    )?;
    writeln!(out, "{}", "=".repeat(60))?;

    if state.slots.is_empty() && state.table.is_empty() && state.charts.is_empty() {
        writeln!(out, "{}", "Aucune donnée pour le moment.".yellow())?;
        return Ok(());
    }

    // Overview cards
    for slot in Slot::ALL {
        let value = state.slot(slot).unwrap_or(PLACEHOLDER);
        writeln!(out, "  {:<24} {}", format!("{}:", slot.label()).bold(), value)?;
    }
    writeln!(out)?;

    // Charts
    writeln!(out, "{}", "Graphiques".bold().cyan())?;
    for kind in ChartKind::ALL {
        match state.chart(kind) {
            Some(chart) => writeln!(
                out,
                "  {:<40} {} ({} séries)",
                kind.heading(),
                chart.title().unwrap_or(PLACEHOLDER),
                chart.trace_count()
            )?,
            None => writeln!(out, "  {:<40} {}", kind.heading(), PLACEHOLDER.dimmed())?,
        }
    }
    writeln!(out)?;

    // Segment table
    writeln!(out, "{}", "Détails des Segments".bold().cyan())?;
    writeln!(
        out,
        "  {:<14} {:>16} {:>6} {:>18}  Offre",
        "Segment", "Clients", "Âge", "Consommation"
    )?;
    writeln!(out, "  {}", "-".repeat(78))?;
    for (i, row) in state.table.iter().enumerate() {
        let line = format!(
            "  {:<14} {:>16} {:>6} {:>18}  {}",
            row.segment, row.members, row.mean_age, row.mean_consumption, row.reduction
        );
        if i % 2 == 0 {
            writeln!(out, "{line}")?;
        } else {
            writeln!(out, "{}", line.dimmed())?;
        }
        if !row.services.is_empty() {
            writeln!(out, "  {:<58}  {}", "", row.services.dimmed())?;
        }
    }

    if let Some(updated) = state.updated_at {
        writeln!(out)?;
        writeln!(
            out,
            "{}",
            format!(
                "Mis à jour à {}",
                updated.with_timezone(&chrono::Local).format("%H:%M:%S")
            )
            .dimmed()
        )?;
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
