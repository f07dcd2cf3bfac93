//! Static HTML rendering of the dashboard.
//!
//! Charts are drawn client-side by Plotly from the untouched payloads; every
//! other value is already formatted and only needs escaping.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use super::{DisplayState, DisplayTarget, MemoryDisplay, SegmentRow, Slot};
use crate::format::PLACEHOLDER;
use crate::model::{ChartKind, ChartPayload};

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

/// Page-level rendering options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageOptions {
    pub title: String,
    /// Adds a `<meta http-equiv="refresh">` with this period.
    pub auto_reload_secs: Option<u64>,
    /// When set, a button `POST`s here to request an immediate refresh.
    pub refresh_endpoint: Option<String>,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            title: "Segmentation Clients".to_string(),
            auto_reload_secs: None,
            refresh_endpoint: None,
        }
    }
}

/// Writes the dashboard page to a file each time loading ends.
pub struct HtmlDisplay {
    memory: MemoryDisplay,
    path: PathBuf,
    options: PageOptions,
}

impl HtmlDisplay {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_options(path, PageOptions::default())
    }

    pub fn with_options(path: impl Into<PathBuf>, options: PageOptions) -> Self {
        Self {
            memory: MemoryDisplay::new(),
            path: path.into(),
            options,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> &DisplayState {
        self.memory.state()
    }

    fn write_page(&self) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, render_page(self.memory.state(), &self.options))
    }
}

impl DisplayTarget for HtmlDisplay {
    fn set_loading(&mut self, visible: bool) {
        self.memory.set_loading(visible);
        if !visible && let Err(e) = self.write_page() {
            eprintln!(
                "[segdash] failed to write dashboard to {}: {e}",
                self.path.display()
            );
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
    }
}

// ---------------------------------------------------------------------------
// Page rendering
// ---------------------------------------------------------------------------

/// Render a complete HTML document for the given state.
pub fn render_page(state: &DisplayState, options: &PageOptions) -> String {
    let mut html = String::with_capacity(8 * 1024);
    let title = escape_html(&options.title);

    html.push_str("<!DOCTYPE html>\n<html lang=\"fr\">\n<head>\n<meta charset=\"utf-8\">\n");
    if let Some(secs) = options.auto_reload_secs {
        let _ = writeln!(html, "<meta http-equiv=\"refresh\" content=\"{secs}\">");
    }
    let _ = writeln!(html, "<title>{title}</title>");
    let _ = writeln!(html, "<script src=\"{PLOTLY_CDN}\"></script>");
    html.push_str(STYLE);
    html.push_str("</head>\n<body>\n");

    let _ = writeln!(html, "<header><h1>{title}</h1>");
    if state.loading {
        html.push_str("<span id=\"loading\">Chargement…</span>");
    } else {
        html.push_str("<span id=\"loading\" class=\"d-none\"></span>");
    }
    if let Some(endpoint) = &options.refresh_endpoint {
        let _ = write!(
            html,
            "<button onclick=\"fetch('{}', {{method: 'POST'}}).then(() => setTimeout(() => location.reload(), 1500))\">Actualiser</button>",
            escape_html(endpoint)
        );
    }
    html.push_str("</header>\n");

    if let Some(message) = &state.active_alert {
        let _ = writeln!(html, "<div class=\"alert\">{}</div>", escape_html(message));
    }

    // Overview cards
    html.push_str("<section class=\"cards\">\n");
    for slot in Slot::ALL {
        let value = state.slot(slot).unwrap_or(PLACEHOLDER);
        let _ = writeln!(
            html,
            "<div class=\"card\"><h2>{}</h2><p id=\"{}\">{}</p></div>",
            escape_html(slot.label()),
            slot.id(),
            escape_html(value)
        );
    }
    html.push_str("</section>\n");

    // Charts
    html.push_str("<section class=\"charts\">\n");
    for kind in ChartKind::ALL {
        let _ = writeln!(
            html,
            "<div class=\"chart\"><h2>{}</h2><div id=\"{}\"></div></div>",
            escape_html(kind.heading()),
            kind.region()
        );
    }
    html.push_str("</section>\n");

    // Segment table
    html.push_str(
        "<table id=\"segment-details\">\n<thead><tr><th>Segment</th><th>Clients</th><th>Âge Moyen</th><th>Consommation Moyenne</th><th>Offre</th></tr></thead>\n<tbody>\n",
    );
    for row in &state.table {
        let _ = writeln!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td><strong>{}</strong><br><small>{}</small></td></tr>",
            escape_html(&row.segment),
            escape_html(&row.members),
            escape_html(&row.mean_age),
            escape_html(&row.mean_consumption),
            escape_html(&row.reduction),
            escape_html(&row.services)
        );
    }
    html.push_str("</tbody>\n</table>\n");

    if let Some(updated) = state.updated_at {
        let _ = writeln!(
            html,
            "<footer>Mis à jour : {}</footer>",
            updated.with_timezone(&chrono::Local).format("%d/%m/%Y %H:%M:%S")
        );
    }

    // Plot calls
    html.push_str("<script>\n");
    for (kind, chart) in &state.charts {
        let _ = writeln!(
            html,
            "Plotly.newPlot('{}', {}, {});",
            kind.region(),
            script_json(&chart.data),
            script_json(&chart.layout)
        );
    }
    html.push_str("</script>\n</body>\n</html>\n");

    html
}

/// Escape text for HTML element content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Serialize a value for embedding inside a `<script>` element.
fn script_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|_| "null".to_string())
        .replace("</", "<\\/")
}

const STYLE: &str = r#"<style>
body { font-family: system-ui, sans-serif; margin: 0 2rem 2rem; color: #1f2933; }
header { display: flex; align-items: center; gap: 1rem; }
#loading { color: #616e7c; }
.d-none { display: none; }
.alert { background: #fde8e8; color: #9b1c1c; padding: .75rem 1rem; border-radius: 6px; }
.cards { display: grid; grid-template-columns: repeat(4, 1fr); gap: 1rem; margin: 1rem 0; }
.card { background: #f5f7fa; border-radius: 8px; padding: 1rem; }
.card h2 { font-size: .9rem; margin: 0; color: #616e7c; }
.card p { font-size: 1.6rem; margin: .25rem 0 0; font-weight: 600; }
.charts { display: grid; grid-template-columns: 1fr 1fr; gap: 1rem; }
.chart h2 { font-size: 1rem; }
table { width: 100%; border-collapse: collapse; margin-top: 1.5rem; }
th, td { text-align: left; padding: .5rem; border-bottom: 1px solid #e4e7eb; }
small { color: #616e7c; }
footer { margin-top: 1rem; color: #9aa5b1; font-size: .8rem; }
</style>
"#;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
