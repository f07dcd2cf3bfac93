//! CLI command implementations for segdash.
//!
//! Provides subcommand handlers for:
//! - `segdash refresh` — one refresh cycle, printed or written as HTML
//! - `segdash watch` — periodic refresh in the terminal
//! - `segdash serve` — local web preview
//! - `segdash report` — Markdown reports from the current segments
//! - `segdash history` — refresh log statistics and trends
//! - `segdash health` — check config, backend endpoints, refresh log
//! - `segdash config show|init|set|reset` — configuration management

use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use colored::Colorize;

use crate::api::{Backend, HttpBackend};
use crate::config::{self, DashboardConfig};
use crate::controller::{CycleOutcome, Dashboard};
use crate::display::{DisplayState, HtmlDisplay, MemoryDisplay, SegmentRow, TerminalDisplay};
use crate::format::group_digits;
use crate::history::logger::{CycleLogEntry, RefreshLog};
use crate::history::reporter::{self, HistoryStats, TrendEntry};
use crate::model::ChartKind;
use crate::report::{self, ReportKind};
use crate::scheduler;
use crate::web;

/// Output format for commands that print data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl OutputFormat {
    pub fn from_str_opt(s: Option<&str>) -> Self {
        match s {
            Some("json") => Self::Json,
            Some("csv") => Self::Csv,
            _ => Self::Table,
        }
    }
}

/// `--html` if given, otherwise `display.html_output` from the config.
fn html_target(html: Option<PathBuf>, cfg: &DashboardConfig) -> Option<HtmlDisplay> {
    html.or_else(|| cfg.display.html_output_path())
        .map(HtmlDisplay::new)
}

// ---------------------------------------------------------------------------
// segdash refresh
// ---------------------------------------------------------------------------

/// Run a single refresh cycle.
pub fn run_refresh(format: OutputFormat, html: Option<PathBuf>) -> Result<()> {
    let cfg = config::load();
    let backend = HttpBackend::from_config(&cfg.backend);
    let html = html_target(html, &cfg);
    let html_path = html.as_ref().map(|h| h.path().to_path_buf());

    let outcome = match format {
        OutputFormat::Json => {
            let mut dashboard = Dashboard::from_config(backend, (MemoryDisplay::new(), html), &cfg);
            let outcome = dashboard.refresh();
            print_refresh_json(&outcome, dashboard.display().0.state())?;
            outcome
        }
        OutputFormat::Csv => {
            let mut dashboard = Dashboard::from_config(backend, (MemoryDisplay::new(), html), &cfg);
            let outcome = dashboard.refresh();
            if outcome.is_success() {
                print!("{}", segment_table_csv(&dashboard.display().0.state().table));
            }
            outcome
        }
        OutputFormat::Table => {
            let mut dashboard =
                Dashboard::from_config(backend, (TerminalDisplay::stdout(), html), &cfg);
            dashboard.refresh()
        }
    };

    if let Some(path) = html_path {
        eprintln!("{} Dashboard written to {}", "✓".green().bold(), path.display());
    }

    match outcome.result {
        Ok(_) => Ok(()),
        Err(e) => bail!("refresh failed: {e}"),
    }
}

fn print_refresh_json(outcome: &CycleOutcome, state: &DisplayState) -> Result<()> {
    let value = serde_json::json!({
        "outcome": CycleLogEntry::from_outcome(outcome),
        "slots": state.slots,
        "charts": state.charts.keys().collect::<Vec<&ChartKind>>(),
        "table": state.table,
        "alerts": state.alerts,
    });
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

/// Segment table as CSV, one line per row plus a header.
fn segment_table_csv(rows: &[SegmentRow]) -> String {
    let mut out = String::from("segment,members,mean_age,mean_consumption,reduction,services\n");
    for row in rows {
        let fields = [
            &row.segment,
            &row.members,
            &row.mean_age,
            &row.mean_consumption,
            &row.reduction,
            &row.services,
        ];
        let line: Vec<String> = fields.iter().map(|f| csv_field(f)).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

/// Quote a field when it contains a separator, quote or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

// ---------------------------------------------------------------------------
// segdash watch
// ---------------------------------------------------------------------------

/// Refresh periodically until `q` is entered.
///
/// `r` (or an empty line) requests an immediate cycle. When stdin is closed
/// the schedule keeps running until the process is killed.
pub fn run_watch(interval_secs: Option<u64>, html: Option<PathBuf>) -> Result<()> {
    let cfg = config::load();
    let interval = Duration::from_secs(interval_secs.unwrap_or(cfg.refresh.interval_secs).max(1));
    let backend = HttpBackend::from_config(&cfg.backend);
    let display = (TerminalDisplay::stdout(), html_target(html, &cfg));
    let handle = scheduler::start(Dashboard::from_config(backend, display, &cfg), interval);

    eprintln!(
        "{}",
        format!(
            "Refreshing every {}s from {} — r + Enter: refresh now, q + Enter: quit",
            interval.as_secs(),
            cfg.backend.base_url
        )
        .dimmed()
    );

    for line in io::stdin().lock().lines() {
        let line = line.context("failed to read stdin")?;
        match line.trim() {
            "q" | "quit" => return handle.stop().map(|_| ()),
            "r" | "" => {
                if !handle.trigger() {
                    bail!("refresh worker stopped unexpectedly");
                }
            }
            other => eprintln!("{} unknown command: {other}", "?".yellow()),
        }
    }

    handle.join().map(|_| ())
}

// ---------------------------------------------------------------------------
// segdash serve
// ---------------------------------------------------------------------------

pub fn run_serve(addr: Option<String>) -> Result<()> {
    let cfg = config::load();
    let addr = addr.unwrap_or_else(|| cfg.web.addr.clone());
    web::serve(&addr, &cfg)
}

// ---------------------------------------------------------------------------
// segdash report
// ---------------------------------------------------------------------------

/// Fetch segment details and render a Markdown report.
pub fn run_report(kind: ReportKind, output: Option<PathBuf>) -> Result<()> {
    let cfg = config::load();
    let backend = HttpBackend::from_config(&cfg.backend);
    let details = backend
        .segment_details()
        .context("failed to load segment details")?;

    let content = report::render(
        kind,
        &details,
        &cfg.display.segment_label_prefix,
        chrono::Local::now().naive_local(),
    );

    match output {
        Some(path) => {
            let path = report_path(&path, kind);
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            fs::write(&path, content)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("{} Report written to {}", "✓".green().bold(), path.display());
        }
        None => print!("{content}"),
    }

    Ok(())
}

/// A directory gets a timestamped file name; anything else is used as is.
fn report_path(path: &Path, kind: ReportKind) -> PathBuf {
    if path.is_dir() {
        path.join(format!(
            "{}_{}.md",
            kind.file_stem(),
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        ))
    } else {
        path.to_path_buf()
    }
}

// ---------------------------------------------------------------------------
// segdash history
// ---------------------------------------------------------------------------

/// Show refresh history statistics.
pub fn run_history(days: Option<u32>, format: OutputFormat) -> Result<()> {
    let cfg = config::load();
    let log = RefreshLog::from_config(&cfg.logging);
    let entries = log.read_since_days(days);

    if entries.is_empty() {
        println!(
            "{}",
            "No refresh history yet. Run `segdash refresh` or `segdash watch` first.".yellow()
        );
        return Ok(());
    }

    let stats = reporter::build_stats(&entries);
    let trends = reporter::compute_trends(&entries);

    match format {
        OutputFormat::Json => print_history_json(&stats, &trends)?,
        OutputFormat::Csv => print_history_csv(&trends),
        OutputFormat::Table => print_history_table(&stats, &trends, days),
    }

    Ok(())
}

fn print_history_table(stats: &HistoryStats, trends: &[TrendEntry], days: Option<u32>) {
    let title = match days {
        Some(d) => format!("segdash Refresh History — Last {d} Days"),
        None => "segdash Refresh History".to_string(),
    };
    println!("{}", title.bold().cyan());
    println!("{}", "=".repeat(60));
    println!();

    println!("  {} {}", "Cycles:       ".bold(), format_number(stats.total_cycles));
    println!(
        "  {} {} ok / {} failed / {} cancelled",
        "Outcomes:     ".bold(),
        stats.successes,
        stats.failures,
        stats.cancelled
    );
    println!("  {} {:.1}%", "Success rate: ".bold(), stats.success_rate());
    println!("  {} {:.0}ms", "Avg duration: ".bold(), stats.avg_duration_ms);
    println!(
        "  {} {}",
        "Last success: ".bold(),
        stats.last_success.as_deref().unwrap_or("never")
    );
    println!();

    if !stats.failures_by_kind.is_empty() {
        println!("{}", "Failures by Kind".bold().cyan());
        for (kind, count) in &stats.failures_by_kind {
            println!("  {:<12} {:>6}", kind, count);
        }
        println!();
    }

    println!("{}", "Daily Trend".bold().cyan());
    println!(
        "  {:<12} {:>8} {:>10} {:>12}",
        "Date", "Cycles", "Failures", "Avg ms"
    );
    println!("  {}", "-".repeat(44));
    for (i, entry) in trends.iter().enumerate() {
        let line = format!(
            "  {:<12} {:>8} {:>10} {:>12.0}",
            entry.date, entry.cycles, entry.failures, entry.avg_duration_ms
        );
        if i % 2 == 0 {
            println!("{line}");
        } else {
            println!("{}", line.dimmed());
        }
    }

    if !stats.recent_failures.is_empty() {
        println!();
        println!("{}", "Recent Failures".bold().cyan());
        for entry in &stats.recent_failures {
            println!(
                "  {} {} {}",
                entry.timestamp.dimmed(),
                entry.error_kind.as_deref().unwrap_or("unknown").red(),
                truncate(entry.error.as_deref().unwrap_or(""), 60)
            );
        }
    }
}

fn print_history_json(stats: &HistoryStats, trends: &[TrendEntry]) -> Result<()> {
    let value = serde_json::json!({
        "stats": stats,
        "success_rate": stats.success_rate(),
        "trends": trends,
    });
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn print_history_csv(trends: &[TrendEntry]) {
    println!("date,cycles,failures,avg_duration_ms");
    for t in trends {
        println!(
            "{},{},{},{:.0}",
            t.date, t.cycles, t.failures, t.avg_duration_ms
        );
    }
}

// ---------------------------------------------------------------------------
// segdash health
// ---------------------------------------------------------------------------

/// Check config files, backend endpoints and the refresh log.
pub fn run_health() -> Result<()> {
    println!("{}", "segdash Health Check".bold().cyan());
    println!("{}", "=".repeat(40));

    // 0. Config file status
    let global_exists = config::global_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    let project_exists = config::project_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    let cfg = config::load();

    print_health_item(
        "Global config",
        global_exists,
        if global_exists {
            "~/.segdash/config.toml found"
        } else {
            "not found (run `segdash config init` to create)"
        },
    );
    print_health_item(
        "Project config",
        project_exists,
        if project_exists {
            ".segdash.toml found"
        } else {
            "none (optional)"
        },
    );

    // 1. Backend endpoints
    let backend = HttpBackend::from_config(&cfg.backend);
    print_health_item("Backend", true, backend.base_url());
    let mut reachable = 0;
    let paths = std::iter::once(("segment details", cfg.backend.endpoints.segment_details.as_str()))
        .chain(ChartKind::ALL.iter().map(|&k| (k.heading(), cfg.backend.endpoints.chart(k))));
    for (name, path) in paths {
        match backend.check(path) {
            Ok(elapsed) => {
                reachable += 1;
                print_health_item(name, true, &format!("{path} ({}ms)", elapsed.as_millis()));
            }
            Err(e) => print_health_item(name, false, &e.to_string()),
        }
    }

    // 2. Refresh settings
    print_health_item(
        "Refresh interval",
        true,
        &format!("{}s", cfg.refresh.interval_secs),
    );

    // 3. Refresh log
    let log = RefreshLog::from_config(&cfg.logging);
    match log.path() {
        Some(path) if path.exists() => {
            let entries = log.read_all();
            let last = entries.last().map(|e| e.outcome.as_str()).unwrap_or("none");
            print_health_item(
                "Refresh log",
                true,
                &format!("{} entries, last: {last}", entries.len()),
            );
        }
        Some(_) => print_health_item("Refresh log", true, "no log file yet"),
        None => print_health_item("Refresh log", false, "disabled"),
    }

    // 4. HTML output
    if let Some(path) = cfg.display.html_output_path() {
        print_health_item("HTML output", true, &path.display().to_string());
    }

    println!();
    if reachable == ChartKind::ALL.len() + 1 {
        println!("  {}", "All endpoints reachable.".green());
    } else {
        println!(
            "  {} Is the segmentation backend running at {}?",
            "Hint:".dimmed(),
            cfg.backend.base_url
        );
    }

    Ok(())
}

fn print_health_item(name: &str, ok: bool, detail: &str) {
    let status = if ok {
        "✓".green().bold()
    } else {
        "✗".red().bold()
    };
    println!("  {} {:<32} {}", status, name, detail.dimmed());
}

// ---------------------------------------------------------------------------
// segdash config show | init | set | reset
// ---------------------------------------------------------------------------

/// Show the effective (merged) configuration as TOML.
pub fn run_config_show() -> Result<()> {
    let toml_str = config::show_effective_config()?;

    println!("{}", "Effective segdash Configuration".bold().cyan());
    println!("{}", "=".repeat(50));
    println!();
    println!("{toml_str}");

    // Show source info
    let global_exists = config::global_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    let project_exists = config::project_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);

    println!("{}", "Sources (highest priority last):".dimmed());
    println!("  {} built-in defaults", "·".dimmed());
    if global_exists {
        println!("  {} {}", "✓".green(), "~/.segdash/config.toml".dimmed());
    } else {
        println!(
            "  {} {}",
            "·".dimmed(),
            "~/.segdash/config.toml (not found)".dimmed()
        );
    }
    if project_exists {
        println!("  {} {}", "✓".green(), ".segdash.toml".dimmed());
    } else {
        println!("  {} {}", "·".dimmed(), ".segdash.toml (not found)".dimmed());
    }
    println!(
        "  {} {}",
        "·".dimmed(),
        "SEGDASH_* environment variables".dimmed()
    );

    Ok(())
}

/// Initialize a default config file at `~/.segdash/config.toml`.
pub fn run_config_init(force: bool) -> Result<()> {
    let path = config::init_config(force)?;
    println!(
        "{} Config written to {}",
        "✓".green().bold(),
        path.display()
    );
    println!(
        "  {}",
        "Edit the file to point segdash at your backend.".dimmed()
    );
    Ok(())
}

/// Set a single configuration value in the global config file.
pub fn run_config_set(key: &str, value: &str) -> Result<()> {
    config::set_config_value(key, value)?;
    println!("{} Set {} = {}", "✓".green().bold(), key.bold(), value);
    Ok(())
}

/// Reset configuration to defaults.
pub fn run_config_reset() -> Result<()> {
    let path = config::reset_config()?;
    println!(
        "{} Config reset to defaults at {}",
        "✓".green().bold(),
        path.display()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn format_number(n: usize) -> String {
    group_digits(&n.to_string(), ',')
}

/// Cut `s` to at most `max` characters, marking the cut with `…`.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
