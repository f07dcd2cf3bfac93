use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};

use segdash::cli;
use segdash::report::ReportKind;

#[derive(Debug, Parser)]
#[command(name = "segdash")]
#[command(about = "Customer segmentation dashboard client")]
#[command(version)]
struct App {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one refresh cycle and print the dashboard
    Refresh {
        /// Output format: table (default), json, csv (segment table only)
        #[arg(long, default_value = "table")]
        format: String,
        /// Also write the dashboard as an HTML page to this path
        #[arg(long)]
        html: Option<PathBuf>,
    },
    /// Refresh periodically in the terminal (r + Enter: refresh now, q + Enter: quit)
    Watch {
        /// Seconds between refreshes (default: refresh.interval_secs)
        #[arg(long)]
        interval: Option<u64>,
        /// Also write the dashboard as an HTML page to this path
        #[arg(long)]
        html: Option<PathBuf>,
    },
    /// Serve a live web preview of the dashboard
    Serve {
        /// Listen address (default: web.addr)
        #[arg(long)]
        addr: Option<String>,
    },
    /// Generate a Markdown report from the current segments
    Report {
        /// Report kind: summary (default), segments, strategy
        #[arg(long, default_value = "summary")]
        kind: String,
        /// Write to this file, or into this directory with a timestamped name
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Show refresh history statistics and trends
    History {
        /// Only include the last N days of data
        #[arg(long)]
        days: Option<u32>,
        /// Output format: table (default), json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Check config, backend endpoints and the refresh log
    Health,
    /// Manage segdash configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Show the effective (merged) configuration
    Show,
    /// Write a default config file to ~/.segdash/config.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Set a single value, e.g. `backend.base_url http://10.0.0.5:5000`
    Set { key: String, value: String },
    /// Reset the global config file to defaults
    Reset,
}

fn main() -> Result<()> {
    let app = App::parse();

    match app.command {
        Commands::Refresh { format, html } => {
            let fmt = cli::OutputFormat::from_str_opt(Some(&format));
            cli::run_refresh(fmt, html)
        }
        Commands::Watch { interval, html } => cli::run_watch(interval, html),
        Commands::Serve { addr } => cli::run_serve(addr),
        Commands::Report { kind, output } => {
            let Some(kind) = ReportKind::from_str_opt(Some(&kind)) else {
                bail!("unknown report kind `{kind}` (expected summary, segments or strategy)");
            };
            cli::run_report(kind, output)
        }
        Commands::History { days, format } => {
            let fmt = cli::OutputFormat::from_str_opt(Some(&format));
            cli::run_history(days, fmt)
        }
        Commands::Health => cli::run_health(),
        Commands::Config { action } => match action {
            ConfigAction::Show => cli::run_config_show(),
            ConfigAction::Init { force } => cli::run_config_init(force),
            ConfigAction::Set { key, value } => cli::run_config_set(&key, &value),
            ConfigAction::Reset => cli::run_config_reset(),
        },
    }
}
