/// Configuration schema and defaults for segdash.
///
/// Defines the TOML-serializable configuration structure with all sections:
/// `[backend]`, `[backend.endpoints]`, `[refresh]`, `[display]`, `[logging]`
/// and `[web]`.
///
/// Every field has a built-in default. Users only need to set the values
/// they want to override.
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::format::NumberFormat;
use crate::model::ChartKind;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level segdash configuration.
///
/// Maps directly to the `~/.segdash/config.toml` and `.segdash.toml` file
/// schemas. Missing sections and fields fall back to built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub backend: BackendConfig,
    pub refresh: RefreshConfig,
    pub display: DisplayConfig,
    pub logging: LoggingConfig,
    pub web: WebConfig,
}

// ---------------------------------------------------------------------------
// [backend]
// ---------------------------------------------------------------------------

/// Where the segmentation API lives and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the segmentation API, without trailing slash.
    pub base_url: String,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    pub endpoints: EndpointsConfig,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            timeout_ms: 10_000,
            endpoints: EndpointsConfig::default(),
        }
    }
}

/// Endpoint paths relative to `backend.base_url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    pub segment_details: String,
    pub cluster_distribution: String,
    pub feature_importance: String,
    pub cluster_profiles: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            segment_details: "/api/segment_details".to_string(),
            cluster_distribution: "/api/cluster_distribution".to_string(),
            feature_importance: "/api/feature_importance".to_string(),
            cluster_profiles: "/api/cluster_profiles".to_string(),
        }
    }
}

impl EndpointsConfig {
    /// Path of the endpoint serving the given chart.
    pub fn chart(&self, kind: ChartKind) -> &str {
        match kind {
            ChartKind::ClusterDistribution => &self.cluster_distribution,
            ChartKind::FeatureImportance => &self.feature_importance,
            ChartKind::ClusterProfiles => &self.cluster_profiles,
        }
    }
}

// ---------------------------------------------------------------------------
// [refresh]
// ---------------------------------------------------------------------------

/// Refresh schedule settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Seconds between scheduled refresh cycles.
    pub interval_secs: u64,
    /// Fetch the three charts in parallel instead of one after another.
    pub concurrent_charts: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            concurrent_charts: true,
        }
    }
}

// ---------------------------------------------------------------------------
// [display]
// ---------------------------------------------------------------------------

/// Rendering settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// ISO 4217 currency code used for consumption amounts.
    pub currency: String,
    /// Prefix for segment labels in the details table (`Segment 3`).
    pub segment_label_prefix: String,
    /// Write an HTML dashboard to this path on every cycle. Empty disables.
    pub html_output: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            currency: "TND".to_string(),
            segment_label_prefix: "Segment".to_string(),
            html_output: String::new(),
        }
    }
}

impl DisplayConfig {
    pub fn number_format(&self) -> NumberFormat {
        NumberFormat::fr_fr(&self.currency)
    }

    /// The HTML output path, if configured. `~` expands to the home directory.
    pub fn html_output_path(&self) -> Option<PathBuf> {
        if self.html_output.trim().is_empty() {
            None
        } else {
            expand_home(&self.html_output)
        }
    }
}

// ---------------------------------------------------------------------------
// [logging]
// ---------------------------------------------------------------------------

/// Diagnostic verbosity for stderr messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warn => write!(f, "warn"),
            Self::Info => write!(f, "info"),
            Self::Debug => write!(f, "debug"),
        }
    }
}

/// Refresh log settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Whether refresh cycles are appended to the JSONL log.
    pub enabled: bool,
    /// Path to the refresh log file. `~` is expanded to the home directory.
    pub path: String,
    /// Stderr verbosity: `"error"`, `"warn"`, `"info"`, `"debug"`.
    pub level: LogLevel,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "~/.segdash/refresh-log.jsonl".to_string(),
            level: LogLevel::Info,
        }
    }
}

impl LoggingConfig {
    /// Resolved log file path, or `None` when logging is disabled.
    pub fn log_path(&self) -> Option<PathBuf> {
        if !self.enabled {
            return None;
        }
        expand_home(&self.path)
    }
}

// ---------------------------------------------------------------------------
// [web]
// ---------------------------------------------------------------------------

/// Local preview server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub addr: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:9747".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Expand a leading `~` to the home directory.
///
/// Returns `None` if the path starts with `~` and the home directory cannot
/// be determined.
pub fn expand_home(path: &str) -> Option<PathBuf> {
    if path == "~" {
        return dirs::home_dir();
    }
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map(|home| home.join(rest)),
        None => Some(PathBuf::from(path)),
    }
}

// ---------------------------------------------------------------------------
// Default TOML content
// ---------------------------------------------------------------------------

impl DashboardConfig {
    /// Generate the annotated default TOML config file content.
    ///
    /// Used by `segdash config init` to create a starting config file with
    /// all settings documented.
    pub fn default_toml() -> String {
        r#"# segdash Configuration
# Customer segmentation dashboard client
#
# Configuration hierarchy (highest precedence wins):
#   1. Environment variables (SEGDASH_*)
#   2. Project config (.segdash.toml in current directory)
#   3. User global config (~/.segdash/config.toml)
#   4. Built-in defaults

[backend]
base_url = "http://127.0.0.1:5000"
timeout_ms = 10000                    # Per request

[backend.endpoints]
segment_details = "/api/segment_details"
cluster_distribution = "/api/cluster_distribution"
feature_importance = "/api/feature_importance"
cluster_profiles = "/api/cluster_profiles"

[refresh]
interval_secs = 300                   # 5 minutes
concurrent_charts = true              # Fetch the three charts in parallel

[display]
currency = "TND"
segment_label_prefix = "Segment"
html_output = ""                      # e.g. "~/.segdash/dashboard.html"

[logging]
enabled = true
path = "~/.segdash/refresh-log.jsonl"
level = "info"                        # error | warn | info | debug

[web]
addr = "127.0.0.1:9747"
"#
        .to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
