/// Configuration system for segdash.
///
/// Provides a layered configuration hierarchy:
///
/// 1. **Built-in defaults** — hardcoded in [`schema::DashboardConfig::default()`]
/// 2. **User global config** — `~/.segdash/config.toml`
/// 3. **Project local config** — `.segdash.toml` in the current working directory
/// 4. **Environment variables** — `SEGDASH_*` overrides (highest precedence)
///
/// Later layers override earlier ones key by key. Keys no layer sets fall
/// back to built-in defaults.
///
/// # Usage
///
/// ```rust,ignore
/// use segdash::config;
///
/// let cfg = config::load();
/// let client = HttpBackend::from_config(&cfg.backend);
/// ```
pub mod schema;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

pub use schema::DashboardConfig;

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load the fully resolved segdash configuration.
///
/// Merges all layers in order: defaults → global TOML → project TOML → env
/// vars.
pub fn load() -> DashboardConfig {
    let mut layered = toml::Table::new();

    // Layer 2: user global config (~/.segdash/config.toml)
    if let Some(global) = load_toml_file(global_config_path()) {
        merge_tables(&mut layered, global);
    }

    // Layer 3: project local config (.segdash.toml)
    if let Some(project) = load_toml_file(project_config_path()) {
        merge_tables(&mut layered, project);
    }

    let mut config = match toml::Value::Table(layered).try_into::<DashboardConfig>() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("[segdash] ignoring invalid config values: {e}");
            DashboardConfig::default()
        }
    };

    // Layer 4: environment variable overrides
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());

    config
}

/// Load a TOML config file from the given path (if it exists).
///
/// Returns `None` if the path is `None`, the file doesn't exist, or the
/// content is malformed. A malformed file is reported on stderr and skipped
/// so the dashboard still starts with the remaining layers.
fn load_toml_file(path: Option<PathBuf>) -> Option<toml::Table> {
    let path = path?;
    let content = fs::read_to_string(&path).ok()?;
    match content.parse::<toml::Table>() {
        Ok(table) => Some(table),
        Err(e) => {
            eprintln!("[segdash] ignoring malformed config {}: {e}", path.display());
            None
        }
    }
}

/// Merge a config layer into the base, key by key.
///
/// Nested tables merge recursively; any other value in the overlay replaces
/// the base value. Keys absent from every layer fall back to the built-in
/// defaults through `serde(default)`.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// File paths
// ---------------------------------------------------------------------------

/// Path to the user global config: `~/.segdash/config.toml`.
fn global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".segdash").join("config.toml"))
}

/// Path to the project local config: `.segdash.toml` in the current directory.
fn project_config_path() -> Option<PathBuf> {
    std::env::current_dir()
        .ok()
        .map(|cwd| cwd.join(".segdash.toml"))
}

/// Return the path to the global config file for display/init purposes.
pub fn global_config_file() -> Option<PathBuf> {
    global_config_path()
}

/// Return the path to the project config file for display purposes.
pub fn project_config_file() -> Option<PathBuf> {
    project_config_path()
}

// ---------------------------------------------------------------------------
// Environment variable overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides (highest precedence layer).
///
/// Supported variables:
/// - `SEGDASH_BASE_URL` — backend base URL
/// - `SEGDASH_TIMEOUT_MS` — per-request timeout
/// - `SEGDASH_INTERVAL_SECS` — refresh interval
/// - `SEGDASH_CONCURRENT_CHARTS` — fetch charts in parallel (`1`/`true`/...)
/// - `SEGDASH_CURRENCY` — currency code for consumption amounts
/// - `SEGDASH_LOGGING` — refresh log on/off
/// - `SEGDASH_LOG_LEVEL` — stderr verbosity
///
/// `lookup` abstracts `std::env::var` so the layer can be tested without
/// touching the process environment.
fn apply_env_overrides(config: &mut DashboardConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(val) = lookup("SEGDASH_BASE_URL")
        && !val.is_empty()
    {
        config.backend.base_url = val;
    }
    if let Some(val) = lookup("SEGDASH_TIMEOUT_MS")
        && let Ok(ms) = val.parse::<u64>()
    {
        config.backend.timeout_ms = ms;
    }
    if let Some(val) = lookup("SEGDASH_INTERVAL_SECS")
        && let Ok(secs) = val.parse::<u64>()
    {
        config.refresh.interval_secs = secs;
    }
    if let Some(val) = lookup("SEGDASH_CONCURRENT_CHARTS") {
        config.refresh.concurrent_charts = is_truthy(&val);
    }
    if let Some(val) = lookup("SEGDASH_CURRENCY")
        && !val.is_empty()
    {
        config.display.currency = val.to_ascii_uppercase();
    }
    if let Some(val) = lookup("SEGDASH_LOGGING") {
        config.logging.enabled = is_truthy(&val);
    }
    if let Some(val) = lookup("SEGDASH_LOG_LEVEL")
        && let Some(level) = parse_level(&val)
    {
        config.logging.level = level;
    }
}

/// Check if a string value represents a truthy boolean.
fn is_truthy(val: &str) -> bool {
    matches!(
        val.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Parse a log level string.
fn parse_level(val: &str) -> Option<schema::LogLevel> {
    match val.to_ascii_lowercase().as_str() {
        "error" => Some(schema::LogLevel::Error),
        "warn" | "warning" => Some(schema::LogLevel::Warn),
        "info" => Some(schema::LogLevel::Info),
        "debug" => Some(schema::LogLevel::Debug),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Config init / set / reset
// ---------------------------------------------------------------------------

/// Write the default annotated config to `~/.segdash/config.toml`.
///
/// Creates the `~/.segdash/` directory if it doesn't exist. Returns an error
/// if the file already exists (use `force = true` to overwrite).
pub fn init_config(force: bool) -> Result<PathBuf> {
    let path = global_config_path().context("could not determine home directory")?;

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create ~/.segdash/ directory")?;
    }

    fs::write(&path, DashboardConfig::default_toml()).context("failed to write config file")?;

    Ok(path)
}

/// Set a single config key to a value in the global config file.
///
/// Reads the current global config (or defaults), updates the specified key,
/// and writes the result back. Supports dotted keys like
/// `backend.endpoints.segment_details`.
pub fn set_config_value(key: &str, value: &str) -> Result<()> {
    let path = global_config_path().context("could not determine home directory")?;

    let content = if path.exists() {
        fs::read_to_string(&path).context("failed to read config file")?
    } else {
        toml::to_string_pretty(&DashboardConfig::default())
            .context("failed to serialize default config")?
    };

    let mut value_table: toml::Value =
        toml::from_str(&content).context("failed to parse config as TOML value")?;
    set_toml_value(&mut value_table, key, value)?;

    // Reject values that would make the file unloadable.
    let updated =
        toml::to_string_pretty(&value_table).context("failed to serialize updated config")?;
    toml::from_str::<DashboardConfig>(&updated)
        .with_context(|| format!("invalid value '{value}' for '{key}'"))?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create config directory")?;
    }
    fs::write(&path, updated).context("failed to write config file")?;

    Ok(())
}

/// Set a value in a TOML value tree using a dotted key path.
fn set_toml_value(root: &mut toml::Value, key: &str, raw_value: &str) -> Result<()> {
    let parts: Vec<&str> = key.split('.').collect();
    if parts.iter().any(|p| p.is_empty()) {
        anyhow::bail!("invalid config key: '{key}'");
    }

    // Navigate to the parent table
    let mut current = root;
    for &part in &parts[..parts.len() - 1] {
        current = current
            .get_mut(part)
            .with_context(|| format!("config key not found: section '{part}' in '{key}'"))?;
    }

    let leaf = parts[parts.len() - 1];

    let table = current.as_table_mut().with_context(|| {
        format!(
            "expected table at '{}'",
            key.rsplit_once('.').map(|(s, _)| s).unwrap_or("")
        )
    })?;

    // Parse according to the type of the existing value
    let new_value = match table.get(leaf) {
        Some(toml::Value::Boolean(_)) => toml::Value::Boolean(is_truthy(raw_value)),
        Some(toml::Value::Integer(_)) => {
            let n: i64 = raw_value
                .parse()
                .with_context(|| format!("expected integer for '{key}', got '{raw_value}'"))?;
            toml::Value::Integer(n)
        }
        Some(toml::Value::Float(_)) => {
            let f: f64 = raw_value
                .parse()
                .with_context(|| format!("expected float for '{key}', got '{raw_value}'"))?;
            toml::Value::Float(f)
        }
        Some(toml::Value::Table(_)) => {
            anyhow::bail!("'{key}' is a section, not a value");
        }
        _ => toml::Value::String(raw_value.to_string()),
    };

    table.insert(leaf.to_string(), new_value);
    Ok(())
}

/// Reset the global config to defaults (overwrite the file).
pub fn reset_config() -> Result<PathBuf> {
    init_config(true)
}

/// Show the effective (fully resolved) config as TOML.
pub fn show_effective_config() -> Result<String> {
    let config = load();
    toml::to_string_pretty(&config).context("failed to serialize effective config")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
