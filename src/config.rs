//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$READSHELF_CONFIG` (environment variable)
//! 2. `~/.config/readshelf/config.toml` (Linux/macOS)
//!    `%APPDATA%\readshelf\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::PathBuf;

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::service::{SortBy, SortOrder, SortParams, MAX_PAGE_SIZE};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Search defaults.
    pub search: SearchConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
}

/// Search defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Page size when the caller does not ask for one.
    pub default_page_size: usize,
    /// Largest page a caller may request (never above 100).
    pub max_page_size: usize,
    /// Tie-breaking sort column: "updated_at", "saved_at", "published_at".
    pub default_sort: String,
    /// Default sort direction: "asc" or "desc".
    pub sort_order: String,
    /// First day of `this week`: "monday" or "sunday".
    pub week_starts_on: String,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            cache_dir: None,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            max_page_size: MAX_PAGE_SIZE,
            default_sort: "updated_at".to_string(),
            sort_order: "desc".to_string(),
            week_starts_on: "monday".to_string(),
        }
    }
}

impl SearchConfig {
    /// Default sort as typed parameters. Unknown values fall back to
    /// `updated_at` descending.
    pub fn sort_params(&self) -> SortParams {
        let by = match self.default_sort.to_lowercase().as_str() {
            "updated_at" | "updated" => SortBy::UpdatedTime,
            "saved_at" | "saved" => SortBy::SavedAt,
            "published_at" | "published" => SortBy::PublishedAt,
            other => {
                tracing::warn!(value = other, "Unknown default_sort, using updated_at");
                SortBy::UpdatedTime
            }
        };
        let order = if self.sort_order.eq_ignore_ascii_case("asc") {
            SortOrder::Ascending
        } else {
            SortOrder::Descending
        };
        SortParams { by, order }
    }

    pub fn week_start(&self) -> Weekday {
        match self.week_starts_on.to_lowercase().as_str() {
            "sunday" | "sun" => Weekday::Sun,
            "monday" | "mon" => Weekday::Mon,
            other => {
                tracing::warn!(value = other, "Unknown week_starts_on, using monday");
                Weekday::Mon
            }
        }
    }

    /// `max_page_size`, clamped to `1..=100`.
    pub fn page_cap(&self) -> usize {
        self.max_page_size.clamp(1, MAX_PAGE_SIZE)
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("READSHELF_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("readshelf").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("readshelf")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("readshelf.log")
}
