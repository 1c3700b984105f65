//! Engine configuration.
//!
//! Everything tunable about scheduling, retries, pacing and rendering lives
//! here as serde structs with defaults, loadable from a TOML file. The
//! defaults match the behavior of the production deployment; tests shrink
//! the timing knobs to keep runs fast.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScrapeError};

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<EngineConfig> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ScrapeError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        toml::from_str(&raw)
            .map_err(|e| ScrapeError::Config(format!("cannot parse {}: {}", path.display(), e)))
    }

    /// Apply environment overrides across all sections.
    pub fn with_env_overrides(mut self) -> Self {
        self.render = self.render.with_env_overrides();
        self
    }
}

/// Batched concurrent execution across the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Sources launched concurrently per batch.
    #[serde(default = "default_batch_size")]
    pub size: usize,
    /// Cosmetic pause between batches, throttling event volume.
    #[serde(default = "default_batch_pause_ms")]
    pub pause_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            size: default_batch_size(),
            pause_ms: default_batch_pause_ms(),
        }
    }
}

/// Bounded-retry fetch behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Timeout for the first attempt; later attempts grow by `increment_ms`.
    #[serde(default = "default_base_timeout_ms")]
    pub base_timeout_ms: u64,
    #[serde(default = "default_timeout_increment_ms")]
    pub increment_ms: u64,
    /// Jitter slept before attempts after the first, min..max.
    #[serde(default = "default_backoff_min_ms")]
    pub backoff_min_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

impl RetryConfig {
    pub fn attempt_timeout(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.base_timeout_ms + u64::from(attempt) * self.increment_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_timeout_ms: default_base_timeout_ms(),
            increment_ms: default_timeout_increment_ms(),
            backoff_min_ms: default_backoff_min_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

/// Human-pacing delay before plain HTTP requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacingConfig {
    #[serde(default = "default_pacing_min_ms")]
    pub min_ms: u64,
    #[serde(default = "default_pacing_max_ms")]
    pub max_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            min_ms: default_pacing_min_ms(),
            max_ms: default_pacing_max_ms(),
        }
    }
}

/// Challenge renderer limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Hard bound over the whole load+extract sequence.
    #[serde(default = "default_page_timeout_secs")]
    pub page_timeout_secs: u64,
    /// Wall-clock time the challenge script gets after navigation finishes.
    #[serde(default = "default_js_delay_ms")]
    pub js_completion_delay_ms: u64,
    /// Global cap on concurrently live render surfaces. Browser instances
    /// are far more expensive than fetch slots, so this is independent of
    /// the batch size.
    #[serde(default = "default_max_surfaces")]
    pub max_surfaces: usize,
    /// Extraction guardrails.
    #[serde(default = "default_max_records")]
    pub max_records_per_page: usize,
    #[serde(default = "default_min_title_len")]
    pub min_title_len: usize,
    #[serde(default = "default_min_price")]
    pub min_price: f64,
    #[serde(default = "default_max_price")]
    pub max_price: f64,
    /// Remote DevTools endpoint; when unset a local browser is launched.
    /// Overridable via `DEALSCOUT_BROWSER_URL`.
    #[serde(default)]
    pub remote_url: Option<String>,
    #[serde(default = "default_headless")]
    pub headless: bool,
}

impl RenderConfig {
    /// Apply environment overrides.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("DEALSCOUT_BROWSER_URL") {
            if !url.is_empty() {
                self.remote_url = Some(url);
            }
        }
        self
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }

    pub fn js_completion_delay(&self) -> Duration {
        Duration::from_millis(self.js_completion_delay_ms)
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            page_timeout_secs: default_page_timeout_secs(),
            js_completion_delay_ms: default_js_delay_ms(),
            max_surfaces: default_max_surfaces(),
            max_records_per_page: default_max_records(),
            min_title_len: default_min_title_len(),
            min_price: default_min_price(),
            max_price: default_max_price(),
            remote_url: None,
            headless: default_headless(),
        }
    }
}

fn default_batch_size() -> usize {
    3
}
fn default_batch_pause_ms() -> u64 {
    100
}
fn default_max_retries() -> u32 {
    3
}
fn default_base_timeout_ms() -> u64 {
    20_000
}
fn default_timeout_increment_ms() -> u64 {
    15_000
}
fn default_backoff_min_ms() -> u64 {
    2_000
}
fn default_backoff_max_ms() -> u64 {
    5_000
}
fn default_pacing_min_ms() -> u64 {
    500
}
fn default_pacing_max_ms() -> u64 {
    2_000
}
fn default_page_timeout_secs() -> u64 {
    30
}
fn default_js_delay_ms() -> u64 {
    3_000
}
fn default_max_surfaces() -> usize {
    2
}
fn default_max_records() -> usize {
    40
}
fn default_min_title_len() -> usize {
    8
}
fn default_min_price() -> f64 {
    0.5
}
fn default_max_price() -> f64 {
    1_000.0
}
pub(crate) fn default_headless() -> bool {
    true
}
