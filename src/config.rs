// src/config.rs
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::delivery::DeliveryConfig;
use crate::filter::FilterRules;
use crate::ingest::providers::careers::CareersPage;
use crate::scheduler::parse_cron;
use crate::store::DEFAULT_STORE_PATH;

pub const ENV_CONFIG_PATH: &str = "JOB_RADAR_CONFIG";
pub const DEFAULT_TOML_PATH: &str = "config/job_radar.toml";
pub const DEFAULT_JSON_PATH: &str = "config/job_radar.json";

/// Targets per source. An empty list disables that source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Greenhouse board tokens.
    pub greenhouse: Vec<String>,
    /// Lever company slugs.
    pub lever: Vec<String>,
    pub careers: Vec<CareersPage>,
    /// RSS feed URLs.
    pub rss: Vec<String>,
    /// Maildir holding job-alert emails.
    pub mailbox: Option<PathBuf>,
}

fn default_job_check() -> Option<String> {
    Some("*/30 * * * *".to_string())
}
fn default_alert_check() -> Option<String> {
    Some("0 * * * *".to_string())
}

/// Cron expressions. `null`, `""` or `"off"` disables a timer (manual runs still work).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_job_check")]
    pub job_check: Option<String>,
    #[serde(default = "default_alert_check")]
    pub alert_check: Option<String>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            job_check: default_job_check(),
            alert_check: default_alert_check(),
        }
    }
}

fn enabled(expr: &Option<String>) -> Option<&str> {
    expr.as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty() && !e.eq_ignore_ascii_case("off"))
}

impl ScheduleConfig {
    pub fn job_check(&self) -> Option<&str> {
        enabled(&self.job_check)
    }

    pub fn alert_check(&self) -> Option<&str> {
        enabled(&self.alert_check)
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from(DEFAULT_STORE_PATH)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub sources: SourcesConfig,
    pub filters: FilterRules,
    pub schedule: ScheduleConfig,
    pub delivery: DeliveryConfig,
    pub store: StoreConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        for (timer, expr) in [
            ("job_check", self.schedule.job_check()),
            ("alert_check", self.schedule.alert_check()),
        ] {
            if let Some(expr) = expr {
                parse_cron(expr)
                    .map_err(|e| anyhow!("schedule.{timer}: invalid cron `{expr}`: {e}"))?;
            }
        }
        if self.delivery.max_batch_size == 0 {
            bail!("delivery.max_batch_size must be at least 1");
        }
        Ok(())
    }
}

/// Load config from an explicit path. TOML or JSON, picked by extension.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let cfg = parse_config(&content, &ext)
        .with_context(|| format!("parsing config {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Load config using env var + fallbacks:
/// 1) $JOB_RADAR_CONFIG
/// 2) config/job_radar.toml
/// 3) config/job_radar.json
/// 4) built-in defaults
pub fn load_config_default() -> Result<AppConfig> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_config_from(&pb);
        }
        bail!("{ENV_CONFIG_PATH} points to non-existent path {}", pb.display());
    }
    for candidate in [DEFAULT_TOML_PATH, DEFAULT_JSON_PATH] {
        let p = PathBuf::from(candidate);
        if p.exists() {
            return load_config_from(&p);
        }
    }
    tracing::info!("no config file found; using defaults");
    Ok(AppConfig::default())
}

fn parse_config(s: &str, hint_ext: &str) -> Result<AppConfig> {
    match hint_ext {
        "json" => Ok(serde_json::from_str(s)?),
        "toml" => Ok(toml::from_str(s)?),
        _ => toml::from_str(s)
            .map_err(anyhow::Error::from)
            .or_else(|_| serde_json::from_str(s).map_err(anyhow::Error::from))
            .context("unsupported config format"),
    }
}
