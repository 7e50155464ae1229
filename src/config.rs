// File: ./src/config.rs
// Handles configuration loading, saving, and defaults.
use crate::context::AppContext;
use crate::model::ClassTimes;
use crate::notifier::RetryPolicy;
use crate::planner::{DEFAULT_OFFSETS_HOURS, MAX_OFFSET_HOURS, normalize_offsets};
use crate::storage::LocalStorage;
use anyhow::{Error, Result};
use chrono::Duration;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

fn default_timezone() -> String {
    "America/Denver".to_string()
}
fn default_offsets() -> Vec<u32> {
    DEFAULT_OFFSETS_HOURS.to_vec()
}
fn default_grace_window() -> u32 {
    180
}
fn default_join_base_url() -> String {
    "https://studio.tiffanywoodyoga.com/event/details".to_string()
}
fn default_fallback_join_url() -> String {
    "https://studio.tiffanywoodyoga.com/calendar".to_string()
}
fn default_lookahead_days() -> u32 {
    60
}
fn default_stale_after_hours() -> u32 {
    48
}

fn default_smtp_port() -> u16 {
    587
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_ms() -> u64 {
    500
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    #[default]
    DryRun,
    Smtp,
    Desktop,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct NotifierConfig {
    #[serde(default)]
    pub transport: TransportKind,
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_username: Option<String>,
    #[serde(default)]
    pub smtp_password: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_base_ms: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::default(),
            recipients: Vec::new(),
            from: None,
            smtp_host: None,
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            timeout_secs: 30,
            max_attempts: 3,
            backoff_base_ms: 500,
        }
    }
}

impl NotifierConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            timeout: std::time::Duration::from_secs(self.timeout_secs.max(1)),
            backoff_base: std::time::Duration::from_millis(self.backoff_base_ms),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Config {
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_offsets")]
    pub offsets_hours: Vec<u32>,
    #[serde(default = "default_grace_window")]
    pub grace_window_minutes: u32,

    #[serde(default)]
    pub document_path: Option<PathBuf>,
    #[serde(default)]
    pub events_path: Option<PathBuf>,
    #[serde(default)]
    pub ledger_path: Option<PathBuf>,

    #[serde(default = "default_join_base_url")]
    pub join_base_url: String,
    #[serde(default = "default_fallback_join_url")]
    pub fallback_join_url: String,
    #[serde(default = "default_lookahead_days")]
    pub events_lookahead_days: u32,
    #[serde(default = "default_stale_after_hours")]
    pub events_stale_after_hours: u32,

    #[serde(default)]
    pub class_times: ClassTimes,
    #[serde(default)]
    pub notifier: NotifierConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            offsets_hours: default_offsets(),
            grace_window_minutes: 180,
            document_path: None,
            events_path: None,
            ledger_path: None,
            join_base_url: default_join_base_url(),
            fallback_join_url: default_fallback_join_url(),
            events_lookahead_days: 60,
            events_stale_after_hours: 48,
            class_times: ClassTimes::default(),
            notifier: NotifierConfig::default(),
        }
    }
}

impl Config {
    /// Load the configuration from disk using an explicit context.
    /// Returns a contextualized error if reading or parsing fails.
    pub fn load(ctx: &dyn AppContext) -> Result<Self> {
        let path = ctx.get_config_file_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        // Explicitly detect missing file so callers can fall back to defaults.
        if !path.exists() {
            return Err(anyhow::anyhow!("Config file not found"));
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
        })?;

        let config: Config = toml::from_str(&contents).map_err(|e| {
            anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e)
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Like `load`/`load_from`, but a missing file yields the defaults.
    pub fn load_or_default(ctx: &dyn AppContext, explicit: Option<&Path>) -> Result<Self> {
        let result = match explicit {
            Some(path) => Self::load_from(path),
            None => Self::load(ctx),
        };
        match result {
            Ok(cfg) => Ok(cfg),
            Err(e) if explicit.is_none() && Self::is_missing_config_error(&e) => {
                log::info!("No config file found; using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Helper to detect whether an anyhow::Error indicates that the config file was missing.
    pub fn is_missing_config_error(err: &Error) -> bool {
        if err.to_string().contains("Config file not found") {
            return true;
        }

        for cause in err.chain() {
            if let Some(io_err) = cause.downcast_ref::<std::io::Error>()
                && io_err.kind() == std::io::ErrorKind::NotFound
            {
                return true;
            }
        }

        false
    }

    pub fn validate(&self) -> Result<()> {
        self.tz()?;
        if normalize_offsets(&self.offsets_hours).is_empty() {
            anyhow::bail!("offsets_hours must contain at least one positive offset");
        }
        if let Some(h) = self.offsets_hours.iter().find(|&&h| h > MAX_OFFSET_HOURS) {
            anyhow::bail!(
                "offsets_hours entry {} exceeds the maximum of {} hours",
                h,
                MAX_OFFSET_HOURS
            );
        }
        self.class_times
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid config: {}", e))?;
        if self.notifier.transport == TransportKind::Smtp && self.notifier.recipients.is_empty() {
            anyhow::bail!("notifier.recipients must not be empty for the smtp transport");
        }
        Ok(())
    }

    /// Save configuration using an explicit context.
    pub fn save(&self, ctx: &dyn AppContext) -> Result<()> {
        let path = ctx.get_config_file_path()?;
        LocalStorage::with_lock(&path, || {
            let toml_str = toml::to_string_pretty(self)?;
            LocalStorage::atomic_write(&path, toml_str)?;
            Ok(())
        })
    }

    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("Invalid timezone '{}': {}", self.timezone, e))
    }

    pub fn grace_window(&self) -> Duration {
        Duration::minutes(i64::from(self.grace_window_minutes))
    }

    pub fn document_path(&self, ctx: &dyn AppContext) -> Result<PathBuf> {
        match &self.document_path {
            Some(p) => Ok(p.clone()),
            None => ctx.get_document_path(),
        }
    }

    pub fn events_path(&self, ctx: &dyn AppContext) -> Result<PathBuf> {
        match &self.events_path {
            Some(p) => Ok(p.clone()),
            None => ctx.get_events_path(),
        }
    }

    pub fn ledger_path(&self, ctx: &dyn AppContext) -> Result<PathBuf> {
        match &self.ledger_path {
            Some(p) => Ok(p.clone()),
            None => ctx.get_ledger_path(),
        }
    }
}
