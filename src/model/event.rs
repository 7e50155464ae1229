// File: src/model/event.rs
//! Booking-platform events, as kept in the local event cache.
//!
//! The cache file is a JSON array of trimmed platform records. It is written
//! by `import-events` (or any external refresher) and only ever read by the
//! reminder run. A missing, unreadable or stale cache is never an error: it
//! just means classes may not find their join link.
use crate::storage::LocalStorage;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::SystemTime;

/// Platform ids are numeric today, but tolerate string ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventId {
    Number(i64),
    Text(String),
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventId::Number(n) => write!(f, "{}", n),
            EventId::Text(s) => write!(f, "{}", s),
        }
    }
}

/// One record as it appears in the platform API and in the cache file.
/// Unknown fields of the API payload are dropped on import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    #[serde(default)]
    pub id: Option<EventId>,
    #[serde(default)]
    pub event_name: Option<String>,
    #[serde(default)]
    pub event_start_datetime: Option<String>,
    #[serde(default)]
    pub event_end_datetime: Option<String>,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub is_cancelled: bool,
    #[serde(default)]
    pub is_www_event: bool,
}

impl RawEvent {
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.event_start_datetime.as_deref().and_then(parse_instant)
    }
}

/// A validated cache record the matcher can use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub id: String,
    pub title: String,
    pub start_time: DateTime<Utc>,
}

impl EventRecord {
    pub fn join_link(&self, join_base_url: &str) -> String {
        format!("{}/{}", join_base_url.trim_end_matches('/'), self.id)
    }

    /// Drops records the matcher must not consider: cancelled, missing id,
    /// unparseable start.
    pub fn from_raw(raw: &RawEvent) -> Option<Self> {
        if raw.is_cancelled {
            return None;
        }
        let id = raw.id.as_ref()?.to_string();
        if id.is_empty() {
            return None;
        }
        Some(Self {
            id,
            title: raw.event_name.clone().unwrap_or_default(),
            start_time: raw.start_time()?,
        })
    }
}

/// Timestamps with an offset are converted to UTC; bare timestamps are
/// taken to be UTC already.
pub fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

pub struct EventCache;

impl EventCache {
    /// Reads the cache. Any problem yields an empty list plus a warning, so
    /// that reminders still go out with the fallback link.
    pub fn load(path: &Path, stale_after: Duration) -> Vec<EventRecord> {
        match Self::try_load(path) {
            Ok(Some(raw)) => {
                Self::warn_if_stale(path, stale_after);
                let records: Vec<EventRecord> = raw.iter().filter_map(EventRecord::from_raw).collect();
                log::debug!(
                    "Loaded {} usable events ({} in cache) from {}",
                    records.len(),
                    raw.len(),
                    path.display()
                );
                records
            }
            Ok(None) => {
                log::warn!(
                    "Event cache {} not found; join links will use the fallback",
                    path.display()
                );
                Vec::new()
            }
            Err(e) => {
                log::warn!("Failed to read event cache {}: {:#}", path.display(), e);
                Vec::new()
            }
        }
    }

    fn try_load(path: &Path) -> Result<Option<Vec<RawEvent>>> {
        let Some(json) = LocalStorage::with_lock(path, || LocalStorage::read_optional(path))
            .with_context(|| format!("reading {}", path.display()))?
        else {
            return Ok(None);
        };
        let events: Vec<RawEvent> = serde_json::from_str(&json)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(Some(events))
    }

    fn warn_if_stale(path: &Path, stale_after: Duration) {
        let Ok(modified) = std::fs::metadata(path).and_then(|m| m.modified()) else {
            return;
        };
        if let Ok(age) = SystemTime::now().duration_since(modified)
            && let Ok(stale) = stale_after.to_std()
            && age > stale
        {
            log::warn!(
                "Event cache {} is {}h old; matches may be missing",
                path.display(),
                age.as_secs() / 3600
            );
        }
    }

    /// Keeps events starting between one day ago and `lookahead` from `now`,
    /// sorted by start. Records without a readable start are dropped.
    pub fn trim(raw: Vec<RawEvent>, now: DateTime<Utc>, lookahead: Duration) -> Vec<RawEvent> {
        let earliest = now - Duration::days(1);
        let latest = now + lookahead;

        let mut kept: Vec<(DateTime<Utc>, RawEvent)> = raw
            .into_iter()
            .filter_map(|ev| ev.start_time().map(|start| (start, ev)))
            .filter(|(start, _)| *start >= earliest && *start <= latest)
            .collect();
        kept.sort_by_key(|(start, _)| *start);
        kept.into_iter().map(|(_, ev)| ev).collect()
    }

    /// Replaces the cache file with `events`.
    pub fn save(path: &Path, events: &[RawEvent]) -> Result<()> {
        LocalStorage::with_lock(path, || {
            let json = serde_json::to_string_pretty(events)?;
            LocalStorage::atomic_write(path, json)?;
            Ok(())
        })
    }
}
