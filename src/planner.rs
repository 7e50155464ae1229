// Expands class entries into reminder checkpoints.
//
// Offsets are civil (wall-clock) offsets: the 24h reminder for a 09:00 class
// fires at 09:00 local time the day before, even when a daylight-saving
// change falls in between and the real elapsed time is 23h or 25h. Local
// times that do not exist (spring-forward gap) resolve to the first instant
// after the gap; repeated local times (fall-back) resolve to the earlier one.
use crate::model::{ClassEntry, ClassKey};
use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

pub const DEFAULT_OFFSETS_HOURS: [u32; 3] = [26, 25, 24];

// DST gaps are at most a couple of hours; anything longer is a tz database
// oddity we resolve by treating the civil time as UTC.
const MAX_GAP_MINUTES: i64 = 24 * 60;

/// Largest accepted offset: a reminder at most a year ahead of the class.
pub const MAX_OFFSET_HOURS: u32 = 24 * 366;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderCheckpoint {
    pub class_key: ClassKey,
    pub offset_hours: u32,
    pub scheduled_at: DateTime<Utc>,
    pub checkpoint_key: String,
}

/// Resolves a civil date-time in `tz` to an instant.
pub fn resolve_civil(tz: &Tz, naive: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => (1..=MAX_GAP_MINUTES)
            .find_map(|m| {
                let shifted = naive.checked_add_signed(Duration::minutes(m))?;
                tz.from_local_datetime(&shifted).earliest()
            })
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| naive.and_utc()),
    }
}

/// Absolute start of a class.
pub fn class_start(key: &ClassKey, tz: &Tz) -> DateTime<Utc> {
    resolve_civil(tz, key.civil_start())
}

/// Ledger key for one (class, offset) pair: `<class key>|T-<h>h`.
pub fn checkpoint_key(key: &ClassKey, offset_hours: u32) -> String {
    format!("{}|T-{}h", key.encode(), offset_hours)
}

/// Drops zero offsets and duplicates, keeping first-seen order.
pub fn normalize_offsets(offsets: &[u32]) -> Vec<u32> {
    let mut out: Vec<u32> = Vec::with_capacity(offsets.len());
    for &h in offsets {
        if h > 0 && !out.contains(&h) {
            out.push(h);
        }
    }
    out
}

pub struct ReminderPlanner {
    offsets: Vec<u32>,
    tz: Tz,
}

impl ReminderPlanner {
    pub fn new(offsets: &[u32], tz: Tz) -> Self {
        Self {
            offsets: normalize_offsets(offsets),
            tz,
        }
    }

    pub fn plan_entry(&self, entry: &ClassEntry) -> Vec<ReminderCheckpoint> {
        let key = entry.key();
        let start = key.civil_start();
        self.offsets
            .iter()
            .filter_map(|&h| {
                let Some(civil) = Duration::try_hours(i64::from(h))
                    .and_then(|d| start.checked_sub_signed(d))
                else {
                    log::warn!("Offset of {}h before {} is out of range; skipping", h, key);
                    return None;
                };
                Some(ReminderCheckpoint {
                    class_key: key.clone(),
                    offset_hours: h,
                    scheduled_at: resolve_civil(&self.tz, civil),
                    checkpoint_key: checkpoint_key(&key, h),
                })
            })
            .collect()
    }

    /// One checkpoint per (entry, offset), in entry order then offset order.
    pub fn plan(&self, entries: &[ClassEntry]) -> Vec<ReminderCheckpoint> {
        entries.iter().flat_map(|e| self.plan_entry(e)).collect()
    }
}
