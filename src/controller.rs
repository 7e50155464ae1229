// File: src/controller.rs
//! Reminder orchestration.
//!
//! One invocation of `ReminderController::run` takes the schedule document
//! and the event cache as they are on disk, works out which reminder
//! checkpoints are due at `now`, and dispatches each one at most once per
//! successful delivery. There is no internal loop: an external scheduler
//! (cron, systemd timer) calls the binary periodically, and the delivery
//! ledger carries state between invocations.
use crate::config::Config;
use crate::error::LedgerError;
use crate::ledger::{DeliveryLedger, LedgerSnapshot};
use crate::model::matcher::resolve_join_link;
use crate::model::{ClassEntry, ClassKey, ClassTimes, EventRecord, ScheduleParser};
use crate::notifier::{Notifier, RetryPolicy, send_with_retry};
use crate::planner::{ReminderCheckpoint, ReminderPlanner, class_start};
use crate::render::render_reminder;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use std::fmt;
use std::path::Path;

/// Everything a run needs from the configuration, resolved once.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub tz: Tz,
    pub offsets_hours: Vec<u32>,
    pub grace_window: Duration,
    pub join_base_url: String,
    pub fallback_join_url: String,
    pub class_times: ClassTimes,
    pub recipients: Vec<String>,
    pub retry: RetryPolicy,
}

impl RunSettings {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        Ok(Self {
            tz: cfg.tz()?,
            offsets_hours: cfg.offsets_hours.clone(),
            grace_window: cfg.grace_window(),
            join_base_url: cfg.join_base_url.clone(),
            fallback_join_url: cfg.fallback_join_url.clone(),
            class_times: cfg.class_times.clone(),
            recipients: cfg.notifier.recipients.clone(),
            retry: cfg.notifier.retry_policy(),
        })
    }
}

/// Where a checkpoint stands relative to `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointStatus {
    /// Recorded in the ledger.
    Sent,
    /// Inside the grace window and not yet recorded.
    Due,
    /// Scheduled in the future.
    Pending,
    /// Grace window elapsed without a recorded delivery.
    Expired,
}

impl fmt::Display for CheckpointStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CheckpointStatus::Sent => "sent",
            CheckpointStatus::Due => "due",
            CheckpointStatus::Pending => "pending",
            CheckpointStatus::Expired => "expired",
        };
        f.pad(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedCheckpoint {
    pub checkpoint: ReminderCheckpoint,
    pub status: CheckpointStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedCheckpoint {
    pub class_key: ClassKey,
    pub checkpoint_key: String,
    pub reason: String,
}

/// Outcome of one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub entries: usize,
    pub skipped_blocks: usize,
    pub checkpoints: usize,
    pub due: usize,
    pub sent: Vec<String>,
    pub failed: Vec<FailedCheckpoint>,
    pub already_sent: usize,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} classes ({} blocks skipped), {} checkpoints, {} due, {} sent, {} failed, {} already sent",
            self.entries,
            self.skipped_blocks,
            self.checkpoints,
            self.due,
            self.sent.len(),
            self.failed.len(),
            self.already_sent
        )
    }
}

/// Reads the schedule document. Unlike the event cache, a missing or
/// unreadable document fails the run.
pub fn read_document(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read schedule document '{}'", path.display()))
}

pub struct ReminderController<N: Notifier> {
    settings: RunSettings,
    ledger: DeliveryLedger,
    notifier: N,
}

impl<N: Notifier> ReminderController<N> {
    pub fn new(settings: RunSettings, ledger: DeliveryLedger, notifier: N) -> Self {
        Self {
            settings,
            ledger,
            notifier,
        }
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    fn parse_and_plan(
        &self,
        document: &str,
        now: DateTime<Utc>,
    ) -> (Vec<(ClassEntry, Vec<ReminderCheckpoint>)>, usize) {
        let reference = now.with_timezone(&self.settings.tz).date_naive();
        let outcome = ScheduleParser::new(&self.settings.class_times, reference).parse(document);

        let planner = ReminderPlanner::new(&self.settings.offsets_hours, self.settings.tz);
        let planned = outcome
            .entries
            .into_iter()
            .map(|entry| {
                let checkpoints = planner.plan_entry(&entry);
                (entry, checkpoints)
            })
            .collect();
        (planned, outcome.skipped.len())
    }

    fn status_of(
        &self,
        checkpoint: &ReminderCheckpoint,
        snapshot: &LedgerSnapshot,
        now: DateTime<Utc>,
    ) -> CheckpointStatus {
        if snapshot.contains(&checkpoint.checkpoint_key) {
            CheckpointStatus::Sent
        } else if checkpoint.scheduled_at > now {
            CheckpointStatus::Pending
        } else if now - checkpoint.scheduled_at <= self.settings.grace_window {
            CheckpointStatus::Due
        } else {
            CheckpointStatus::Expired
        }
    }

    /// Every checkpoint of the document with its status at `now`, without
    /// sending anything.
    pub fn preview(
        &self,
        document: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<PlannedCheckpoint>, LedgerError> {
        let (planned, _) = self.parse_and_plan(document, now);
        let snapshot = self.ledger.load()?;
        let mut out: Vec<PlannedCheckpoint> = planned
            .into_iter()
            .flat_map(|(_, cps)| cps)
            .map(|checkpoint| PlannedCheckpoint {
                status: self.status_of(&checkpoint, &snapshot, now),
                checkpoint,
            })
            .collect();
        out.sort_by(|a, b| a.checkpoint.scheduled_at.cmp(&b.checkpoint.scheduled_at));
        Ok(out)
    }

    /// Runs one pass over the document at `now`.
    ///
    /// Delivery ordering is send first, then mark. If the process dies
    /// between a successful send and `mark_sent`, the next run inside the
    /// grace window sends that checkpoint again: delivery is at-least-once,
    /// and a rare duplicate reminder is accepted in exchange for never
    /// silently losing one.
    ///
    /// Returns `Err` only when the ledger cannot be trusted; per-checkpoint
    /// problems are collected in the report.
    pub async fn run(
        &self,
        document: &str,
        events: &[EventRecord],
        now: DateTime<Utc>,
    ) -> Result<RunReport, LedgerError> {
        let (planned, skipped_blocks) = self.parse_and_plan(document, now);
        let snapshot = self.ledger.load()?;

        let mut report = RunReport {
            entries: planned.len(),
            skipped_blocks,
            checkpoints: planned.iter().map(|(_, cps)| cps.len()).sum(),
            ..RunReport::default()
        };

        let mut due: Vec<(&ClassEntry, &ReminderCheckpoint)> = Vec::new();
        for (entry, checkpoints) in &planned {
            for cp in checkpoints {
                match self.status_of(cp, &snapshot, now) {
                    CheckpointStatus::Due => due.push((entry, cp)),
                    CheckpointStatus::Sent if cp.scheduled_at <= now => report.already_sent += 1,
                    _ => {}
                }
            }
        }
        due.sort_by_key(|(_, cp)| cp.scheduled_at);
        report.due = due.len();

        if due.is_empty() {
            log::info!("No reminders due at {}", now.to_rfc3339());
        }

        for (entry, cp) in due {
            // Another process may have delivered it since the snapshot.
            match self.ledger.has_been_sent(&cp.checkpoint_key) {
                Ok(true) => {
                    log::info!("{} already sent by another run", cp.checkpoint_key);
                    report.already_sent += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    log::error!(
                        "Not sending {} for {}: {}",
                        cp.checkpoint_key,
                        cp.class_key,
                        e
                    );
                    report.failed.push(FailedCheckpoint {
                        class_key: cp.class_key.clone(),
                        checkpoint_key: cp.checkpoint_key.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            }

            let start = class_start(&cp.class_key, &self.settings.tz);
            let join_link = match resolve_join_link(
                start,
                &entry.title,
                events,
                &self.settings.join_base_url,
            ) {
                Some(link) => link,
                None => {
                    log::info!(
                        "No event found for {}; using fallback link",
                        cp.class_key
                    );
                    self.settings.fallback_join_url.clone()
                }
            };

            let message = render_reminder(
                entry,
                cp.offset_hours,
                &self.settings.tz,
                &join_link,
                &self.settings.recipients,
            );

            match send_with_retry(&self.notifier, &message, &self.settings.retry).await {
                Ok(attempts) => {
                    log::info!(
                        "Sent {} via {} ({} attempt(s))",
                        cp.checkpoint_key,
                        self.notifier.name(),
                        attempts
                    );
                    if self.notifier.records_delivery() {
                        match self.ledger.mark_sent(&cp.checkpoint_key, now) {
                            Ok(_) => {}
                            Err(e) if e.is_fatal() => return Err(e),
                            Err(e) => log::error!(
                                "Sent {} but could not record it; it may be sent again: {}",
                                cp.checkpoint_key,
                                e
                            ),
                        }
                    }
                    report.sent.push(cp.checkpoint_key.clone());
                }
                Err(e) => {
                    log::error!(
                        "Failed to send {} for {}: {}",
                        cp.checkpoint_key,
                        cp.class_key,
                        e
                    );
                    report.failed.push(FailedCheckpoint {
                        class_key: cp.class_key.clone(),
                        checkpoint_key: cp.checkpoint_key.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        log::info!("Run complete: {}", report);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{AppContext, TestContext};
    use crate::error::NotifyError;
    use crate::notifier::OutgoingMessage;
    use chrono::TimeZone;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<OutgoingMessage>>,
    }

    impl Notifier for Recorder {
        async fn send(&self, message: &OutgoingMessage) -> Result<(), NotifyError> {
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }

        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    const DOC: &str = "Monday, Jan 5 — Stretch & Strength\nTime: 9:00 AM\nBring a strap.\nRequired Items\n";

    fn settings() -> RunSettings {
        RunSettings::from_config(&Config::default()).unwrap()
    }

    fn denver(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        chrono_tz::America::Denver
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_status_classification() {
        let ctx = TestContext::new();
        let ctrl = ReminderController::new(
            settings(),
            DeliveryLedger::new(ctx.get_ledger_path().unwrap()),
            Recorder::default(),
        );
        // 26h -> Jan 4 07:00, 25h -> 08:00, 24h -> 09:00 (all MST).
        let plan = ctrl.preview(DOC, denver(2026, 1, 4, 8, 30)).unwrap();
        let statuses: Vec<CheckpointStatus> = plan.iter().map(|p| p.status).collect();
        assert_eq!(
            statuses,
            vec![
                CheckpointStatus::Due,
                CheckpointStatus::Due,
                CheckpointStatus::Pending
            ]
        );

        let later = ctrl.preview(DOC, denver(2026, 1, 4, 11, 30)).unwrap();
        assert_eq!(later[0].status, CheckpointStatus::Expired);
        assert_eq!(later[2].status, CheckpointStatus::Due);
    }

    #[tokio::test]
    async fn test_run_sends_and_records() {
        let ctx = TestContext::new();
        let ledger = DeliveryLedger::new(ctx.get_ledger_path().unwrap());
        let ctrl = ReminderController::new(settings(), ledger.clone(), Recorder::default());

        let report = ctrl.run(DOC, &[], denver(2026, 1, 4, 7, 5)).await.unwrap();
        assert_eq!(report.sent, vec!["2026-01-05T09:00|Stretch & Strength|T-26h"]);
        assert!(ledger.has_been_sent(&report.sent[0]).unwrap());

        let msgs = ctrl.notifier().sent.lock().unwrap();
        assert!(msgs[0].body.contains("https://studio.tiffanywoodyoga.com/calendar"));
    }

    #[tokio::test]
    async fn test_run_uses_matched_event_link() {
        let ctx = TestContext::new();
        let ctrl = ReminderController::new(
            settings(),
            DeliveryLedger::new(ctx.get_ledger_path().unwrap()),
            Recorder::default(),
        );
        let events = vec![EventRecord {
            id: "777".to_string(),
            title: "Stretch & Strength".to_string(),
            start_time: denver(2026, 1, 5, 9, 5),
        }];
        ctrl.run(DOC, &events, denver(2026, 1, 4, 7, 5)).await.unwrap();
        let msgs = ctrl.notifier().sent.lock().unwrap();
        assert!(
            msgs[0]
                .body
                .contains("https://studio.tiffanywoodyoga.com/event/details/777")
        );
    }
}
