// Error taxonomy for the reminder pipeline.
//
// Only `LedgerError::Corrupt` and `LedgerError::UnsupportedVersion` are fatal
// for a run. Parse errors skip one block, notify errors leave one checkpoint
// unsent.
use std::path::PathBuf;
use thiserror::Error;

/// Why a single schedule block was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid calendar date {month}/{day}")]
    InvalidDate { month: u32, day: u32 },
    #[error("unreadable start time '{0}'")]
    InvalidTime(String),
    #[error("no start time given and no default class time for {0}")]
    MissingTime(chrono::Weekday),
    #[error("duplicate of an earlier class with the same date, time and title")]
    Duplicate,
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("delivery ledger {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error("delivery ledger {path} has unsupported version {found}")]
    UnsupportedVersion { path: PathBuf, found: u32 },
}

impl LedgerError {
    /// Corruption must abort the run; treating the ledger as empty would
    /// resend everything and treating it as full would drop reminders.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, LedgerError::Io(_))
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notifier timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("notifier misconfigured: {0}")]
    Config(String),
}

impl NotifyError {
    /// Configuration problems will not fix themselves between attempts.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, NotifyError::Config(_))
    }
}
