// File: ./src/notifier.rs
//! Outbound delivery of rendered reminders.
//!
//! The pipeline only knows the `Notifier` trait. Concrete transports:
//!
//! - `DryRunNotifier` prints the message and never counts as delivered.
//! - `SmtpNotifier` sends mail over STARTTLS.
//! - `DesktopNotifier` pops a desktop notification on the machine running
//!   the job.
//!
//! Every send goes through `send_with_retry`, which bounds each attempt with
//! a timeout and retries transient failures with exponential backoff.
use crate::config::{NotifierConfig, TransportKind};
use crate::error::NotifyError;
use lettre::address::AddressError;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use notify_rust::Notification;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
}

pub trait Notifier {
    fn send(&self, message: &OutgoingMessage) -> impl Future<Output = Result<(), NotifyError>>;

    /// False for transports where "success" does not mean anyone received
    /// the reminder; such sends are not recorded in the ledger.
    fn records_delivery(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub timeout: Duration,
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            timeout: Duration::from_secs(30),
            backoff_base: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt `attempt` (1-based): base, 2x base, 4x base...
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(6);
        self.backoff_base.saturating_mul(factor)
    }
}

/// Sends `message`, retrying transient failures. Returns the number of
/// attempts used on success, or the last error.
pub async fn send_with_retry<N: Notifier>(
    notifier: &N,
    message: &OutgoingMessage,
    policy: &RetryPolicy,
) -> Result<u32, NotifyError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let result = match tokio::time::timeout(policy.timeout, notifier.send(message)).await {
            Ok(r) => r,
            Err(_) => Err(NotifyError::Timeout(policy.timeout)),
        };
        match result {
            Ok(()) => return Ok(attempt),
            Err(e) if attempt < max_attempts && e.is_retryable() => {
                let delay = policy.backoff(attempt);
                log::warn!(
                    "{} send attempt {}/{} failed: {}; retrying in {:?}",
                    notifier.name(),
                    attempt,
                    max_attempts,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

// --- Dry run ---

#[derive(Debug, Default, Clone)]
pub struct DryRunNotifier;

impl Notifier for DryRunNotifier {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), NotifyError> {
        println!("--- DRY RUN: would send reminder ---");
        println!("To: {}", message.recipients.join(", "));
        println!("Subject: {}", message.subject);
        println!();
        println!("{}", message.body);
        println!("--- END ---");
        Ok(())
    }

    fn records_delivery(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "dry-run"
    }
}

// --- SMTP ---

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

fn parse_mailbox(addr: &str) -> Result<Mailbox, NotifyError> {
    addr.parse()
        .map_err(|e: AddressError| NotifyError::Config(format!("invalid address '{}': {}", addr, e)))
}

impl SmtpNotifier {
    pub fn new(cfg: &NotifierConfig) -> Result<Self, NotifyError> {
        let host = cfg
            .smtp_host
            .as_deref()
            .filter(|h| !h.trim().is_empty())
            .ok_or_else(|| NotifyError::Config("notifier.smtp_host is required".to_string()))?;
        let from = cfg
            .from
            .as_deref()
            .or(cfg.smtp_username.as_deref())
            .ok_or_else(|| NotifyError::Config("notifier.from is required".to_string()))
            .and_then(parse_mailbox)?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| NotifyError::Config(e.to_string()))?
            .port(cfg.smtp_port)
            .timeout(Some(Duration::from_secs(cfg.timeout_secs)));
        if let (Some(user), Some(pass)) = (&cfg.smtp_username, &cfg.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

impl Notifier for SmtpNotifier {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), NotifyError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(message.subject.clone())
            .header(ContentType::TEXT_PLAIN);
        for r in &message.recipients {
            builder = builder.to(parse_mailbox(r)?);
        }
        let email = builder
            .body(message.body.clone())
            .map_err(|e| NotifyError::Config(e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}

// --- Desktop ---

#[derive(Debug, Default, Clone)]
pub struct DesktopNotifier;

impl Notifier for DesktopNotifier {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), NotifyError> {
        let summary = message.subject.clone();
        let body = message.body.clone();
        // notify-rust talks to the session bus synchronously.
        tokio::task::spawn_blocking(move || {
            Notification::new()
                .summary(&summary)
                .body(&body)
                .appname("classcue")
                .show()
                .map(|_| ())
                .map_err(|e| NotifyError::Transport(e.to_string()))
        })
        .await
        .map_err(|e| NotifyError::Transport(e.to_string()))?
    }

    fn name(&self) -> &'static str {
        "desktop"
    }
}

// --- Selection ---

/// The configured transport, chosen at startup.
pub enum Transport {
    DryRun(DryRunNotifier),
    Smtp(SmtpNotifier),
    Desktop(DesktopNotifier),
}

impl Transport {
    pub fn from_config(cfg: &NotifierConfig, dry_run: bool) -> Result<Self, NotifyError> {
        if dry_run {
            return Ok(Transport::DryRun(DryRunNotifier));
        }
        Ok(match cfg.transport {
            TransportKind::DryRun => Transport::DryRun(DryRunNotifier),
            TransportKind::Smtp => Transport::Smtp(SmtpNotifier::new(cfg)?),
            TransportKind::Desktop => Transport::Desktop(DesktopNotifier),
        })
    }
}

impl Notifier for Transport {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), NotifyError> {
        match self {
            Transport::DryRun(n) => n.send(message).await,
            Transport::Smtp(n) => n.send(message).await,
            Transport::Desktop(n) => n.send(message).await,
        }
    }

    fn records_delivery(&self) -> bool {
        match self {
            Transport::DryRun(n) => n.records_delivery(),
            Transport::Smtp(n) => n.records_delivery(),
            Transport::Desktop(n) => n.records_delivery(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Transport::DryRun(n) => n.name(),
            Transport::Smtp(n) => n.name(),
            Transport::Desktop(n) => n.name(),
        }
    }
}
