use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::Parser;
use classcue::cli::{Cli, Command, parse_now};
use classcue::config::Config;
use classcue::context::{AppContext, StandardContext};
use classcue::controller::{ReminderController, RunSettings, read_document};
use classcue::ledger::DeliveryLedger;
use classcue::model::{EventCache, RawEvent};
use classcue::notifier::Transport;
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, LevelFilter, SharedLogger, TermLogger,
    TerminalMode, WriteLogger,
};
use std::fs::OpenOptions;
use std::process::ExitCode;

fn init_logging(ctx: &dyn AppContext, verbose: u8) {
    let term_level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    let log_config = ConfigBuilder::new()
        .add_filter_allow_str("classcue")
        .build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        term_level,
        log_config.clone(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];

    if let Some(path) = ctx.get_log_path() {
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => loggers.push(WriteLogger::new(LevelFilter::Info, log_config, file)),
            Err(e) => eprintln!("Warning: cannot open log file {}: {}", path.display(), e),
        }
    }

    // Only fails if a logger is already set.
    let _ = CombinedLogger::init(loggers);
}

async fn run(cli: Cli) -> Result<()> {
    let ctx = StandardContext::new(cli.root.clone());
    init_logging(&ctx, cli.verbose);

    let mut config = Config::load_or_default(&ctx, cli.config.as_deref())?;
    let tz = config.tz()?;

    match cli.command {
        Command::Run {
            now,
            offsets,
            grace_minutes,
            dry_run,
        } => {
            if let Some(offsets) = offsets {
                config.offsets_hours = offsets;
            }
            if let Some(minutes) = grace_minutes {
                config.grace_window_minutes = minutes;
            }
            config.validate()?;

            let now = match now {
                Some(s) => parse_now(&s, &tz)?,
                None => Utc::now(),
            };

            let document = read_document(&config.document_path(&ctx)?)?;
            let events = EventCache::load(
                &config.events_path(&ctx)?,
                Duration::hours(i64::from(config.events_stale_after_hours)),
            );
            let ledger = DeliveryLedger::new(config.ledger_path(&ctx)?);
            let transport = Transport::from_config(&config.notifier, dry_run)?;
            let controller =
                ReminderController::new(RunSettings::from_config(&config)?, ledger, transport);

            let report = controller.run(&document, &events, now).await?;
            println!("{}", report);
            for failed in &report.failed {
                println!("  failed: {} ({})", failed.checkpoint_key, failed.reason);
            }
        }
        Command::Plan { now } => {
            let now = match now {
                Some(s) => parse_now(&s, &tz)?,
                None => Utc::now(),
            };
            let document = read_document(&config.document_path(&ctx)?)?;
            let ledger = DeliveryLedger::new(config.ledger_path(&ctx)?);
            // Planning never sends, so the transport is irrelevant.
            let controller = ReminderController::new(
                RunSettings::from_config(&config)?,
                ledger,
                Transport::from_config(&config.notifier, true)?,
            );

            for planned in controller.preview(&document, now)? {
                let cp = &planned.checkpoint;
                println!(
                    "{}  {:<8} {}",
                    cp.scheduled_at.with_timezone(&tz).format("%Y-%m-%d %H:%M %Z"),
                    planned.status,
                    cp.checkpoint_key
                );
            }
        }
        Command::ImportEvents { raw_json } => {
            let json = std::fs::read_to_string(&raw_json)
                .with_context(|| format!("Failed to read {}", raw_json.display()))?;
            let raw: Vec<RawEvent> = serde_json::from_str(&json)
                .with_context(|| format!("Failed to parse {}", raw_json.display()))?;
            let total = raw.len();
            let kept = EventCache::trim(
                raw,
                Utc::now(),
                Duration::days(i64::from(config.events_lookahead_days)),
            );
            let path = config.events_path(&ctx)?;
            EventCache::save(&path, &kept)?;
            println!(
                "Saved {} of {} events to {}",
                kept.len(),
                total,
                path.display()
            );
        }
    }

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
