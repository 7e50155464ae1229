// File: ./src/cli.rs
//! Command-line definitions shared by the binary and its tests.
use anyhow::{Result, bail};
use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "classcue", version)]
#[command(about = "Sends class reminders ahead of scheduled yoga classes", long_about = None)]
pub struct Cli {
    /// Use a different directory for config, data and logs
    #[arg(short, long, global = true)]
    pub root: Option<PathBuf>,

    /// Path to the config file (defaults to <config dir>/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase terminal log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send every reminder that is due now
    Run {
        /// Pretend the current time is this (RFC 3339, or local "YYYY-MM-DD HH:MM")
        #[arg(long)]
        now: Option<String>,

        /// Reminder offsets in hours before class start, e.g. 26,25,24
        #[arg(long, value_delimiter = ',')]
        offsets: Option<Vec<u32>>,

        /// How long after its scheduled time a reminder may still be sent
        #[arg(long)]
        grace_minutes: Option<u32>,

        /// Print reminders instead of sending them; nothing is recorded
        #[arg(long)]
        dry_run: bool,
    },
    /// List every reminder checkpoint and its status without sending
    Plan {
        #[arg(long)]
        now: Option<String>,
    },
    /// Trim a raw booking-platform event dump into the local event cache
    ImportEvents {
        /// JSON array of events as returned by the platform API
        raw_json: PathBuf,
    },
}

/// Parses a `--now` value. Strings with an offset are absolute; naive ones
/// are wall-clock times in the studio timezone.
pub fn parse_now(s: &str, tz: &Tz) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    let naive = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ]
    .iter()
    .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok());

    match naive {
        Some(n) => Ok(crate::planner::resolve_civil(tz, n)),
        None => bail!(
            "Invalid --now '{}': expected RFC 3339 or YYYY-MM-DD HH:MM",
            s
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_now_forms() {
        let tz = chrono_tz::America::Denver;
        let expected = "2026-01-04T14:05:00+00:00";
        assert_eq!(parse_now("2026-01-04T07:05:00-07:00", &tz).unwrap().to_rfc3339(), expected);
        assert_eq!(parse_now("2026-01-04T14:05:00Z", &tz).unwrap().to_rfc3339(), expected);
        assert_eq!(parse_now("2026-01-04 07:05", &tz).unwrap().to_rfc3339(), expected);
        assert_eq!(parse_now("2026-01-04T07:05", &tz).unwrap().to_rfc3339(), expected);
        assert!(parse_now("yesterday", &tz).is_err());
    }

    #[test]
    fn test_cli_parses_run_flags() {
        let cli = Cli::parse_from([
            "classcue",
            "-vv",
            "--root",
            "/tmp/x",
            "run",
            "--offsets",
            "48,24",
            "--dry-run",
        ]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.root, Some(PathBuf::from("/tmp/x")));
        match cli.command {
            Command::Run {
                offsets, dry_run, ..
            } => {
                assert_eq!(offsets, Some(vec![48, 24]));
                assert!(dry_run);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_cli_import_events() {
        let cli = Cli::parse_from(["classcue", "import-events", "dump.json"]);
        assert!(matches!(cli.command, Command::ImportEvents { .. }));
    }
}
