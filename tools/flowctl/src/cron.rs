//! Crontab evaluation commands

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Subcommand;
use colored::*;
use pointflow_sync::{Crontab, Stamp, TimeSync, Zone};

#[derive(Subcommand)]
pub enum CronCommands {
    /// List the stamps an entry fires at
    #[command(about = "List the next (or previous) stamps of a crontab entry")]
    Next {
        /// Crontab entry, e.g. "*/15 8-17 * * 1-5"
        entry: String,
        /// Start stamp (RFC 3339), defaults to now
        #[arg(long)]
        from: Option<String>,
        /// Number of stamps to list
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,
        /// Time zone the entry is evaluated in (UTC, Local, +05:30)
        #[arg(short, long, default_value = "UTC")]
        zone: String,
        /// Walk backwards in time
        #[arg(short, long)]
        backward: bool,
        /// Print the stamps as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Check whether a stamp matches an entry
    #[command(about = "Check whether a stamp is in a crontab schedule")]
    Check {
        /// Crontab entry
        entry: String,
        /// Stamp to check (RFC 3339)
        stamp: String,
        /// Time zone the entry is evaluated in
        #[arg(short, long, default_value = "UTC")]
        zone: String,
    },
}

pub fn handle_command(cmd: CronCommands) -> Result<()> {
    match cmd {
        CronCommands::Next {
            entry,
            from,
            count,
            zone,
            backward,
            json,
        } => {
            let zone = parse_zone(&zone)?;
            let from = match from {
                Some(text) => parse_stamp(&text)?,
                None => Utc::now(),
            };
            let stamps = schedule_stamps(&entry, zone, from, count, backward)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stamps)?);
                return Ok(());
            }

            println!(
                "{} {} ({}, {} {})",
                "Crontab".bright_cyan(),
                entry.bold(),
                zone,
                if backward { "before" } else { "after" },
                from.to_rfc3339()
            );
            if stamps.is_empty() {
                println!("  {}", "no matching stamps".yellow());
            }
            for stamp in stamps {
                let local = zone.to_local(stamp).to_string();
                println!("  {}  {}", stamp.to_rfc3339(), local.dimmed());
            }
            Ok(())
        },
        CronCommands::Check { entry, stamp, zone } => {
            let zone = parse_zone(&zone)?;
            let stamp = parse_stamp(&stamp)?;
            let crontab = Crontab::parse(&entry)
                .with_context(|| format!("Invalid crontab entry '{}'", entry))?;

            if crontab.is_in_schedule(stamp, zone) {
                println!("{} {} matches {}", "✓".green(), stamp.to_rfc3339(), entry);
            } else {
                println!("{} {} does not match {}", "✗".red(), stamp.to_rfc3339(), entry);
            }
            Ok(())
        },
    }
}

/// Up to `count` stamps strictly after (or before) `from`
fn schedule_stamps(
    entry: &str,
    zone: Zone,
    from: Stamp,
    count: usize,
    backward: bool,
) -> Result<Vec<Stamp>> {
    let crontab =
        Crontab::parse(entry).with_context(|| format!("Invalid crontab entry '{}'", entry))?;
    let mut sync = TimeSync::crontab(crontab).with_zone(zone);
    if backward {
        sync = sync.reversed();
    }
    Ok(sync.iter_from(from).take(count).collect())
}

fn parse_zone(text: &str) -> Result<Zone> {
    Zone::parse(text).with_context(|| format!("Invalid time zone '{}'", text))
}

fn parse_stamp(text: &str) -> Result<Stamp> {
    Ok(DateTime::parse_from_rfc3339(text)
        .with_context(|| format!("Invalid RFC 3339 stamp '{}'", text))?
        .with_timezone(&Utc))
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_schedule_stamps_forward_and_backward() {
        let from = Utc.with_ymd_and_hms(2025, 1, 1, 10, 7, 0).unwrap();

        let forward = schedule_stamps("*/15", Zone::Utc, from, 3, false).unwrap();
        assert_eq!(
            forward,
            vec![
                Utc.with_ymd_and_hms(2025, 1, 1, 10, 15, 0).unwrap(),
                Utc.with_ymd_and_hms(2025, 1, 1, 10, 30, 0).unwrap(),
                Utc.with_ymd_and_hms(2025, 1, 1, 10, 45, 0).unwrap(),
            ]
        );

        let backward = schedule_stamps("*/15", Zone::Utc, from, 2, true).unwrap();
        assert_eq!(
            backward,
            vec![
                Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2025, 1, 1, 9, 45, 0).unwrap(),
            ]
        );
    }

    #[test]
    fn test_invalid_inputs() {
        let from = Utc::now();
        assert!(schedule_stamps("61 * * * *", Zone::Utc, from, 1, false).is_err());
        assert!(parse_zone("Mars/Olympus").is_err());
        assert!(parse_stamp("yesterday").is_err());
        assert_eq!(
            parse_stamp("2025-03-01T01:00:00+01:00").unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()
        );
    }
}
