//! flowctl - command line access to the pointflow libraries
//!
//! Evaluates crontab schedules, validates behavior metadata and decodes or
//! serves Modbus traffic.

mod behavior;
mod cron;
mod modbus;

use anyhow::Result;
use clap::{Parser, Subcommand};
use common::LogConfig;

#[derive(Parser)]
#[command(name = "flowctl")]
#[command(about = "Pointflow schedule, behavior and Modbus tool")]
#[command(long_about = "Pointflow schedule, behavior and Modbus tool

Commands:
  cron        Evaluate crontab entries
  behavior    Validate behavior chain metadata
  modbus      Decode frames or serve a register map

Examples:
  flowctl cron next \"*/15 8-17 * * 1-5\" --count 5
  flowctl cron check \"0 0 1 * *\" 2025-03-01T00:00:00Z
  flowctl behavior validate processor.yaml
  flowctl modbus decode \"00 01 00 00 00 06 01 03 00 00 00 02\"
  flowctl modbus serve --config registers.yaml --bind 0.0.0.0:502")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate crontab entries
    #[command(subcommand)]
    Cron(cron::CronCommands),

    /// Validate behavior chain metadata
    #[command(subcommand)]
    Behavior(behavior::BehaviorCommands),

    /// Decode Modbus frames or serve a register map
    #[command(subcommand)]
    Modbus(modbus::ModbusCommands),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let log_config = LogConfig {
        level: if cli.verbose { "debug" } else { "warn" }.to_string(),
        ..LogConfig::default()
    };
    common::init_logging(&log_config)?;

    match cli.command {
        Commands::Cron(cmd) => cron::handle_command(cmd),
        Commands::Behavior(cmd) => behavior::handle_command(cmd),
        Commands::Modbus(cmd) => modbus::handle_command(cmd).await,
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_parse_cron_next() {
        let cli = Cli::try_parse_from([
            "flowctl",
            "--no-color",
            "cron",
            "next",
            "*/15",
            "--count",
            "3",
            "--backward",
        ])
        .unwrap();
        assert!(cli.no_color);
        match cli.command {
            Commands::Cron(cron::CronCommands::Next {
                entry,
                count,
                backward,
                ..
            }) => {
                assert_eq!(entry, "*/15");
                assert_eq!(count, 3);
                assert!(backward);
            },
            _ => panic!("expected cron next"),
        }
    }

    #[test]
    fn test_parse_modbus_decode() {
        let cli =
            Cli::try_parse_from(["flowctl", "modbus", "decode", "01 03", "--rtu", "-v"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::Modbus(modbus::ModbusCommands::Decode {
                rtu: true,
                response: false,
                ..
            })
        ));
    }

    #[test]
    fn test_missing_subcommand() {
        assert!(Cli::try_parse_from(["flowctl", "cron"]).is_err());
    }
}
