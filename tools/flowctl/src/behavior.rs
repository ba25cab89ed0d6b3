//! Behavior metadata validation

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use colored::*;
use pointflow_behavior::{BehaviorChain, BehaviorError, ProcessorConfig};

#[derive(Subcommand)]
pub enum BehaviorCommands {
    /// Set up every relation of a processor config
    #[command(about = "Validate points, relations and behavior chains in a YAML file")]
    Validate {
        /// Processor configuration (YAML)
        config: PathBuf,
    },
}

pub fn handle_command(cmd: BehaviorCommands) -> Result<()> {
    match cmd {
        BehaviorCommands::Validate { config } => {
            let processor = ProcessorConfig::load(&config)
                .with_context(|| format!("Failed to read {}", config.display()))?;
            let report = validate(&processor)?;

            println!(
                "{} {} ({} points, {} relations)",
                "Validating".bright_cyan(),
                config.display(),
                processor.points.len(),
                report.len()
            );
            let mut rejected = 0;
            for (name, outcome) in &report {
                match outcome {
                    Ok(chain) => println!("  {} {}", "✓".green(), chain),
                    Err(errors) => {
                        rejected += 1;
                        println!("  {} {}", "✗".red(), name);
                        for e in errors {
                            println!("      {}", e.to_string().yellow());
                        }
                    },
                }
            }

            if rejected > 0 {
                bail!("{} of {} relations rejected", rejected, report.len());
            }
            println!("{}", "All behavior chains are valid".green());
            Ok(())
        },
    }
}

type Outcome = std::result::Result<BehaviorChain, Vec<BehaviorError>>;

/// Setup and validation outcome per relation, keyed by `input -> result`
///
/// Unknown points or behavior names abort the whole run.
fn validate(processor: &ProcessorConfig) -> Result<Vec<(String, Outcome)>> {
    let relations = processor.relations().context("Invalid relation metadata")?;
    Ok(relations
        .into_iter()
        .map(|(relation, links)| {
            let name = format!("{} -> {}", relation.input.name, relation.result.name);
            let outcome = BehaviorChain::set_up(relation, links)
                .map_err(|e| vec![e])
                .and_then(|chain| chain.validate().map(|()| chain));
            (name, outcome)
        })
        .collect())
}
