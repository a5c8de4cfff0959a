//! Strategy catalog and bot-definition validation commands.

use anyhow::{anyhow, Result};
use autotrade_core::StrategyKind;
use autotrade_strategy::{default_config, describe, list_available_strategies, validate_strategy_config};
use clap::Args;

#[derive(Args, Debug, Clone)]
pub struct StrategiesArgs {
    /// Strategy type to describe (e.g. "grid", "dca")
    #[arg(long)]
    pub describe: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    /// Bot definition JSON file
    #[arg(short, long)]
    pub file: String,
}

/// # Errors
/// Returns an error for an unknown strategy type.
pub fn run_strategies(args: &StrategiesArgs) -> Result<()> {
    let Some(name) = &args.describe else {
        for info in list_available_strategies() {
            println!("{:<16} {}", info.kind.as_str(), info.name);
        }
        return Ok(());
    };

    let kind: StrategyKind = name.parse()?;
    let info = describe(kind);
    println!("{} ({})", info.name, info.kind);
    println!("{}", info.description);
    println!("Required parameters: {}", info.required_parameters.join(", "));
    println!("Defaults:");
    println!("{}", serde_json::to_string_pretty(&default_config(kind))?);
    Ok(())
}

/// Checks the bot config and its strategy parameters, printing every problem found.
///
/// # Errors
/// Returns an error if the file cannot be read or the definition is invalid.
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    let config = super::read_bot_config(&args.file)?;

    let mut problems = Vec::new();
    if let Err(e) = config.validate() {
        problems.push(e.to_string());
    }
    let report =
        validate_strategy_config(&config.strategy.strategy_type, &config.strategy.parameters);
    problems.extend(report.errors);

    if problems.is_empty() {
        println!("✓ {} is valid", config.id);
        return Ok(());
    }
    for problem in &problems {
        println!("✗ {problem}");
    }
    Err(anyhow!("{} has {} problem(s)", config.id, problems.len()))
}
