use clap::{Parser, Subcommand};

mod commands;

use commands::{
    AddBotArgs, ExecutionsArgs, PerformanceArgs, RunArgs, StrategiesArgs, ValidateArgs,
};

#[derive(Parser)]
#[command(name = "autotrade")]
#[command(about = "Autonomous trading-bot engine", long_about = None)]
struct Cli {
    /// Config file path (defaults to config/Config.toml plus AUTOTRADE_ overrides)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine against the paper exchange until Ctrl-C
    Run(RunArgs),
    /// Validate and store a bot definition from a JSON file
    AddBot(AddBotArgs),
    /// List stored bots with their lifecycle state
    Bots,
    /// List available strategies, or describe one
    Strategies(StrategiesArgs),
    /// Validate a bot definition without storing it
    Validate(ValidateArgs),
    /// Show a bot's execution log
    Executions(ExecutionsArgs),
    /// Show a bot's performance report
    Performance(PerformanceArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match &cli.config {
        Some(path) => autotrade_core::ConfigLoader::load_from(path)?,
        None => autotrade_core::ConfigLoader::load()?,
    };

    match cli.command {
        Commands::Run(args) => commands::run_engine(&config, args).await?,
        Commands::AddBot(args) => commands::run_add_bot(&config, args).await?,
        Commands::Bots => commands::run_list_bots(&config).await?,
        Commands::Strategies(args) => commands::run_strategies(&args)?,
        Commands::Validate(args) => commands::run_validate(&args)?,
        Commands::Executions(args) => commands::run_executions(&config, args).await?,
        Commands::Performance(args) => commands::run_performance(&config, args).await?,
    }

    Ok(())
}
