use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use coinwatch::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a configuration interactively
    Setup,
    /// Change tracked cryptocurrencies, currency, interval or holdings
    Options,
    /// Fetch quotes once and print every reading
    Show,
    /// Keep readings updated until interrupted
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let config_path = cli.config_path.as_deref();
    let result = match cli.command {
        Some(Commands::Setup) => coinwatch::cli::setup::setup(config_path).await,
        Some(Commands::Options) => coinwatch::cli::setup::options(config_path).await,
        Some(Commands::Show) => {
            coinwatch::run_command(coinwatch::AppCommand::Show, config_path).await
        }
        Some(Commands::Watch) => {
            coinwatch::run_command(coinwatch::AppCommand::Watch, config_path).await
        }
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
