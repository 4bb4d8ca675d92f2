mod commands;
mod progress;
mod utils;

use clap::{Parser, Subcommand};
use stackup_cloud::RunStatus;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stackup")]
#[command(about = "Provision the microservice stack, one resource at a time", long_about = None)]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision every resource of the stack
    Up {
        /// Where to write the KEY=VALUE output file
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Azure region (overrides configuration)
        #[arg(short, long)]
        region: Option<String>,
        /// Azure subscription to provision into
        #[arg(long, env = "AZURE_SUBSCRIPTION_ID")]
        subscription: Option<String>,
        /// Run against the in-memory mock provider instead of Azure
        #[arg(long)]
        dry_run: bool,
        /// Make the mock provider fail the given step (repeatable)
        #[arg(long = "fail-step", value_name = "STEP", requires = "dry_run")]
        fail_steps: Vec<String>,
    },
    /// Validate and print the plan without creating anything
    Plan {
        /// Azure region (overrides configuration)
        #[arg(short, long)]
        region: Option<String>,
    },
    /// Print the resource names a run would use
    Names {
        /// Run seed (defaults to the current time in milliseconds)
        #[arg(long, allow_negative_numbers = true)]
        seed: Option<i64>,
    },
    /// Show version information
    Version,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Up {
            output,
            region,
            subscription,
            dry_run,
            fail_steps,
        } => {
            let (config, file) = utils::load_config(region, output)?;
            let client = commands::up::client(dry_run, subscription, fail_steps);
            let status = commands::up::handle(&config, file.as_deref(), client.as_ref()).await?;
            if status != RunStatus::Completed {
                std::process::exit(1);
            }
        }
        Commands::Plan { region } => {
            let (config, file) = utils::load_config(region, None)?;
            commands::plan::handle(&config, file.as_deref())?;
        }
        Commands::Names { seed } => {
            let (config, _) = utils::load_config(None, None)?;
            commands::names::handle(&config, seed)?;
        }
        Commands::Version => {
            println!("stackup {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
