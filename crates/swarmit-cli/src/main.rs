//! swarmit agent CLI.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "swarmit")]
#[command(about = "Agent for a shared swarm job pool", long_about = None)]
struct Cli {
    /// Agent configuration file
    #[arg(long, global = true, env = "SWARMIT_CONFIG", default_value = "swarm.kdl")]
    config: PathBuf,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Work the group's jobs until none are left
    Run {
        /// Shell command run for each job; exit status 0 closes the job
        #[arg(long)]
        exec: String,
        /// Stop after this many pick cycles
        #[arg(long)]
        max_cycles: Option<u64>,
        /// Kill the job command after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Run a single pick cycle and print the decision as JSON
    Pick,
    /// Validate a configuration file
    Validate {
        /// Path to the configuration file (defaults to --config)
        path: Option<PathBuf>,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Commands::Run {
            exec,
            max_cycles,
            timeout_secs,
        } => {
            commands::run::run(&cli.config, &exec, max_cycles, timeout_secs).await?;
        }
        Commands::Pick => {
            commands::pick::pick(&cli.config).await?;
        }
        Commands::Validate { path } => {
            commands::validate::validate(path.as_deref().unwrap_or(&cli.config))?;
        }
    }

    Ok(())
}
