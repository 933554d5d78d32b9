use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use vitesse::pipeline::{run_levels, Level};
use vitesse::State;

#[derive(Parser)]
#[command(name = "vitesse")]
#[command(version = "0.1")]
#[command(about = "Speed profiles of speech trajectories in embedding space", long_about = None)]
struct Cli {
    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute transition tables for the given levels (all when omitted)
    Run {
        #[arg(short, long = "level", value_enum)]
        levels: Vec<Level>,
    },
    /// Print the resolved configuration
    Config,
}

fn run_command(state: &State, levels: Vec<Level>) -> Result<()> {
    let levels = if levels.is_empty() {
        Level::ALL.to_vec()
    } else {
        levels
    };

    let outcomes = run_levels(state, &levels)?;
    let failed: Vec<&str> = outcomes
        .iter()
        .filter(|(_, outcome)| outcome.is_err())
        .map(|(level, _)| level.name())
        .collect();

    if !failed.is_empty() {
        anyhow::bail!("{} level(s) failed: {}", failed.len(), failed.join(", "));
    }
    Ok(())
}

fn config_command(state: &State) -> Result<()> {
    state.print_config();
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();
    let mut state = State::new()?;
    state.verbose |= args.verbose;

    let default_level = if state.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Commands::Run { levels } => run_command(&state, levels)?,
        Commands::Config => config_command(&state)?,
    }
    Ok(())
}
