//! Main CLI application structure

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use super::output::{Output, OutputFormat};
use super::{date_cmd, delta_cmd, log_cmd, update_cmd};
use crate::storage::{Config, Corpus};

#[derive(Parser)]
#[command(name = "cves")]
#[command(author, version, about = "Track and publish changes to a git-backed record corpus")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Enable verbose output for debugging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Configuration file (replaces ./cves.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Repository base directory (overrides config and CVES_BASE_DIRECTORY)
    #[arg(long, global = true)]
    pub base_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the current time as ISO (UTC) and local time
    Date,

    /// Build a delta from git history
    Delta(delta_cmd::DeltaArgs),

    /// Fetch changed records from the record service
    Update(update_cmd::UpdateArgs),

    /// Show the delta log
    Log(log_cmd::LogArgs),
}

/// Parses arguments and runs the command
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let output = Output::new(cli.format, cli.verbose);

    // date needs no corpus or configuration
    if let Commands::Date = cli.command {
        return date_cmd::run(&output);
    }

    let corpus = open_corpus(&cli)?;
    output.verbose_ctx("config", &format!("base directory: {}", corpus.base_dir().display()));

    match cli.command {
        Commands::Date => date_cmd::run(&output),
        Commands::Delta(args) => delta_cmd::run(&corpus, args, &output),
        Commands::Update(args) => update_cmd::run(&corpus, args, &output),
        Commands::Log(args) => log_cmd::run(&corpus, args, &output),
    }
}

fn open_corpus(cli: &Cli) -> Result<Corpus> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let mut config = Config::load(&cwd, cli.config.as_deref())?;

    if let Some(dir) = &cli.base_dir {
        config.repository.base_dir = dir.clone();
    }

    Ok(Corpus::open(cwd, config))
}

/// Installs the stderr subscriber; `RUST_LOG` wins over `--verbose`
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
