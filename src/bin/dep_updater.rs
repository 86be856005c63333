use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use dep_updater::config::DEFAULT_CONFIG_FILE;
use dep_updater::logging::{self, LoggingOptions};
use dep_updater::{Config, GitProvider, Operation, Orchestrator};

/// Updates pinned dependency versions across the configured projects.
#[derive(Parser, Debug)]
#[command(name = "dep-updater")]
#[command(version, about, long_about = None)]
struct Cli {
    /// File with the update configuration. This could be a complete path
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Minimum log level (debug, info, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Directory receiving the run log file
    #[arg(long, global = true, default_value = ".")]
    log_dir: PathBuf,

    /// Process at most this many projects at once
    #[arg(short, long, global = true)]
    jobs: Option<NonZeroUsize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Update dependency versions in each project's manifest
    Update,
    /// Commit and push the working branch of each project
    Push,
}

impl From<Command> for Operation {
    fn from(command: Command) -> Self {
        match command {
            Command::Update => Operation::Update,
            Command::Push => Operation::Push,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::from(1)
        }
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let guard = logging::init(&LoggingOptions {
        level: cli.log_level.clone(),
        log_dir: cli.log_dir.clone(),
    })?;

    let result = execute(cli, cli.command.into()).await;
    match &result {
        Ok(()) => println!(
            "{} {}",
            "Log:".cyan(),
            guard.log_file_path().display().to_string().dimmed()
        ),
        Err(e) => tracing::error!("{:#}", e),
    }
    result
}

async fn execute(cli: &Cli, operation: Operation) -> Result<()> {
    let mut config = load_config(&cli.config)?;
    if let Some(jobs) = cli.jobs {
        config.max_concurrency = Some(jobs.get());
    }

    let provider = GitProvider::new(&config.repository);
    let orchestrator = Orchestrator::new(config, provider);
    let report = orchestrator.run(operation).await?;

    report.summary.print();
    Ok(())
}

fn load_config(path: &Path) -> Result<Config> {
    Config::load(path).with_context(|| format!("failed to load configuration {}", path.display()))
}
