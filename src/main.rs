mod ansible;
mod commands;
mod context;
mod import;
mod meta;
mod output;
mod settings;
mod traits;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{DisplayCommand, ImportCommand, ListCommand};
use context::Context;
use import::ImportError;
use settings::{DEFAULT_SSH_TIMEOUT_SECS, Settings};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tiup-cluster")]
#[command(about = "Deploy and manage TiDB clusters, including ones imported from TiDB-Ansible", long_about = None)]
#[command(version)]
struct Cli {
    /// Timeout in seconds for SSH connections and host checks
    #[arg(long, global = true, default_value_t = DEFAULT_SSH_TIMEOUT_SECS,
          value_parser = clap::value_parser!(u64).range(1..))]
    ssh_timeout: u64,

    /// Print debug logs to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import an existing TiDB cluster from TiDB-Ansible
    Import(ImportCommand),

    /// List all clusters
    List,

    /// Display information of a cluster
    Display(DisplayCommand),
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let ctx = Context::new(Settings::load()?);
    tracing::debug!(
        storage = %ctx.settings.storage_root.display(),
        key = %ctx.settings.ssh_key_path.display(),
        "settings loaded"
    );

    match cli.command {
        Commands::Import(cmd) => cmd.execute(&ctx, Duration::from_secs(cli.ssh_timeout)),
        Commands::List => ListCommand::execute(&ctx),
        Commands::Display(cmd) => cmd.execute(&ctx),
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli) {
        output::error(&format!("{:#}", err));
        if let Some(suggestion) = err
            .downcast_ref::<ImportError>()
            .and_then(ImportError::suggestion)
        {
            eprintln!("{}", suggestion);
        }
        std::process::exit(1);
    }
}
