//! planvault CLI - operator tooling for the backup lifecycle
//!
//! Usage:
//!   planvault-cli backup create
//!   planvault-cli backup list
//!   planvault-cli backup stats
//!   planvault-cli backup restore <name> --yes
//!   planvault-cli backup sweep [--days <n>]
//!
//! Configuration comes from the environment (DATABASE_PATH, BACKUP_DIR,
//! BACKUP_RETENTION_DAYS), read once at startup.

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use planvault_lib::backup::BackupEngine;
use planvault_lib::config::StoreConfig;

#[derive(Debug, Parser)]
#[command(name = "planvault-cli")]
#[command(about = "Backup lifecycle tooling for the plans database")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Backup {
        #[command(subcommand)]
        command: BackupCommand,
    },
}

#[derive(Debug, Subcommand)]
enum BackupCommand {
    /// Snapshot the live database, then sweep expired snapshots
    Create,
    /// List cataloged snapshots, newest first
    List,
    /// Aggregate snapshot statistics as JSON
    Stats,
    /// Promote a snapshot over the live database
    Restore(RestoreArgs),
    /// Delete snapshots older than the retention window
    Sweep(SweepArgs),
}

#[derive(Debug, Args)]
struct RestoreArgs {
    /// Snapshot filename as shown by `backup list`
    name: String,
    /// Confirm replacing the live database
    #[arg(long, default_value_t = false)]
    yes: bool,
}

#[derive(Debug, Args)]
struct SweepArgs {
    /// Override the configured retention window
    #[arg(long)]
    days: Option<u32>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "planvault_lib=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = StoreConfig::from_env();

    match cli.command {
        Command::Backup { command } => run_backup(command, config),
    }
}

fn run_backup(command: BackupCommand, mut config: StoreConfig) -> Result<()> {
    match command {
        BackupCommand::Create => {
            let engine = BackupEngine::new(&config)?;
            let info = engine.create_backup()?;
            println!("Backup created: {}", info.path.display());

            let removed = engine.cleanup_old_backups()?;
            if removed > 0 {
                println!("{removed} old backup(s) removed");
            }

            let stats = engine.stats()?;
            println!(
                "Total backups: {} ({} MB)",
                stats.total_backups, stats.total_size_mb
            );
        }
        BackupCommand::List => {
            let engine = BackupEngine::new(&config)?;
            let backups = engine.list_backups()?;
            if backups.is_empty() {
                println!("No backups found");
                return Ok(());
            }
            for info in backups {
                println!(
                    "{}  {:>12} bytes  {} day(s) old",
                    info.filename, info.size_bytes, info.age_days
                );
            }
        }
        BackupCommand::Stats => {
            let engine = BackupEngine::new(&config)?;
            let stats = engine.stats()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        BackupCommand::Restore(args) => {
            if !args.yes {
                bail!("restore replaces the live database; re-run with --yes to continue");
            }
            let engine = BackupEngine::new(&config)?;
            engine.restore_named(&args.name)?;
            println!("Backup restored: {}", args.name);
        }
        BackupCommand::Sweep(args) => {
            if let Some(days) = args.days {
                config.retention_days = days;
            }
            let engine = BackupEngine::new(&config)?;
            let removed = engine.cleanup_old_backups()?;
            println!("{removed} backup(s) removed");
        }
    }

    Ok(())
}
