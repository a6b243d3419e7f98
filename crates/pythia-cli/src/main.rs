//! Pythia CLI - an AI agent living in a folder
//!
//! Usage:
//!   pythia watch                 Watch the folder until Ctrl-C
//!   pythia init                  Write a default config and create the folder
//!   pythia history <file>        List snapshots of a file
//!   pythia rollback <file>       Restore the newest snapshot of a file
//!   pythia recall <query>        Ask memory what it knows

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pythia_brain::{get_api_key, AnthropicBrain, AnthropicClient};
use pythia_core::PythiaConfig;
use pythia_daemon::{ensure_folder, Daemon};
use pythia_history::{BackupStore, RollbackEngine};
use pythia_memory::{KnowledgeStore, Memory};
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "pythia")]
#[command(author, version, about = "An AI agent that lives in a folder")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file
    #[arg(short, long, global = true, default_value = "pythia.toml")]
    config: PathBuf,

    /// Folder to watch (overrides config and environment)
    #[arg(short, long, global = true)]
    folder: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the folder and act on file changes
    Watch,

    /// Write a default config file and create the watched folder
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// List the snapshots kept for a file, oldest first
    History {
        /// File name inside the watched folder
        filename: String,
    },

    /// Restore a file from its newest snapshot
    Rollback {
        /// File name inside the watched folder
        filename: String,
    },

    /// Show what memory recalls for a query
    Recall {
        query: String,

        /// Number of results
        #[arg(short = 'n', long, default_value = "3")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Watch => cmd_watch(config).await,
        Commands::Init { force } => cmd_init(&cli.config, config, force),
        Commands::History { filename } => cmd_history(&config, &filename),
        Commands::Rollback { filename } => cmd_rollback(&config, &filename),
        Commands::Recall { query, limit } => cmd_recall(&config, &query, limit).await,
    }
}

/// Config file, then `.env` and environment, then `--folder`.
fn load_config(cli: &Cli) -> Result<PythiaConfig> {
    if let Ok(path) = dotenvy::dotenv() {
        info!("Loaded environment from {}", path.display());
    }

    let mut config = PythiaConfig::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    config.apply_env();
    if let Some(folder) = &cli.folder {
        config.watch.target_folder = folder.clone();
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn cmd_watch(config: PythiaConfig) -> Result<()> {
    let api_key = get_api_key(&config.brain.api_key_env).with_context(|| {
        format!(
            "Set {} (or add it to .env) before starting the watcher",
            config.brain.api_key_env
        )
    })?;

    let client = AnthropicClient::from_config(api_key, &config.brain)
        .context("Failed to configure the Anthropic client")?;
    let memory = KnowledgeStore::from_config(&config.memory)
        .context("Failed to open the knowledge store")?;

    info!(
        model = %client.model(),
        store = %memory.path().display(),
        "The Oracle is waking up"
    );

    let daemon = Daemon::new(&config, AnthropicBrain::new(client), memory);
    daemon
        .run_until(tokio::signal::ctrl_c())
        .await
        .context("Watcher stopped with an error")?;
    Ok(())
}

fn cmd_init(config_path: &Path, config: PythiaConfig, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        println!(
            "Config {} already exists (use --force to overwrite)",
            config_path.display()
        );
    } else {
        PythiaConfig::write_default(config_path)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
        println!("Wrote {}", config_path.display());
    }

    let folder = &config.watch.target_folder;
    if ensure_folder(folder)? {
        println!("Created {}", folder.display());
    } else {
        println!("Watching {} (already exists)", folder.display());
    }

    println!("\nNext steps:");
    println!("  1. Put ANTHROPIC_API_KEY in your environment or .env");
    println!("  2. Run 'pythia watch'");
    println!("  3. Create an empty file such as Project_Ideas.md in the folder");
    Ok(())
}

fn cmd_history(config: &PythiaConfig, filename: &str) -> Result<()> {
    let store = BackupStore::new(&config.watch.target_folder, &config.watch.history_dir);
    let snapshots = store.list(filename)?;

    if snapshots.is_empty() {
        println!("No snapshots for {}", filename);
        return Ok(());
    }

    println!("Snapshots for {}", filename);
    println!("==================");
    for snapshot in &snapshots {
        println!(
            "  {}  {}",
            snapshot.timestamp.format("%Y-%m-%d %H:%M:%S"),
            snapshot.file_name()
        );
    }
    println!("\n{} snapshot(s)", snapshots.len());
    Ok(())
}

fn cmd_rollback(config: &PythiaConfig, filename: &str) -> Result<()> {
    let path = config.watch.target_folder.join(filename);
    if !path.is_file() {
        bail!("{} does not exist", path.display());
    }

    let store = BackupStore::new(&config.watch.target_folder, &config.watch.history_dir);
    let engine = RollbackEngine::new(store);
    let content = engine.rollback(filename)?;

    std::fs::write(&path, &content)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Restored {} from its newest snapshot", filename);
    Ok(())
}

async fn cmd_recall(config: &PythiaConfig, query: &str, limit: usize) -> Result<()> {
    let memory = KnowledgeStore::from_config(&config.memory)
        .context("Failed to open the knowledge store")?;
    let hits = memory.recall(query, limit).await?;

    if hits.is_empty() {
        println!("Nothing remembered for '{}'", query);
        return Ok(());
    }

    for hit in hits {
        println!("{} (score {:.3})", hit.filename, hit.score);
        let preview: String = hit.content.chars().take(200).collect();
        for line in preview.lines().take(4) {
            println!("    {}", line);
        }
        println!();
    }
    Ok(())
}
