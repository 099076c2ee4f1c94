use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

use commands::{health, seed};

/// Platter CLI - Command line interface for the Platter API
#[derive(Parser)]
#[command(name = "plat")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check API health and status
    Health {
        /// Output format (json, text)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Base URL of the API server
        #[arg(short, long, default_value = "http://localhost:3000")]
        url: String,
    },

    /// Seed data management commands
    Seed {
        #[command(subcommand)]
        action: SeedAction,
    },
}

#[derive(Subcommand)]
enum SeedAction {
    /// Import fixture data into the database
    Import {
        /// Directory holding the sqlite database
        #[arg(long, env = "DATA_PATH", default_value = "./data")]
        data_dir: PathBuf,

        /// Directory holding the fixture JSON files
        #[arg(long, default_value = "fixtures")]
        fixtures: PathBuf,
    },

    /// Delete all seeded data from the database
    Destroy {
        /// Directory holding the sqlite database
        #[arg(long, env = "DATA_PATH", default_value = "./data")]
        data_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before clap resolves env-backed arguments
    dotenv::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    // Execute the command
    match cli.command {
        Commands::Health { format, url } => {
            health::execute(format, url).await?;
        }
        Commands::Seed { action } => match action {
            SeedAction::Import { data_dir, fixtures } => {
                seed::import(data_dir, fixtures).await?;
            }
            SeedAction::Destroy { data_dir } => {
                seed::destroy(data_dir).await?;
            }
        },
    }

    Ok(())
}
