//! Command-line interface for parlor_games.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parlor Games - server-authoritative rooms for small board games
#[derive(Parser, Debug)]
#[command(name = "parlor_games")]
#[command(about = "Real-time multiplayer board game server", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the game server
    Serve {
        /// TOML config file; defaults apply when absent
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Seed the dice for a reproducible run
        #[arg(long)]
        dice_seed: Option<u64>,
    },

    /// Register a player and print their access token
    RegisterUser {
        /// Display name
        name: String,

        /// Path to the database file (created if it doesn't exist)
        #[arg(long, env = "DATABASE_URL", default_value = "parlor_games.db")]
        database_url: String,
    },

    /// Show a player's win/loss record
    Stats {
        /// Display name
        name: String,

        /// Path to the database file
        #[arg(long, env = "DATABASE_URL", default_value = "parlor_games.db")]
        database_url: String,
    },
}
