//! Parlor Games server binary.

#![warn(missing_docs)]

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use parlor_games::{ProfileService, ServerConfig, serve};
use tracing::{info, instrument};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    initialize_tracing();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            config,
            host,
            port,
            dice_seed,
        } => run_server(config, host, port, dice_seed).await,
        Command::RegisterUser { name, database_url } => register_user(&database_url, name),
        Command::Stats { name, database_url } => show_stats(&database_url, &name),
    }
}

fn initialize_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,parlor_games=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Loads config, applies overrides, and serves.
#[instrument]
async fn run_server(
    config_path: Option<std::path::PathBuf>,
    host: Option<String>,
    port: Option<u16>,
    dice_seed: Option<u64>,
) -> Result<()> {
    let mut config = match &config_path {
        Some(path) => ServerConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ServerConfig::default(),
    }
    .apply_env();
    if let Some(host) = host {
        config = config.with_host(host);
    }
    if let Some(port) = port {
        config = config.with_port(port);
    }
    if dice_seed.is_some() {
        config = config.with_dice_seed(dice_seed);
    }

    info!(addr = %config.bind_addr(), "Starting Parlor Games server");
    serve(config).await
}

/// Creates a user and prints their token.
#[instrument]
fn register_user(database_url: &str, name: String) -> Result<()> {
    let profiles = ProfileService::open(database_url)?;
    let user = profiles.register_user(name)?;
    println!("Registered {} (id {})", user.display_name(), user.id());
    println!("Token: {}", user.token());
    Ok(())
}

/// Prints a user's aggregated record.
#[instrument]
fn show_stats(database_url: &str, name: &str) -> Result<()> {
    let profiles = ProfileService::open(database_url)?;
    let user = profiles
        .find_user(name)?
        .with_context(|| format!("no user named '{name}'"))?;
    let stats = profiles.get_stats(*user.id())?;
    println!(
        "{}: {} games, {} wins, {} losses ({:.1}% win rate)",
        user.display_name(),
        stats.total_games(),
        stats.wins(),
        stats.losses(),
        stats.win_rate()
    );
    Ok(())
}
