//! Kanban CLI entry point.

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use kanban_cli::cli::{self, Cli};
use kanban_cli::commands;

#[tokio::main]
async fn main() {
    // Local overrides first, then the user-level file; neither replaces
    // variables that are already set.
    let _ = dotenvy::from_filename(".env.local");
    if let Some(path) = cli::env_file().filter(|p| p.exists()) {
        let _ = dotenvy::from_path(&path);
    }

    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level().to_string()));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = commands::execute(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
