use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lagcheck_config::LoadConfig;
use tracing_subscriber::EnvFilter;

mod commands;
mod store;

#[derive(Parser)]
#[command(
    name = "lagcheck",
    version,
    about = "Steady-rate write load with an eventual-consistency check"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive writes against the configured store and audit what it returns
    Run(commands::run::RunArgs),
    /// Show effective configuration
    Config,
}

fn find_config() -> Option<PathBuf> {
    // 1. LAGCHECK_CONFIG environment variable
    if let Ok(path) = std::env::var("LAGCHECK_CONFIG") {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. lagcheck.yaml in current directory
    let cwd_config = PathBuf::from("lagcheck.yaml");
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    // 3. ~/.config/lagcheck/config.yaml
    if let Some(home) = dirs_next::home_dir() {
        let home_config = home.join(".config/lagcheck/config.yaml");
        if home_config.exists() {
            return Some(home_config);
        }
    }

    None
}

fn init_tracing() {
    // stdout carries the report lines, so logs go to stderr
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();

    // Without a file every option comes from defaults and LAGCHECK_* variables
    let mut config = match cli.config.or_else(find_config) {
        Some(path) => LoadConfig::from_file(&path)?,
        None => LoadConfig::default(),
    };
    config.apply_process_env()?;

    match cli.command {
        Commands::Run(args) => commands::run::run(config, args).await?,
        Commands::Config => commands::config::run(&config)?,
    }

    Ok(())
}
