pub mod cli;
pub mod config;
pub mod pipeline;
pub mod session;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::config::EngineConfig;
use crate::pipeline::authorization::AuthorizationEngine;

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();
}

pub fn run() -> anyhow::Result<()> {
    // Local .env is optional
    dotenvy::dotenv().ok();
    init_tracing();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let cli = cli::Cli::parse();
    let engine = AuthorizationEngine::from_env(EngineConfig::from_env());

    let stdout = std::io::stdout();
    cli::execute(cli.command, &engine, &mut stdout.lock())
}
