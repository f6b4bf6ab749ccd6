mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use tracing::warn;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use captcha_resolver_core::{AppConfig, StrategyId};

use crate::cli::{Cli, Commands};

fn main() -> Result<()> {
    // OCR subprocesses and image filters run on the blocking pool.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_str = std::fs::read_to_string(&cli.config).unwrap_or_else(|_| {
        warn!(path = %cli.config, "config file not found, using defaults");
        include_str!("../config/default.toml").to_string()
    });
    let mut config: AppConfig = toml::from_str(&config_str)?;
    apply_env_overrides(&mut config);

    match cli.command {
        Commands::Solve { image, url, base, methods, json } => {
            commands::solve::run(config, image, url, base, methods, json).await?;
        }
        Commands::Check => {
            commands::check::run(config).await?;
        }
        Commands::Correct { text, limit } => {
            commands::correct::run(&text, limit);
        }
    }

    Ok(())
}

fn apply_env_overrides(config: &mut AppConfig) {
    if let Ok(v) = std::env::var("CAPTCHA_ORDER") {
        match StrategyId::parse_list(&v) {
            Ok(order) if !order.is_empty() => config.resolver.order = order,
            Ok(_) => warn!("CAPTCHA_ORDER is empty, keeping configured order"),
            Err(e) => warn!(error = %e, "ignoring invalid CAPTCHA_ORDER"),
        }
    }
    if let Ok(v) = std::env::var("CAPTCHA_STRATEGY_TIMEOUT") {
        match v.parse::<u64>() {
            Ok(secs) if secs > 0 => config.resolver.strategy_timeout_seconds = secs,
            _ => warn!(value = %v, "ignoring invalid CAPTCHA_STRATEGY_TIMEOUT"),
        }
    }
    if let Ok(v) = std::env::var("EASYOCR_BIN") {
        config.local.easyocr_bin = v;
    }
    if let Ok(v) = std::env::var("TESSERACT_BIN") {
        config.local.tesseract_bin = v;
    }
}
