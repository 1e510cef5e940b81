use anyhow::Context;
use clap::Parser;
use msync_sdk::SyncConfig;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    let config = match cli.command.config_path() {
        Some(path) => Some(
            SyncConfig::load(path)
                .with_context(|| format!("failed to load config: {}", path.display()))?,
        ),
        None => None,
    };
    init_tracing(cli.verbose, config.as_ref());
    commands::run_command(cli, config)
}

/// `--verbose` wins, then `RUST_LOG`, then the config's `log_filter`.
fn init_tracing(verbose: bool, config: Option<&SyncConfig>) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(config.map_or("warn", |c| c.log_filter.as_str()))
        })
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
