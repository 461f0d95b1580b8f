mod api;
mod cli;
mod config;
mod db;
mod error;
mod forecast;
mod models;
mod station;

use anyhow::Context;
use clap::Parser;
use cli::{App, Cli, Commands};
use colored::*;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Sets up the global subscriber. The returned guard must live until exit so
/// buffered file logs are flushed.
fn init_tracing(cli: &Cli) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.default_log_level()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let guard = match &cli.log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let name = path
                .file_name()
                .with_context(|| format!("log file path {} has no file name", path.display()))?;
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            let builder = builder.with_writer(writer).with_ansi(false);
            if cli.service {
                builder.json().init();
            } else {
                builder.init();
            }
            Some(guard)
        },
        None => {
            if cli.service {
                builder.json().init();
            } else {
                builder.init();
            }
            None
        },
    };
    Ok(guard)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    dotenv::dotenv().ok();
    let _guard = init_tracing(&cli)?;

    info!("Initializing weatherstation...");

    let app = match App::new(&cli) {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to initialize application: {:?}", e);
            if !cli.service {
                println!("{} {}", "Error:".red(), e.to_string().red());
            }
            return Err(e).context("loading configuration");
        },
    };

    let command = cli.command.unwrap_or(Commands::Run);
    app.run(command)
        .await
        .with_context(|| format!("{:?} failed", command))?;

    Ok(())
}
