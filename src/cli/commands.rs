use crate::api::ForecastClient;
use crate::config::StationConfig;
use crate::db::{Database, ForecastStore};
use crate::error::{AppError, Result};
use crate::forecast::{handle_forecast, FileSink};
use crate::station::{SimulatedSensor, Station, StationOptions};
use chrono::{Local, SubsecRound};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing::{info, warn};

/// Weather station: samples the environment sensor and ingests weather forecasts
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (default: $HOME/.config/weatherstation.json, then /etc/weatherstation.json)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Test run: a single cycle without waiting
    #[arg(short, long)]
    pub test: bool,

    /// Running as a service: JSON logs, no console echo
    #[arg(short, long)]
    pub service: bool,

    /// Verbose logging (info)
    #[arg(short, long)]
    pub verbose: bool,

    /// Debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Log level used when `RUST_LOG` is not set.
    pub fn default_log_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else if self.verbose {
            "info"
        } else {
            "warn"
        }
    }
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Run the measurement loop (default)
    Run,

    /// Create the measurement and forecast tables
    InitDb,

    /// Run one forecast poll now, without reading the sensor
    Forecast,
}

/// CLI application
pub struct App {
    config: StationConfig,
    options: StationOptions,
}

impl App {
    /// Loads the configuration for the given command line.
    pub fn new(cli: &Cli) -> Result<Self> {
        let config = StationConfig::load(cli.config.as_deref())?;
        config.log_summary();
        Ok(Self {
            config,
            options: StationOptions {
                service: cli.service,
                test_run: cli.test,
            },
        })
    }

    /// Run the selected command
    pub async fn run(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Run => self.run_station().await,
            Commands::InitDb => self.init_db().await,
            Commands::Forecast => self.forecast_once().await,
        }
    }

    async fn run_station(&self) -> Result<()> {
        let sensor = SimulatedSensor::new(self.config.station_altitude);
        Station::open(self.config.clone(), sensor, self.options)
            .await?
            .run()
            .await
    }

    async fn init_db(&self) -> Result<()> {
        let db = Database::connect(&self.config.db_connection).await?;
        let result = db
            .init_schema(
                &self.config.db_connection.table,
                &self.config.forecast.forecast_tables,
            )
            .await;
        db.close().await;
        if result.is_ok() && !self.options.service {
            println!("{}", "Database schema initialized.".green());
        }
        result
    }

    async fn forecast_once(&self) -> Result<()> {
        let fc = &self.config.forecast;
        if !fc.enabled {
            return Err(AppError::Config(
                "forecast is disabled in the configuration".into(),
            ));
        }

        let db = if fc.forecast_db_out {
            Some(Database::connect(&self.config.db_connection).await?)
        } else {
            None
        };
        let mut sink = match (&fc.forecast_file_name, fc.forecast_file_out) {
            (Some(path), true) => Some(FileSink::open(path)?),
            _ => None,
        };
        let client = ForecastClient::new(&fc.source.url, fc.source.payload.clone());
        let measured_at = Local::now().naive_local().trunc_subsecs(0);

        info!("Forecast poll at {}", measured_at);
        let result = handle_forecast(
            fc,
            &client,
            measured_at,
            None,
            db.as_ref().map(|db| db as &dyn ForecastStore),
            sink.as_mut(),
        )
        .await;

        if let Some(mut sink) = sink {
            if let Err(e) = sink.close() {
                warn!("Could not close forecast file: {}", e);
            }
        }
        if let Some(db) = db {
            db.close().await;
        }

        if let Some(outcome) = result? {
            if !self.options.service {
                println!(
                    "{} {} hourly, {} daily, {} alerts",
                    "Forecast:".cyan().bold(),
                    outcome.data.hourly.len(),
                    outcome.data.daily.len(),
                    outcome.data.alerts.len()
                );
                if let Some(stored) = outcome.stored {
                    println!(
                        "{} hourly -{} +{}, daily -{} +{}, {} alerts",
                        "Stored:".green(),
                        stored.hourly_deleted,
                        stored.hourly_inserted,
                        stored.daily_deleted,
                        stored.daily_inserted,
                        outcome.alerts_stored
                    );
                }
                if outcome.file_written {
                    println!("{} entry appended", "File:".green());
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use rstest::rstest;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_command_means_run() {
        let cli = Cli::try_parse_from(["weatherstation"]).unwrap();
        assert_eq!(cli.command, None);
        assert!(!cli.test);
    }

    #[test]
    fn parses_flags_and_command() {
        let cli = Cli::try_parse_from([
            "weatherstation",
            "-c",
            "/tmp/ws.json",
            "-t",
            "-s",
            "--log-file",
            "/tmp/ws.log",
            "init-db",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/ws.json")));
        assert!(cli.test);
        assert!(cli.service);
        assert_eq!(cli.log_file, Some(PathBuf::from("/tmp/ws.log")));
        assert_eq!(cli.command, Some(Commands::InitDb));
    }

    #[rstest]
    #[case(&["weatherstation"], "warn")]
    #[case(&["weatherstation", "-v"], "info")]
    #[case(&["weatherstation", "-d"], "debug")]
    #[case(&["weatherstation", "-v", "-d"], "debug")]
    fn picks_default_log_level(#[case] args: &[&str], #[case] level: &str) {
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.default_log_level(), level);
    }

    #[tokio::test]
    async fn forecast_command_requires_enabled_forecast() {
        let app = App {
            config: StationConfig::default(),
            options: StationOptions::default(),
        };
        assert!(matches!(
            app.run(Commands::Forecast).await,
            Err(AppError::Config(_))
        ));
    }
}
