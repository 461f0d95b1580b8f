//! The measurement loop.
//!
//! Each cycle reads the sensor, stores the measurement and runs one forecast
//! poll. Cycles run one after another on the current task; Ctrl-C ends the
//! loop at the next await point and resources are released on every exit path.

mod pressure;
mod schedule;
mod sensor;

pub use pressure::reduce_to_sea_level;
pub use schedule::wait_duration;
pub use sensor::{Sensor, SimulatedSensor};

use crate::api::ForecastClient;
use crate::config::StationConfig;
use crate::db::{Database, ForecastStore};
use crate::error::{AppError, Result};
use crate::forecast::{handle_forecast, FileSink};
use crate::models::{Measurement, SensorReading};
use chrono::{Local, SubsecRound};
use colored::Colorize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::time::Duration;
use tracing::{debug, error, info, warn};

const SENSOR_RETRY_DELAY: Duration = Duration::from_secs(2);

/// How the station was started.
#[derive(Debug, Clone, Copy, Default)]
pub struct StationOptions {
    /// Running as a background service: no console echo.
    pub service: bool,
    /// Single cycle without waiting.
    pub test_run: bool,
}

pub struct Station<S: Sensor> {
    config: StationConfig,
    sensor: S,
    options: StationOptions,
    db: Option<Database>,
    measurement_file: Option<BufWriter<File>>,
    forecast_client: Option<ForecastClient>,
    forecast_sink: Option<FileSink<BufWriter<File>>>,
}

impl<S: Sensor> Station<S> {
    /// Connects the database and opens the output files the configuration asks for.
    pub async fn open(config: StationConfig, sensor: S, options: StationOptions) -> Result<Self> {
        let db = if config.needs_database() {
            Some(Database::connect(&config.db_connection).await?)
        } else {
            None
        };

        let measurement_file = match (&config.file_name, config.file_out) {
            (Some(path), true) => {
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                debug!("Measurement file opened: {}", path.display());
                Some(BufWriter::new(file))
            },
            _ => None,
        };

        let fc = &config.forecast;
        let forecast_client = fc
            .enabled
            .then(|| ForecastClient::new(&fc.source.url, fc.source.payload.clone()));
        let forecast_sink = match (&fc.forecast_file_name, fc.enabled && fc.forecast_file_out) {
            (Some(path), true) => Some(FileSink::open(path)?),
            _ => None,
        };

        info!("Sensor: {}", sensor.name());
        Ok(Self {
            config,
            sensor,
            options,
            db,
            measurement_file,
            forecast_client,
            forecast_sink,
        })
    }

    /// Runs until interrupted (or once in test mode), then releases resources.
    pub async fn run(mut self) -> Result<()> {
        info!("Weatherstation started");
        let result = tokio::select! {
            result = self.cycle_loop() => result,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                Ok(())
            },
        };
        if let Err(e) = &result {
            error!("Weatherstation stopped: {}", e);
        }
        self.shutdown().await;
        result
    }

    async fn cycle_loop(&mut self) -> Result<()> {
        let mut no_wait = false;
        loop {
            if !no_wait && !self.options.test_run {
                let wait = wait_duration(self.config.measurement_interval, Local::now().time());
                debug!("Waiting {:.1} s for next cycle", wait.as_secs_f64());
                tokio::time::sleep(wait).await;
            }
            no_wait = false;

            match self.cycle().await {
                Ok(_) => {},
                Err(AppError::Sensor(msg)) if !self.options.test_run => {
                    if !self.options.service {
                        warn!("Sensor read failed, retrying: {}", msg);
                    }
                    no_wait = true;
                    tokio::time::sleep(SENSOR_RETRY_DELAY).await;
                    continue;
                },
                Err(e) => return Err(e),
            }

            if self.options.test_run {
                return Ok(());
            }
        }
    }

    /// One measurement cycle: read, store, forecast.
    async fn cycle(&mut self) -> Result<Measurement> {
        let reading = self.sensor.read()?;
        let measured_at = Local::now().naive_local().trunc_subsecs(0);
        let measurement = Measurement::new(
            measured_at,
            adjust_pressure(reading, self.config.station_altitude),
        );

        let line = measurement.to_csv_line();
        if let Some(file) = self.measurement_file.as_mut() {
            file.write_all(line.as_bytes())?;
            file.flush()?;
        }
        if self.options.service {
            debug!("Measurement: {}", line.trim_end());
        } else {
            echo(&measurement);
        }

        if self.config.db_out {
            if let Some(db) = &self.db {
                db.insert_measurement(&self.config.db_connection.table, &measurement)
                    .await?;
            }
        }

        if let Some(client) = &self.forecast_client {
            let store = self.db.as_ref().map(|db| db as &dyn ForecastStore);
            let outcome = handle_forecast(
                &self.config.forecast,
                client,
                measured_at,
                Some(&measurement),
                store,
                self.forecast_sink.as_mut(),
            )
            .await;
            match outcome {
                Ok(_) => {},
                Err(e) if e.is_transport() => {
                    warn!("Forecast poll failed, continuing with next cycle: {}", e)
                },
                Err(e) => return Err(e),
            }
        }

        Ok(measurement)
    }

    async fn shutdown(&mut self) {
        if let Some(mut sink) = self.forecast_sink.take() {
            if let Err(e) = sink.close() {
                warn!("Could not close forecast file: {}", e);
            }
        }
        if let Some(mut file) = self.measurement_file.take() {
            if let Err(e) = file.flush() {
                warn!("Could not flush measurement file: {}", e);
            }
        }
        if let Some(db) = self.db.take() {
            db.close().await;
        }
        info!("Weatherstation stopped");
    }
}

/// Reduces the pressure to sea level when the station altitude is known.
/// Without a temperature the reading is left as measured.
fn adjust_pressure(reading: SensorReading, altitude: Option<f64>) -> SensorReading {
    match (altitude, reading.pressure, reading.temperature) {
        (Some(h), Some(p), Some(t)) => SensorReading {
            pressure: Some(reduce_to_sea_level(p, h, t)),
            ..reading
        },
        _ => reading,
    }
}

fn echo(m: &Measurement) {
    let value = |v: Option<f64>, unit: &str| match v {
        Some(v) => format!("{:.1} {}", v, unit),
        None => "-".to_string(),
    };
    println!(
        "{}  {}  {}  {}",
        m.timestamp.to_string().dimmed(),
        value(m.temperature, "°C").bold(),
        value(m.humidity, "%").cyan(),
        value(m.pressure, "hPa").green()
    );
}
