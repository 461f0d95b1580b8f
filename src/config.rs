//! Station configuration.
//!
//! Configuration is read from a JSON file (`weatherstation.json`). Lookup order:
//! 1. The path given on the command line (must exist)
//! 2. `$HOME/.config/weatherstation.json`
//! 3. `/etc/weatherstation.json`
//! 4. Built-in defaults
//!
//! After loading, `.env`/environment overrides are applied (`DATABASE_URL`,
//! `OWM_APPID`) and the result is validated once, so the rest of the program can
//! rely on table names being safe identifiers and enabled outputs having targets.

use crate::db::is_valid_identifier;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name searched for in the default locations.
pub const CONFIG_FILE_NAME: &str = "weatherstation.json";

/// Upper limit for `forecastRetain`: one leap year of hourly slots.
pub const MAX_FORECAST_RETAIN_HOURS: i64 = 24 * 366;

/// Top-level configuration of the weather station.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StationConfig {
    /// Seconds between two measurement cycles.
    pub measurement_interval: u64,
    /// Station height above sea level in meters. When set, measured pressure is
    /// reduced to sea level before it is stored.
    pub station_altitude: Option<f64>,
    pub db_out: bool,
    pub file_out: bool,
    /// Measurement output file (appended).
    pub file_name: Option<PathBuf>,
    pub db_connection: DbConnection,
    pub forecast: ForecastConfig,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            measurement_interval: 2,
            station_altitude: None,
            db_out: false,
            file_out: false,
            file_name: None,
            db_connection: DbConnection::default(),
            forecast: ForecastConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DbConnection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    /// Table receiving station measurements.
    pub table: String,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Full connection string; taken from `DATABASE_URL` and preferred over the
    /// individual fields when present.
    #[serde(skip)]
    pub url: Option<String>,
}

impl Default for DbConnection {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            database: None,
            table: "measurements".to_string(),
            user: None,
            password: None,
            url: None,
        }
    }
}

/// What the forecast file receives for each poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileContent {
    /// The payload exactly as returned by the forecast service.
    #[default]
    Raw,
    /// The normalized `ForecastData` structure.
    Mapped,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ForecastConfig {
    pub enabled: bool,
    pub source: ForecastSource,
    pub forecast_db_out: bool,
    pub forecast_file_out: bool,
    pub forecast_file_name: Option<PathBuf>,
    pub forecast_file_content: FileContent,
    /// Hours after the measurement time in which stored hourly rows may be replaced.
    pub forecast_retain: i64,
    pub forecast_tables: ForecastTables,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            source: ForecastSource::default(),
            forecast_db_out: false,
            forecast_file_out: false,
            forecast_file_name: None,
            forecast_file_content: FileContent::Raw,
            forecast_retain: 24,
            forecast_tables: ForecastTables::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ForecastSource {
    pub url: String,
    pub payload: ForecastQuery,
}

/// Query parameters sent with every forecast request.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ForecastQuery {
    pub lat: f64,
    pub lon: f64,
    pub units: String,
    pub lang: String,
    pub appid: String,
}

impl Default for ForecastQuery {
    fn default() -> Self {
        Self {
            lat: 0.0,
            lon: 0.0,
            units: "metric".to_string(),
            lang: "en".to_string(),
            appid: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ForecastTables {
    pub hourly_forecast: String,
    pub daily_forecast: String,
    pub alerts_forecast: String,
}

impl Default for ForecastTables {
    fn default() -> Self {
        Self {
            hourly_forecast: "hourlyforecast".to_string(),
            daily_forecast: "dailyforecast".to_string(),
            alerts_forecast: "alertsforecast".to_string(),
        }
    }
}

impl StationConfig {
    /// Locates, reads, overrides and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if an explicitly given file does not exist or the
    /// result fails validation, `AppError::Io`/`AppError::JsonParse` if the file
    /// cannot be read or parsed.
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let home = env::var_os("HOME").map(PathBuf::from);
        let mut cfg = match locate(cli_path, home.as_deref())? {
            Some(path) => {
                info!("Using config file: {}", path.display());
                Self::from_json_str(&fs::read_to_string(&path)?)?
            },
            None => {
                info!("No config file available. Using default configuration");
                Self::default()
            },
        };

        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parses a configuration document. Missing keys take their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Applies `DATABASE_URL` and `OWM_APPID` from the environment (`.env` is
    /// loaded by the caller).
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = env::var("DATABASE_URL") {
            debug!("DATABASE_URL overrides dbConnection settings");
            self.db_connection.url = Some(url);
        }
        if let Ok(appid) = env::var("OWM_APPID") {
            debug!("OWM_APPID overrides forecast.source.payload.appid");
            self.forecast.source.payload.appid = appid;
        }
    }

    /// Checks cross-field consistency.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` describing the first violated rule.
    pub fn validate(&self) -> Result<()> {
        if self.measurement_interval == 0 {
            return Err(AppError::Config(
                "measurementInterval must be greater than 0".into(),
            ));
        }
        if self.file_out && self.file_name.is_none() {
            return Err(AppError::Config("fileOut requires fileName".into()));
        }
        if self.db_out || self.forecast_db_out_enabled() {
            check_table("dbConnection.table", &self.db_connection.table)?;
        }

        let fc = &self.forecast;
        if !fc.enabled {
            return Ok(());
        }
        if fc.source.url.trim().is_empty() {
            return Err(AppError::Config(
                "forecast.source.url is required when forecast is enabled".into(),
            ));
        }
        if !(0..=MAX_FORECAST_RETAIN_HOURS).contains(&fc.forecast_retain) {
            return Err(AppError::Config(format!(
                "forecast.forecastRetain must be between 0 and {} hours (got {})",
                MAX_FORECAST_RETAIN_HOURS, fc.forecast_retain
            )));
        }
        if fc.forecast_file_out && fc.forecast_file_name.is_none() {
            return Err(AppError::Config(
                "forecast.forecastFileOut requires forecast.forecastFileName".into(),
            ));
        }
        if fc.forecast_db_out {
            let tables = &fc.forecast_tables;
            check_table("forecastTables.hourlyForecast", &tables.hourly_forecast)?;
            check_table("forecastTables.dailyForecast", &tables.daily_forecast)?;
            check_table("forecastTables.alertsForecast", &tables.alerts_forecast)?;
        }
        Ok(())
    }

    /// Whether a database connection is needed at all.
    pub fn needs_database(&self) -> bool {
        self.db_out || self.forecast_db_out_enabled()
    }

    fn forecast_db_out_enabled(&self) -> bool {
        self.forecast.enabled && self.forecast.forecast_db_out
    }

    /// Logs the effective configuration with secrets masked.
    pub fn log_summary(&self) {
        let db = &self.db_connection;
        info!("Configuration:");
        info!("    measurementInterval: {}", self.measurement_interval);
        info!("    stationAltitude:     {:?}", self.station_altitude);
        info!("    dbOut:               {}", self.db_out);
        if db.url.is_some() {
            info!("       url:              <from DATABASE_URL>");
        } else {
            info!("       host:             {:?}", db.host);
            info!("       port:             {:?}", db.port);
            info!("       database:         {:?}", db.database);
            info!("       user:             {:?}", db.user);
            info!("       password:         {}", mask(db.password.as_deref()));
        }
        info!("       table:            {}", db.table);
        info!("    fileOut:             {}", self.file_out);
        info!("       fileName:         {:?}", self.file_name);

        let fc = &self.forecast;
        info!("    forecast:            {}", fc.enabled);
        if fc.enabled {
            info!("       url:              {}", fc.source.url);
            info!(
                "       lat/lon:          {}/{}",
                fc.source.payload.lat, fc.source.payload.lon
            );
            info!("       appid:            {}", mask(Some(&fc.source.payload.appid)));
            info!("       forecastDbOut:    {}", fc.forecast_db_out);
            info!("       forecastFileOut:  {}", fc.forecast_file_out);
            info!("       forecastRetain:   {}h", fc.forecast_retain);
        }
    }
}

/// Picks the configuration file to read, if any.
fn locate(cli_path: Option<&Path>, home: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = cli_path {
        if !path.exists() {
            return Err(AppError::Config(format!(
                "Configuration file from command line does not exist: {}",
                path.display()
            )));
        }
        return Ok(Some(path.to_path_buf()));
    }

    let mut candidates = Vec::new();
    if let Some(home) = home {
        candidates.push(home.join(".config").join(CONFIG_FILE_NAME));
    }
    candidates.push(Path::new("/etc").join(CONFIG_FILE_NAME));

    for candidate in candidates {
        if candidate.exists() {
            return Ok(Some(candidate));
        }
        info!("Config file not found: {}", candidate.display());
    }
    Ok(None)
}

fn check_table(key: &str, name: &str) -> Result<()> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(AppError::Config(format!(
            "{} is not a valid table name: {:?}",
            key, name
        )))
    }
}

fn mask(secret: Option<&str>) -> &'static str {
    match secret {
        Some(s) if !s.is_empty() => "********",
        _ => "<unset>",
    }
}
