//! Forecast pipeline: fetch, optional file emission, mapping, reconciliation.
//!
//! One call to [`handle_forecast`] is one forecast poll. Steps run strictly in
//! order and the first failure ends the poll.

mod alerts;
mod file_sink;
mod mapper;
mod normalize;
mod retention;

pub use file_sink::FileSink;
pub use retention::ReconcileSummary;

use mapper::map_forecast;
use retention::{reconcile_forecast, store_alerts};

use crate::api::ForecastClient;
use crate::config::{FileContent, ForecastConfig};
use crate::db::ForecastStore;
use crate::error::{AppError, Result};
use crate::models::{ForecastData, Measurement};
use chrono::NaiveDateTime;
use std::io::Write;
use tracing::{debug, info};

/// What a forecast poll did.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastOutcome {
    pub data: ForecastData,
    pub file_written: bool,
    pub stored: Option<ReconcileSummary>,
    pub alerts_stored: usize,
}

/// Runs one forecast poll for the measurement taken at `measured_at`.
///
/// Returns `Ok(None)` when forecasting is disabled. Enabling database or file
/// output without passing the store or sink is a configuration error.
pub async fn handle_forecast<W: Write>(
    config: &ForecastConfig,
    client: &ForecastClient,
    measured_at: NaiveDateTime,
    measurement: Option<&Measurement>,
    store: Option<&dyn ForecastStore>,
    sink: Option<&mut FileSink<W>>,
) -> Result<Option<ForecastOutcome>> {
    if !config.enabled {
        debug!("Forecast disabled, skipping poll");
        return Ok(None);
    }
    let store = match (config.forecast_db_out, store) {
        (true, None) => {
            return Err(AppError::Config(
                "forecastDbOut is enabled but no database is connected".into(),
            ))
        },
        (true, Some(store)) => Some(store),
        (false, _) => None,
    };
    let sink = match (config.forecast_file_out, sink) {
        (true, None) => {
            return Err(AppError::Config(
                "forecastFileOut is enabled but no forecast file is open".into(),
            ))
        },
        (true, Some(sink)) => Some(sink),
        (false, _) => None,
    };

    let payload = client.fetch().await?;

    let (data, file_written) = match (sink, config.forecast_file_content) {
        (Some(sink), FileContent::Raw) => {
            sink.append(measured_at, &payload)?;
            let data = map_forecast(&payload, measured_at)?;
            (data, true)
        },
        (Some(sink), FileContent::Mapped) => {
            let data = map_forecast(&payload, measured_at)?;
            sink.append(measured_at, &data)?;
            (data, true)
        },
        (None, _) => (map_forecast(&payload, measured_at)?, false),
    };

    let mut stored = None;
    let mut alerts_stored = 0;
    if let Some(store) = store {
        stored = Some(
            reconcile_forecast(
                store,
                &config.forecast_tables,
                &data,
                measured_at,
                measurement,
                config.forecast_retain,
            )
            .await?,
        );
        alerts_stored =
            store_alerts(store, &config.forecast_tables.alerts_forecast, &data.alerts).await?;
    }

    info!(
        "Forecast poll at {} done ({} hourly, {} daily, {} alerts)",
        measured_at,
        data.hourly.len(),
        data.daily.len(),
        data.alerts.len()
    );

    Ok(Some(ForecastOutcome {
        data,
        file_written,
        stored,
        alerts_stored,
    }))
}
