//! Reconciles mapped forecast data with what is already stored.
//!
//! Hourly rows before the retention window are history and stay untouched;
//! rows inside the window are replaced by the latest forecast. Daily rows are
//! replaced from the measurement date on. Alerts are upserted by window.

use crate::config::ForecastTables;
use crate::db::ForecastStore;
use crate::error::{AppError, Result};
use crate::models::{Alert, ForecastData, Measurement};
use chrono::{Duration, NaiveDateTime};
use tracing::{debug, info};

/// Row counts of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub hourly_deleted: u64,
    pub hourly_inserted: usize,
    pub daily_deleted: u64,
    pub daily_inserted: usize,
}

/// First hourly timestamp that may be replaced in this poll.
///
/// With stored rows the boundary is `last + 1 min`, clamped into
/// `[measured_at, measured_at + retain_hours]`. Without stored rows it is
/// `measured_at`. A retention window beyond chrono's range is a config error.
pub fn hourly_deletion_boundary(
    measured_at: NaiveDateTime,
    last: Option<NaiveDateTime>,
    retain_hours: i64,
) -> Result<NaiveDateTime> {
    let Some(last) = last else {
        return Ok(measured_at);
    };
    let limit = Duration::try_hours(retain_hours)
        .and_then(|retain| measured_at.checked_add_signed(retain))
        .ok_or_else(|| {
            AppError::Config(format!(
                "forecastRetain of {}h is out of range for {}",
                retain_hours, measured_at
            ))
        })?;
    let after_last = last
        .checked_add_signed(Duration::minutes(1))
        .unwrap_or(NaiveDateTime::MAX);
    Ok(after_last.min(limit).max(measured_at))
}

/// Writes hourly and daily forecast rows.
///
/// Each statement commits on its own; an error stops the pass and leaves the
/// rows written so far in place.
pub async fn reconcile_forecast(
    store: &dyn ForecastStore,
    tables: &ForecastTables,
    data: &ForecastData,
    measured_at: NaiveDateTime,
    measurement: Option<&Measurement>,
    retain_hours: i64,
) -> Result<ReconcileSummary> {
    let mut summary = ReconcileSummary::default();

    let hourly_table = tables.hourly_forecast.as_str();
    let last = store.latest_hourly_timestamp(hourly_table).await?;
    let boundary = hourly_deletion_boundary(measured_at, last, retain_hours)?;
    debug!(
        "Hourly boundary {} (last stored: {:?}, retain {}h)",
        boundary, last, retain_hours
    );

    summary.hourly_deleted = store.delete_hourly_from(hourly_table, boundary).await?;
    store
        .upsert_current(hourly_table, &data.current, measurement, measured_at)
        .await?;

    for record in data
        .hourly
        .iter()
        .filter(|r| r.timestamp >= boundary && r.timestamp > measured_at)
    {
        store.insert_hourly(hourly_table, record).await?;
        summary.hourly_inserted += 1;
    }

    let daily_table = tables.daily_forecast.as_str();
    let measured_date = measured_at.date();
    summary.daily_deleted = store.delete_daily_from(daily_table, measured_date).await?;
    for record in data.daily.iter().filter(|r| r.date >= measured_date) {
        store.insert_daily(daily_table, record).await?;
        summary.daily_inserted += 1;
    }

    info!(
        "Forecast stored: hourly -{} +{}, daily -{} +{}",
        summary.hourly_deleted,
        summary.hourly_inserted,
        summary.daily_deleted,
        summary.daily_inserted
    );
    Ok(summary)
}

/// Upserts every alert. Returns the number of alerts written.
pub async fn store_alerts(store: &dyn ForecastStore, table: &str, alerts: &[Alert]) -> Result<usize> {
    for alert in alerts {
        store.upsert_alert(table, alert).await?;
    }
    if !alerts.is_empty() {
        info!("{} weather alert(s) stored", alerts.len());
    }
    Ok(alerts.len())
}
