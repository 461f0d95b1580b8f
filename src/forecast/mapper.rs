use super::alerts::parse_alerts;
use super::normalize::{normalize_conditions, normalize_daily, parse_payload};
use crate::error::Result;
use crate::models::ForecastData;
use chrono::{Local, NaiveDateTime, TimeZone};
use serde_json::Value;
use tracing::debug;

/// Maps a One Call payload using the host's local time zone.
pub fn map_forecast(payload: &Value, measured_at: NaiveDateTime) -> Result<ForecastData> {
    map_forecast_in(payload, measured_at, &Local)
}

/// Maps a One Call payload, converting Unix timestamps into `tz`.
///
/// The current record is stamped with `measured_at` so that it lines up with
/// the station measurement taken in the same cycle.
pub fn map_forecast_in<Tz: TimeZone>(
    payload: &Value,
    measured_at: NaiveDateTime,
    tz: &Tz,
) -> Result<ForecastData> {
    let payload = parse_payload(payload)?;
    let alerts = parse_alerts(payload.alerts.as_deref().unwrap_or_default(), tz)?;

    let current = normalize_conditions(&payload.current, "current", Some(measured_at), &alerts, tz)?;

    let hourly = payload
        .hourly
        .iter()
        .flatten()
        .enumerate()
        .map(|(i, entry)| normalize_conditions(entry, &format!("hourly[{}]", i), None, &alerts, tz))
        .collect::<Result<Vec<_>>>()?;

    let daily = payload
        .daily
        .iter()
        .flatten()
        .enumerate()
        .map(|(i, entry)| normalize_daily(entry, &format!("daily[{}]", i), &alerts, tz))
        .collect::<Result<Vec<_>>>()?;

    debug!(
        "Mapped forecast: {} hourly, {} daily, {} alerts",
        hourly.len(),
        daily.len(),
        alerts.len()
    );

    Ok(ForecastData {
        current,
        hourly,
        daily,
        alerts,
    })
}
