//! Record normalizer: flattens one payload segment into a forecast record.
//!
//! The payload is deserialized into the typed [`OneCall`] structs through
//! `serde_path_to_error`, so a contract violation is reported with its JSON
//! path, e.g. `hourly[3].temp` instead of a bare "missing field".

use super::alerts::count_alerts;
use crate::error::{AppError, Result};
use crate::models::{
    Alert, Conditions, DailyRecord, DayConditions, HourlyPrecipitation, HourlyRecord, OneCall,
    UnixTime, WeatherEntry,
};
use chrono::{NaiveDateTime, NaiveTime, TimeZone};
use serde_json::Value;

/// Deserializes a One Call payload, mapping any violation to a schema error
/// that names the offending field.
pub fn parse_payload(payload: &Value) -> Result<OneCall> {
    serde_path_to_error::deserialize(payload).map_err(|e| {
        let parent = e.path().to_string();
        let reason = e.inner().to_string();
        // serde reports a missing field at its parent object
        let missing = reason
            .strip_prefix("missing field `")
            .and_then(|rest| rest.strip_suffix('`'));
        let path = match (missing, parent.as_str()) {
            (Some(field), ".") => field.to_string(),
            (Some(field), _) => format!("{}.{}", parent, field),
            (None, ".") => "$".to_string(),
            (None, _) => parent,
        };
        AppError::schema(path, reason)
    })
}

/// Converts Unix seconds to wall-clock time in `tz`.
pub fn to_local<Tz: TimeZone>(tz: &Tz, unix: i64, path: &str) -> Result<NaiveDateTime> {
    tz.timestamp_opt(unix, 0)
        .earliest()
        .map(|dt| dt.naive_local())
        .ok_or_else(|| AppError::schema(path, format!("{} is not a valid Unix timestamp", unix)))
}

/// `description` and `icon` of the first weather entry, if there is one.
fn weather_summary(weather: Option<&[WeatherEntry]>) -> (Option<String>, Option<String>) {
    match weather.and_then(|w| w.first()) {
        Some(first) => (first.description.clone(), first.icon.clone()),
        None => (None, None),
    }
}

fn last_hour(precipitation: Option<&HourlyPrecipitation>) -> Option<f64> {
    precipitation.and_then(|p| p.last_hour)
}

fn time_of<Tz: TimeZone>(tz: &Tz, at: Option<UnixTime>, path: String) -> Result<Option<NaiveTime>> {
    at.map(|t| to_local(tz, t.0, &path).map(|dt| dt.time()))
        .transpose()
}

/// Normalizes a `current` or `hourly[i]` object found at `path`.
///
/// `timestamp` overrides the entry's own converted `dt` (used for the current
/// record, which is anchored to the station's measurement time). Alerts are
/// always counted at the entry's own `dt`.
pub fn normalize_conditions<Tz: TimeZone>(
    entry: &Conditions,
    path: &str,
    timestamp: Option<NaiveDateTime>,
    alerts: &[Alert],
    tz: &Tz,
) -> Result<HourlyRecord> {
    let dt = entry.dt.0;
    let own_timestamp = to_local(tz, dt, &format!("{}.dt", path))?;
    let (description, icon) = weather_summary(entry.weather.as_deref());

    Ok(HourlyRecord {
        timestamp: timestamp.unwrap_or(own_timestamp),
        temperature: entry.temp,
        humidity: entry.humidity,
        pressure: entry.pressure,
        clouds: entry.clouds,
        uvi: entry.uvi,
        visibility: entry.visibility,
        windspeed: entry.wind_speed,
        winddir: entry.wind_deg,
        rain: last_hour(entry.rain.as_ref()),
        snow: last_hour(entry.snow.as_ref()),
        description,
        icon,
        alerts: count_alerts(alerts, dt),
    })
}

/// Normalizes a `daily[i]` object found at `path`.
pub fn normalize_daily<Tz: TimeZone>(
    entry: &DayConditions,
    path: &str,
    alerts: &[Alert],
    tz: &Tz,
) -> Result<DailyRecord> {
    let dt = entry.dt.0;
    let day = to_local(tz, dt, &format!("{}.dt", path))?;
    let (description, icon) = weather_summary(entry.weather.as_deref());

    Ok(DailyRecord {
        date: day.date(),
        sunrise: time_of(tz, entry.sunrise, format!("{}.sunrise", path))?,
        sunset: time_of(tz, entry.sunset, format!("{}.sunset", path))?,
        temperature_m: entry.temp.morn,
        temperature_d: entry.temp.day,
        temperature_e: entry.temp.eve,
        temperature_n: entry.temp.night,
        temperature_min: entry.temp.min,
        temperature_max: entry.temp.max,
        humidity: entry.humidity,
        pressure: entry.pressure,
        windspeed: entry.wind_speed,
        winddir: entry.wind_deg,
        clouds: entry.clouds,
        uvi: entry.uvi,
        pop: entry.pop,
        rain: entry.rain,
        snow: entry.snow,
        description,
        icon,
        alerts: count_alerts(alerts, dt),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use serde_json::json;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn conditions(raw: Value) -> Conditions {
        serde_json::from_value(raw).unwrap()
    }

    fn schema_path(raw: Value) -> String {
        match parse_payload(&raw) {
            Err(AppError::Schema { path, .. }) => path,
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[test]
    fn bare_conditions_leave_optional_fields_unset() {
        let entry = conditions(json!({"dt": 1_704_110_400, "temp": 3.5}));
        let record = normalize_conditions(&entry, "current", None, &[], &Utc).unwrap();

        assert_eq!(record.timestamp, noon());
        assert_eq!(record.temperature, 3.5);
        assert_eq!(record.humidity, None);
        assert_eq!(record.rain, None);
        assert_eq!(record.snow, None);
        assert_eq!(record.description, None);
        assert_eq!(record.icon, None);
        assert_eq!(record.alerts, 0);
    }

    #[test]
    fn conditions_read_hourly_precipitation_rate() {
        let entry = conditions(json!({
            "dt": 1_704_110_400, "temp": 1.0,
            "rain": {"1h": 0.42}, "snow": {"1h": 1.5},
            "weather": [{"description": "sleet", "icon": "13d"}, {"description": "ignored", "icon": "x"}]
        }));
        let record = normalize_conditions(&entry, "hourly[0]", None, &[], &Utc).unwrap();
        assert_eq!(record.rain, Some(0.42));
        assert_eq!(record.snow, Some(1.5));
        assert_eq!(record.description.as_deref(), Some("sleet"));
        assert_eq!(record.icon.as_deref(), Some("13d"));
    }

    #[test]
    fn precipitation_without_hourly_rate_stays_unset() {
        let entry = conditions(json!({"dt": 1_704_110_400, "temp": 1.0, "rain": {"3h": 2.0}}));
        let record = normalize_conditions(&entry, "hourly[0]", None, &[], &Utc).unwrap();
        assert_eq!(record.rain, None);
    }

    #[test]
    fn empty_weather_array_means_no_description() {
        let entry = conditions(json!({"dt": 1_704_110_400, "temp": 1.0, "weather": []}));
        let record = normalize_conditions(&entry, "hourly[0]", None, &[], &Utc).unwrap();
        assert_eq!(record.description, None);
        assert_eq!(record.icon, None);
    }

    #[test]
    fn timestamp_override_keeps_alerts_at_entry_time() {
        let entry = conditions(json!({"dt": 1000, "temp": 1.0}));
        let alerts = vec![Alert {
            start: 900,
            end: 1000,
            starts_at: NaiveDateTime::default(),
            ends_at: NaiveDateTime::default(),
            event: "Heat".into(),
            sender_name: "NWS".into(),
            description: String::new(),
        }];
        let record = normalize_conditions(&entry, "current", Some(noon()), &alerts, &Utc).unwrap();
        assert_eq!(record.timestamp, noon());
        assert_eq!(record.alerts, 1);
    }

    #[test]
    fn daily_reads_precipitation_total_and_sun_times() {
        let entry: DayConditions = serde_json::from_value(json!({
            "dt": 1_704_110_400,
            "sunrise": 1_704_093_960,
            "sunset": 1_704_123_000,
            "temp": {"morn": -1.0, "day": 4.0, "eve": 2.5, "night": -2.0, "min": -3.0, "max": 5.0},
            "pop": 0.8,
            "rain": 3.25,
            "weather": [{"description": "rain", "icon": "10d"}]
        }))
        .unwrap();
        let record = normalize_daily(&entry, "daily[0]", &[], &Utc).unwrap();
        assert_eq!(record.date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(record.sunrise, NaiveTime::from_hms_opt(7, 26, 0));
        assert_eq!(record.sunset, NaiveTime::from_hms_opt(15, 30, 0));
        assert_eq!(record.temperature_m, -1.0);
        assert_eq!(record.temperature_max, 5.0);
        assert_eq!(record.pop, Some(0.8));
        assert_eq!(record.rain, Some(3.25));
        assert_eq!(record.snow, None);
        assert_eq!(record.humidity, None);
        assert_eq!(record.icon.as_deref(), Some("10d"));
    }

    #[test]
    fn unrepresentable_sunrise_names_its_path() {
        let entry: DayConditions = serde_json::from_value(json!({
            "dt": 1_704_110_400,
            "sunrise": 9_000_000_000_000_i64,
            "temp": {"morn": 0.0, "day": 0.0, "eve": 0.0, "night": 0.0, "min": 0.0, "max": 0.0}
        }))
        .unwrap();
        match normalize_daily(&entry, "daily[4]", &[], &Utc) {
            Err(AppError::Schema { path, .. }) => assert_eq!(path, "daily[4].sunrise"),
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[test]
    fn missing_required_field_reports_its_path() {
        let raw = json!({
            "current": {"dt": 1, "temp": 1.0},
            "daily": [{"dt": 1_704_110_400, "temp": {"day": 1.0}}]
        });
        assert_eq!(schema_path(raw), "daily[0].temp.morn");
    }

    #[test]
    fn missing_top_level_field_reports_its_name() {
        assert_eq!(schema_path(json!({"hourly": []})), "current");
    }

    #[test]
    fn mistyped_field_is_a_schema_error() {
        let raw = json!({"current": {"dt": 1_704_110_400, "temp": 1.0, "humidity": "wet"}});
        match parse_payload(&raw) {
            Err(AppError::Schema { path, reason }) => {
                assert_eq!(path, "current.humidity");
                assert!(reason.contains("invalid type"));
            },
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[test]
    fn non_object_payload_is_reported_at_the_root() {
        assert_eq!(schema_path(json!("not a forecast")), "$");
    }

    #[test]
    fn null_counts_as_absent() {
        let raw = json!({"current": {"dt": 1_704_110_400, "temp": 1.0, "uvi": null}, "hourly": null});
        let payload = parse_payload(&raw).unwrap();
        assert_eq!(payload.current.uvi, None);
        assert!(payload.hourly.is_none());
    }

    #[test]
    fn integral_float_timestamps_are_accepted() {
        let entry = conditions(json!({"dt": 1_704_110_400.0, "temp": 1.0}));
        let record = normalize_conditions(&entry, "current", None, &[], &Utc).unwrap();
        assert_eq!(record.timestamp, noon());
    }
}
