//! Normalized forecast records.
//!
//! Every record field the forecast service may omit is an `Option`; `None` means
//! "the source did not report it" and is never persisted as NULL or zero.
//! Serialization skips unset fields so the file output mirrors the same rule.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Format used for forecast and measurement timestamps (`YYYY-MM-DD HH:MM:SS`).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Serde adapter writing `NaiveDateTime` as `YYYY-MM-DD HH:MM:SS`.
pub mod timestamp_format {
    use super::TIMESTAMP_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&ts.format(TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT).map_err(serde::de::Error::custom)
    }
}

/// Conditions for one instant: the "current" slot or one hourly slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyRecord {
    #[serde(with = "timestamp_format")]
    pub timestamp: NaiveDateTime,
    pub temperature: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pressure: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clouds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uvi: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub windspeed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winddir: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rain: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snow: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub alerts: u32,
}

/// The current record has the same shape as an hourly one.
pub type CurrentRecord = HourlyRecord;

/// Day summary from the daily forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sunrise: Option<NaiveTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sunset: Option<NaiveTime>,
    pub temperature_m: f64,
    pub temperature_d: f64,
    pub temperature_e: f64,
    pub temperature_n: f64,
    pub temperature_min: f64,
    pub temperature_max: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pressure: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub windspeed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winddir: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clouds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uvi: Option<f64>,
    /// Probability of precipitation (0..1).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pop: Option<f64>,
    /// Daily total, not an hourly rate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rain: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snow: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub alerts: u32,
}

/// A weather alert issued for the closed interval `[start, end]` (Unix seconds).
///
/// `starts_at`/`ends_at` hold the same window as local wall-clock time; they
/// are the stored key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub start: i64,
    pub end: i64,
    #[serde(with = "timestamp_format")]
    pub starts_at: NaiveDateTime,
    #[serde(with = "timestamp_format")]
    pub ends_at: NaiveDateTime,
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub sender_name: String,
    #[serde(default)]
    pub description: String,
}

impl Alert {
    /// Whether `point` (Unix seconds) lies inside the alert window, both ends inclusive.
    pub fn covers(&self, point: i64) -> bool {
        self.start <= point && point <= self.end
    }
}

/// Result of mapping one forecast payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastData {
    pub current: CurrentRecord,
    pub hourly: Vec<HourlyRecord>,
    pub daily: Vec<DailyRecord>,
    #[serde(default)]
    pub alerts: Vec<Alert>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> HourlyRecord {
        HourlyRecord {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
            temperature: 5.0,
            humidity: Some(80.0),
            pressure: None,
            clouds: None,
            uvi: None,
            visibility: None,
            windspeed: None,
            winddir: None,
            rain: None,
            snow: None,
            description: None,
            icon: Some("01d".into()),
            alerts: 0,
        }
    }

    #[test]
    fn unset_fields_are_not_serialized() {
        let value = serde_json::to_value(record()).unwrap();
        assert_eq!(
            value,
            json!({
                "timestamp": "2024-01-01 12:00:00",
                "temperature": 5.0,
                "humidity": 80.0,
                "icon": "01d",
                "alerts": 0
            })
        );
    }

    #[test]
    fn timestamp_format_reads_back() {
        let text = serde_json::to_string(&record()).unwrap();
        let parsed: HourlyRecord = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, record());
    }

    #[test]
    fn alert_window_is_closed() {
        let alert = Alert {
            start: 100,
            end: 200,
            starts_at: NaiveDateTime::default(),
            ends_at: NaiveDateTime::default(),
            event: "Wind".into(),
            sender_name: "DWD".into(),
            description: String::new(),
        };
        assert!(alert.covers(100));
        assert!(alert.covers(200));
        assert!(!alert.covers(99));
        assert!(!alert.covers(201));
    }
}
