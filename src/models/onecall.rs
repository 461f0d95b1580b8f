//! Deserialization structs for the OpenWeatherMap One Call payload.
//!
//! Only the fields the station uses are declared; everything else in the
//! payload is ignored. Optional fields accept both a missing key and `null`.

use serde::de::{self, Unexpected, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;

// --- One Call Response Structs ---

/// Whole payload of one forecast poll.
#[derive(Debug, Clone, Deserialize)]
pub struct OneCall {
    pub current: Conditions,
    pub hourly: Option<Vec<Conditions>>,
    pub daily: Option<Vec<DayConditions>>,
    pub alerts: Option<Vec<AlertEntry>>,
}

/// Unix seconds. Integral floats such as `1000.0` are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnixTime(pub i64);

impl<'de> Deserialize<'de> for UnixTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct Seconds;

        impl<'de> Visitor<'de> for Seconds {
            type Value = UnixTime;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("Unix seconds as an integer")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<UnixTime, E> {
                Ok(UnixTime(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<UnixTime, E> {
                i64::try_from(v)
                    .map(UnixTime)
                    .map_err(|_| E::invalid_value(Unexpected::Unsigned(v), &self))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<UnixTime, E> {
                if v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 {
                    Ok(UnixTime(v as i64))
                } else {
                    Err(E::invalid_value(Unexpected::Float(v), &self))
                }
            }
        }

        deserializer.deserialize_any(Seconds)
    }
}

/// `weather[i]` entry; only the first one is used.
#[derive(Debug, Clone, Deserialize)]
pub struct WeatherEntry {
    pub description: Option<String>,
    pub icon: Option<String>,
}

/// Precipitation of a conditions object, e.g. `"rain": {"1h": 0.4}`.
#[derive(Debug, Clone, Deserialize)]
pub struct HourlyPrecipitation {
    #[serde(rename = "1h")]
    pub last_hour: Option<f64>,
}

/// `current` and `hourly[i]`.
#[derive(Debug, Clone, Deserialize)]
pub struct Conditions {
    pub dt: UnixTime,
    pub temp: f64,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub clouds: Option<f64>,
    pub uvi: Option<f64>,
    pub visibility: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_deg: Option<f64>,
    pub rain: Option<HourlyPrecipitation>,
    pub snow: Option<HourlyPrecipitation>,
    pub weather: Option<Vec<WeatherEntry>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DayTemperatures {
    pub morn: f64,
    pub day: f64,
    pub eve: f64,
    pub night: f64,
    pub min: f64,
    pub max: f64,
}

/// `daily[i]`. Precipitation is the day's total as a bare number.
#[derive(Debug, Clone, Deserialize)]
pub struct DayConditions {
    pub dt: UnixTime,
    pub sunrise: Option<UnixTime>,
    pub sunset: Option<UnixTime>,
    pub temp: DayTemperatures,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_deg: Option<f64>,
    pub clouds: Option<f64>,
    pub uvi: Option<f64>,
    pub pop: Option<f64>,
    pub rain: Option<f64>,
    pub snow: Option<f64>,
    pub weather: Option<Vec<WeatherEntry>>,
}

/// `alerts[i]`.
#[derive(Debug, Clone, Deserialize)]
pub struct AlertEntry {
    pub start: UnixTime,
    pub end: UnixTime,
    pub event: Option<String>,
    pub sender_name: Option<String>,
    pub description: Option<String>,
}
