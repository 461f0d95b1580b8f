//! Station measurements taken from the local environment sensor.

use chrono::NaiveDateTime;
use serde::Serialize;

/// Raw values delivered by one sensor read. Sensors that cannot measure a
/// quantity (e.g. a DHT22 has no barometer) leave it unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SensorReading {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub altitude: Option<f64>,
}

/// A reading stamped with the station's local measurement time.
///
/// `pressure` is already reduced to sea level when the station altitude is configured.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measurement {
    #[serde(with = "super::forecast::timestamp_format")]
    pub timestamp: NaiveDateTime,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub altitude: Option<f64>,
}

impl Measurement {
    pub fn new(timestamp: NaiveDateTime, reading: SensorReading) -> Self {
        Self {
            timestamp,
            temperature: reading.temperature,
            humidity: reading.humidity,
            pressure: reading.pressure,
            altitude: reading.altitude,
        }
    }

    /// Line for the measurement output file: `YYYY/MM/DD,HH:MM:SS,temp,hum,pres,alt`.
    /// Unset values leave their field empty.
    pub fn to_csv_line(&self) -> String {
        fn field(v: Option<f64>, signed: bool) -> String {
            match v {
                Some(v) if signed => format!("{:+.1}", v),
                Some(v) => format!("{:.1}", v),
                None => String::new(),
            }
        }

        format!(
            "{},{},{},{},{}\n",
            self.timestamp.format("%Y/%m/%d,%H:%M:%S"),
            field(self.temperature, true),
            field(self.humidity, false),
            field(self.pressure, false),
            field(self.altitude, false),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at_noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(12, 0, 4)
            .unwrap()
    }

    #[test]
    fn csv_line_formats_all_values() {
        let m = Measurement::new(
            at_noon(),
            SensorReading {
                temperature: Some(-3.04),
                humidity: Some(81.26),
                pressure: Some(1013.27),
                altitude: Some(120.0),
            },
        );
        assert_eq!(m.to_csv_line(), "2024/03/05,12:00:04,-3.0,81.3,1013.3,120.0\n");
    }

    #[test]
    fn csv_line_keeps_empty_fields_for_missing_values() {
        let m = Measurement::new(
            at_noon(),
            SensorReading {
                temperature: Some(21.0),
                humidity: Some(40.0),
                ..Default::default()
            },
        );
        assert_eq!(m.to_csv_line(), "2024/03/05,12:00:04,+21.0,40.0,,\n");
    }
}
