use super::ForecastStore;
use crate::error::{AppError, Result};
use crate::models::{Alert, DailyRecord, HourlyRecord, Measurement};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Stored hourly row: forecast part plus the measured values and bookkeeping
/// that only the current row carries.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredHourly {
    pub forecast: HourlyRecord,
    pub measured_temperature: Option<f64>,
    pub measured_humidity: Option<f64>,
    pub measured_pressure: Option<f64>,
    pub time_cre: Option<NaiveDateTime>,
    pub time_mod: Option<NaiveDateTime>,
}

/// In-memory store for testing purposes. Key collisions on plain inserts fail
/// like a primary key violation would.
#[derive(Default)]
pub struct InMemoryStore {
    pub hourly: Mutex<BTreeMap<NaiveDateTime, StoredHourly>>,
    pub daily: Mutex<BTreeMap<NaiveDate, DailyRecord>>,
    pub alerts: Mutex<BTreeMap<(NaiveDateTime, NaiveDateTime), Alert>>,
}

fn poisoned() -> AppError {
    AppError::Config("in-memory store lock poisoned".into())
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hourly_rows(&self) -> BTreeMap<NaiveDateTime, StoredHourly> {
        self.hourly.lock().map(|h| h.clone()).unwrap_or_default()
    }

    pub fn daily_rows(&self) -> BTreeMap<NaiveDate, DailyRecord> {
        self.daily.lock().map(|d| d.clone()).unwrap_or_default()
    }

    pub fn alert_rows(&self) -> Vec<Alert> {
        self.alerts
            .lock()
            .map(|a| a.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ForecastStore for InMemoryStore {
    async fn latest_hourly_timestamp(&self, _table: &str) -> Result<Option<NaiveDateTime>> {
        let hourly = self.hourly.lock().map_err(|_| poisoned())?;
        Ok(hourly.keys().next_back().copied())
    }

    async fn delete_hourly_from(&self, _table: &str, from: NaiveDateTime) -> Result<u64> {
        let mut hourly = self.hourly.lock().map_err(|_| poisoned())?;
        let removed = hourly.split_off(&from);
        Ok(removed.len() as u64)
    }

    async fn upsert_current(
        &self,
        _table: &str,
        record: &HourlyRecord,
        measured: Option<&Measurement>,
        touched_at: NaiveDateTime,
    ) -> Result<()> {
        let mut hourly = self.hourly.lock().map_err(|_| poisoned())?;
        let previous = hourly.get(&record.timestamp).cloned();
        // mirrors the SQL conflict clause; time_cre is only filled when NULL
        let time_cre = previous
            .as_ref()
            .and_then(|row| row.time_cre)
            .or(Some(touched_at));
        let keep = |new: Option<f64>, old: Option<f64>| new.or(old);
        hourly.insert(
            record.timestamp,
            StoredHourly {
                forecast: record.clone(),
                measured_temperature: keep(
                    measured.and_then(|m| m.temperature),
                    previous.as_ref().and_then(|p| p.measured_temperature),
                ),
                measured_humidity: keep(
                    measured.and_then(|m| m.humidity),
                    previous.as_ref().and_then(|p| p.measured_humidity),
                ),
                measured_pressure: keep(
                    measured.and_then(|m| m.pressure),
                    previous.as_ref().and_then(|p| p.measured_pressure),
                ),
                time_cre,
                time_mod: Some(touched_at),
            },
        );
        Ok(())
    }

    async fn insert_hourly(&self, _table: &str, record: &HourlyRecord) -> Result<()> {
        let mut hourly = self.hourly.lock().map_err(|_| poisoned())?;
        if hourly.contains_key(&record.timestamp) {
            return Err(AppError::Config(format!(
                "duplicate hourly key {}",
                record.timestamp
            )));
        }
        hourly.insert(
            record.timestamp,
            StoredHourly {
                forecast: record.clone(),
                measured_temperature: None,
                measured_humidity: None,
                measured_pressure: None,
                time_cre: None,
                time_mod: None,
            },
        );
        Ok(())
    }

    async fn delete_daily_from(&self, _table: &str, from: NaiveDate) -> Result<u64> {
        let mut daily = self.daily.lock().map_err(|_| poisoned())?;
        let removed = daily.split_off(&from);
        Ok(removed.len() as u64)
    }

    async fn insert_daily(&self, _table: &str, record: &DailyRecord) -> Result<()> {
        let mut daily = self.daily.lock().map_err(|_| poisoned())?;
        if daily.contains_key(&record.date) {
            return Err(AppError::Config(format!("duplicate daily key {}", record.date)));
        }
        daily.insert(record.date, record.clone());
        Ok(())
    }

    async fn upsert_alert(&self, _table: &str, alert: &Alert) -> Result<()> {
        let mut alerts = self.alerts.lock().map_err(|_| poisoned())?;
        alerts
            .entry((alert.starts_at, alert.ends_at))
            .and_modify(|stored| stored.description = alert.description.clone())
            .or_insert_with(|| alert.clone());
        Ok(())
    }
}
