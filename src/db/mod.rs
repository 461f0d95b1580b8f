//! Provides database interaction functionalities.
//!
//! The forecast retention engine talks to storage through the [`ForecastStore`]
//! trait. `postgres` implements it with `sqlx`; a test-only in-memory store
//! mirrors the same key semantics for unit tests.

#[cfg(test)]
mod memory;
mod postgres;
mod statement;

#[cfg(test)]
pub use memory::*;
pub use postgres::*;
pub use statement::is_valid_identifier;

use crate::error::Result;
use crate::models::{Alert, DailyRecord, HourlyRecord, Measurement};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};

/// Storage operations needed to reconcile forecast data.
///
/// Every call is one committed statement; there is no multi-statement
/// transaction, so a failure leaves earlier calls in place.
#[async_trait]
pub trait ForecastStore: Send + Sync {
    /// Latest `timestamp` stored in the hourly table, if any row exists.
    async fn latest_hourly_timestamp(&self, table: &str) -> Result<Option<NaiveDateTime>>;

    /// Deletes hourly rows with `timestamp >= from`. Returns the number of rows removed.
    async fn delete_hourly_from(&self, table: &str, from: NaiveDateTime) -> Result<u64>;

    /// Inserts the current row or, if its timestamp exists, updates it while
    /// keeping its creation time.
    async fn upsert_current(
        &self,
        table: &str,
        record: &HourlyRecord,
        measured: Option<&Measurement>,
        touched_at: NaiveDateTime,
    ) -> Result<()>;

    /// Inserts a future hourly row. An existing timestamp is an error.
    async fn insert_hourly(&self, table: &str, record: &HourlyRecord) -> Result<()>;

    /// Deletes daily rows with `date >= from`. Returns the number of rows removed.
    async fn delete_daily_from(&self, table: &str, from: NaiveDate) -> Result<u64>;

    /// Inserts a daily row. An existing date is an error.
    async fn insert_daily(&self, table: &str, record: &DailyRecord) -> Result<()>;

    /// Inserts an alert or refreshes the description of the alert with the same window.
    async fn upsert_alert(&self, table: &str, alert: &Alert) -> Result<()>;
}
