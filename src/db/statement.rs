//! Parameterized SQL statement construction.
//!
//! Forecast and measurement rows only carry the columns whose values are set, so
//! their INSERT statements are assembled at runtime on a `sqlx::QueryBuilder`.
//! Values never enter the statement text: every column gets a `$n` placeholder
//! and the value travels as a bound parameter. Table names come from configuration, are validated with
//! [`is_valid_identifier`] and always emitted quoted.

use crate::models::{Alert, DailyRecord, HourlyRecord, Measurement};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::query_builder::Separated;
use sqlx::{Postgres, QueryBuilder};
use std::fmt::Display;

/// A single bound parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Float(f64),
    Int(i32),
    Text(String),
    Timestamp(NaiveDateTime),
    Date(NaiveDate),
    Time(NaiveTime),
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<u32> for SqlValue {
    fn from(v: u32) -> Self {
        SqlValue::Int(i32::try_from(v).unwrap_or(i32::MAX))
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::Timestamp(v)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Date(v)
    }
}

impl From<NaiveTime> for SqlValue {
    fn from(v: NaiveTime) -> Self {
        SqlValue::Time(v)
    }
}

impl SqlValue {
    /// Appends a placeholder for this value to `list` and binds it.
    fn push_to<Sep: Display>(&self, list: &mut Separated<'_, 'static, Postgres, Sep>) {
        match self {
            SqlValue::Float(v) => list.push_bind(*v),
            SqlValue::Int(v) => list.push_bind(*v),
            SqlValue::Text(v) => list.push_bind(v.clone()),
            SqlValue::Timestamp(v) => list.push_bind(*v),
            SqlValue::Date(v) => list.push_bind(*v),
            SqlValue::Time(v) => list.push_bind(*v),
        };
    }
}

/// Whether `name` is usable as a (optionally schema-qualified) table name:
/// ASCII letters, digits and underscores, not starting with a digit.
pub fn is_valid_identifier(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() <= 2
        && parts.iter().all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

/// Quotes an identifier (each dot-separated part separately).
pub fn quote_identifier(name: &str) -> String {
    name.split('.')
        .map(|part| format!("\"{}\"", part.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(".")
}

/// A `sqlx` query builder with its parameters bound, plus a copy of the
/// parameters (in placeholder order) for logging.
pub struct Statement {
    builder: QueryBuilder<'static, Postgres>,
    params: Vec<SqlValue>,
}

impl Statement {
    pub fn sql(&self) -> &str {
        self.builder.sql()
    }

    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }

    /// The executable query. A statement is executed once.
    pub fn query(&mut self) -> Query<'_, Postgres, PgArguments> {
        self.builder.build()
    }
}

/// Alias of the stored row inside an `ON CONFLICT DO UPDATE` clause.
const TARGET_ALIAS: &str = "target";

/// Builder for `INSERT INTO ... VALUES ...` with an optional `ON CONFLICT` clause.
#[derive(Debug, Clone)]
pub struct InsertStatement {
    table: String,
    columns: Vec<&'static str>,
    values: Vec<SqlValue>,
    unset: Vec<&'static str>,
    conflict_keys: Vec<&'static str>,
    conflict_updates: Vec<&'static str>,
    fill_null: Vec<&'static str>,
}

impl InsertStatement {
    pub fn into_table(table: &str) -> Self {
        Self {
            table: table.to_string(),
            columns: Vec::new(),
            values: Vec::new(),
            unset: Vec::new(),
            conflict_keys: Vec::new(),
            conflict_updates: Vec::new(),
            fill_null: Vec::new(),
        }
    }

    /// Adds a column that is always written.
    pub fn set(mut self, column: &'static str, value: impl Into<SqlValue>) -> Self {
        self.columns.push(column);
        self.values.push(value.into());
        self
    }

    /// Adds a column only when the value is set.
    pub fn set_opt<V: Into<SqlValue>>(self, column: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.set(column, v),
            None => self,
        }
    }

    /// Like [`set_opt`](Self::set_opt), but an unset value clears the column
    /// when a key conflict turns the insert into an update.
    pub fn set_or_clear<V: Into<SqlValue>>(mut self, column: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.set(column, v),
            None => {
                self.unset.push(column);
                self
            },
        }
    }

    /// On a key conflict, overwrite the listed columns with the incoming values.
    pub fn on_conflict_update(
        mut self,
        keys: &[&'static str],
        updates: &[&'static str],
    ) -> Self {
        self.conflict_keys = keys.to_vec();
        self.conflict_updates = updates.to_vec();
        self
    }

    /// On a key conflict, overwrite every written column except the keys.
    pub fn on_conflict_update_all(mut self, keys: &[&'static str]) -> Self {
        let updates: Vec<&'static str> = self
            .columns
            .iter()
            .copied()
            .filter(|c| !keys.contains(c))
            .collect();
        self.conflict_keys = keys.to_vec();
        self.conflict_updates = updates;
        self
    }

    /// On a key conflict, write the listed columns only where the stored value is NULL.
    pub fn fill_null_on_conflict(mut self, columns: &[&'static str]) -> Self {
        self.conflict_updates.retain(|c| !columns.contains(c));
        self.fill_null.extend_from_slice(columns);
        self
    }

    pub fn build(self) -> Statement {
        let target = quote_identifier(TARGET_ALIAS);
        let updating = !self.conflict_keys.is_empty()
            && !(self.conflict_updates.is_empty() && self.fill_null.is_empty());

        let mut builder: QueryBuilder<'static, Postgres> =
            QueryBuilder::new(format!("INSERT INTO {}", quote_identifier(&self.table)));
        if updating && !self.fill_null.is_empty() {
            builder.push(format!(" AS {}", target));
        }
        builder.push(" (");
        let mut columns = builder.separated(", ");
        for column in &self.columns {
            columns.push(quote_identifier(column));
        }
        builder.push(") VALUES (");
        let mut values = builder.separated(", ");
        for value in &self.values {
            value.push_to(&mut values);
        }
        builder.push(")");

        if !self.conflict_keys.is_empty() {
            builder.push(" ON CONFLICT (");
            let mut keys = builder.separated(", ");
            for key in &self.conflict_keys {
                keys.push(quote_identifier(key));
            }
            if updating {
                builder.push(") DO UPDATE SET ");
                let mut updates = builder.separated(", ");
                for column in &self.conflict_updates {
                    let q = quote_identifier(column);
                    updates.push(format!("{} = EXCLUDED.{}", q, q));
                }
                for column in &self.fill_null {
                    let q = quote_identifier(column);
                    updates.push(format!("{} = COALESCE({}.{}, EXCLUDED.{})", q, target, q, q));
                }
                for column in self.unset.iter().filter(|c| !self.conflict_keys.contains(c)) {
                    updates.push(format!("{} = NULL", quote_identifier(column)));
                }
            } else {
                builder.push(") DO NOTHING");
            }
        }

        Statement {
            builder,
            params: self.values,
        }
    }
}

/// `DELETE FROM table WHERE column >= $1`.
pub fn delete_from(table: &str, column: &str, from: impl Into<SqlValue>) -> Statement {
    let from = from.into();
    let mut builder: QueryBuilder<'static, Postgres> = QueryBuilder::new(format!(
        "DELETE FROM {} WHERE {} >= ",
        quote_identifier(table),
        quote_identifier(column)
    ));
    from.push_to(&mut builder.separated(""));
    Statement {
        builder,
        params: vec![from],
    }
}

/// Forecast-only columns shared by current and future hourly rows. A column
/// the forecast leaves unset is cleared when the row already exists.
fn with_forecast_columns(stmt: InsertStatement, fc: &HourlyRecord) -> InsertStatement {
    stmt.set("temperature_fc", fc.temperature)
        .set_or_clear("humidity_fc", fc.humidity)
        .set_or_clear("pressure_fc", fc.pressure)
        .set_or_clear("clouds", fc.clouds)
        .set_or_clear("uvi", fc.uvi)
        .set_or_clear("visibility", fc.visibility)
        .set_or_clear("windspeed", fc.windspeed)
        .set_or_clear("winddir", fc.winddir)
        .set_or_clear("rain", fc.rain)
        .set_or_clear("snow", fc.snow)
        .set_or_clear("description", fc.description.clone())
        .set_or_clear("icon", fc.icon.clone())
        .set("alerts", fc.alerts)
}

/// Insert-or-update of the current hourly row.
///
/// The station's own values (if any) go to the plain columns, the forecast to
/// the `_fc` columns. On conflict the forecast part is replaced as a whole
/// while measured values the station did not report are kept.
///
/// `time_cre` is only filled when the stored row has none (a former future row).
pub fn current_forecast(
    table: &str,
    fc: &HourlyRecord,
    measured: Option<&Measurement>,
    touched_at: NaiveDateTime,
) -> Statement {
    let stmt = InsertStatement::into_table(table).set("timestamp", fc.timestamp);
    let stmt = match measured {
        Some(m) => stmt
            .set_opt("temperature", m.temperature)
            .set_opt("humidity", m.humidity)
            .set_opt("pressure", m.pressure),
        None => stmt,
    };
    with_forecast_columns(stmt, fc)
        .set("time_cre", touched_at)
        .set("time_mod", touched_at)
        .on_conflict_update_all(&["timestamp"])
        .fill_null_on_conflict(&["time_cre"])
        .build()
}

/// Plain insert of a future hourly row.
pub fn hourly_forecast(table: &str, fc: &HourlyRecord) -> Statement {
    let stmt = InsertStatement::into_table(table).set("timestamp", fc.timestamp);
    with_forecast_columns(stmt, fc).build()
}

/// Plain insert of a daily row.
pub fn daily_forecast(table: &str, fc: &DailyRecord) -> Statement {
    InsertStatement::into_table(table)
        .set("date", fc.date)
        .set_opt("sunrise", fc.sunrise)
        .set_opt("sunset", fc.sunset)
        .set("temperature_m", fc.temperature_m)
        .set("temperature_d", fc.temperature_d)
        .set("temperature_e", fc.temperature_e)
        .set("temperature_n", fc.temperature_n)
        .set("temperature_min", fc.temperature_min)
        .set("temperature_max", fc.temperature_max)
        .set_opt("humidity", fc.humidity)
        .set_opt("pressure", fc.pressure)
        .set_opt("windspeed", fc.windspeed)
        .set_opt("winddir", fc.winddir)
        .set_opt("clouds", fc.clouds)
        .set_opt("uvi", fc.uvi)
        .set_opt("pop", fc.pop)
        .set_opt("rain", fc.rain)
        .set_opt("snow", fc.snow)
        .set_opt("description", fc.description.clone())
        .set_opt("icon", fc.icon.clone())
        .set("alerts", fc.alerts)
        .build()
}

/// Upsert of an alert keyed by its local window; a conflict only refreshes the description.
pub fn alert(table: &str, alert: &Alert) -> Statement {
    InsertStatement::into_table(table)
        .set("start", alert.starts_at)
        .set("end", alert.ends_at)
        .set("event", alert.event.as_str())
        .set("sender_name", alert.sender_name.as_str())
        .set("description", alert.description.as_str())
        .on_conflict_update(&["start", "end"], &["description"])
        .build()
}

/// Insert of a station measurement row.
pub fn measurement(table: &str, m: &Measurement) -> Statement {
    InsertStatement::into_table(table)
        .set("timestamp", m.timestamp)
        .set("date", m.timestamp.date())
        .set("time", m.timestamp.time())
        .set_opt("temperature", m.temperature)
        .set_opt("humidity", m.humidity)
        .set_opt("pressure", m.pressure)
        .set_opt("altitude", m.altitude)
        .build()
}
