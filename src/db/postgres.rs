//! Provides PostgreSQL database interaction functionalities using `sqlx`.
//!
//! Includes capabilities for establishing the connection pool, bootstrapping the
//! station's tables, inserting measurements and implementing [`ForecastStore`].
//! Also contains integration tests for database operations (requires the `integration-tests` feature).

use super::statement::{self, quote_identifier, Statement};
use super::ForecastStore;
use crate::config::{DbConnection, ForecastTables};
use crate::error::{AppError, Result};
use crate::models::{Alert, DailyRecord, HourlyRecord, Measurement};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{Pool, Postgres};
use tracing::{debug, error, info};

/// Represents the database connection pool and provides methods for database operations.
///
/// Holds a `sqlx::Pool` for connection management. The station is the only
/// writer, so the pool stays small.
pub struct Database {
    pool: Pool<Postgres>,
}

impl Database {
    /// Creates a new `Database` instance by establishing a connection pool.
    ///
    /// Uses `DbConnection::url` when set (from `DATABASE_URL`), otherwise the
    /// individual host/port/database/user/password settings.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the connection pool cannot be established.
    pub async fn connect(conn: &DbConnection) -> Result<Self> {
        info!("Connecting to database...");

        let options = PgPoolOptions::new().max_connections(2);
        let pool = match &conn.url {
            Some(url) => options.connect(url).await,
            None => options.connect_with(connect_options(conn)).await,
        }
        .map_err(|e| {
            error!("Failed to connect to database: {}", e);
            AppError::Db(e.into())
        })?;

        info!("Connected to database successfully");
        Ok(Self { pool })
    }

    /// Closes the pool, waiting for connections to be returned.
    pub async fn close(&self) {
        self.pool.close().await;
        debug!("Database pool closed");
    }

    /// Creates the measurement and forecast tables if they do not exist yet.
    ///
    /// Uses `CREATE TABLE IF NOT EXISTS` so it can be safely run multiple times.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if any statement fails.
    pub async fn init_schema(&self, measurements: &str, tables: &ForecastTables) -> Result<()> {
        info!("Initializing database schema (if necessary)...");

        for ddl in schema_statements(measurements, tables) {
            debug!("{}", ddl);
            sqlx::query(&ddl).execute(&self.pool).await.map_err(|e| {
                error!("Failed to create table: {}", e);
                AppError::Db(e.into())
            })?;
        }

        info!("Database schema initialized successfully");
        Ok(())
    }

    /// Inserts one station measurement.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails (e.g. duplicate timestamp).
    pub async fn insert_measurement(&self, table: &str, m: &Measurement) -> Result<()> {
        self.execute(statement::measurement(table, m), "insert measurement")
            .await
            .map(|_| ())
    }

    /// Executes one statement and returns the number of affected rows.
    async fn execute(&self, mut stmt: Statement, what: &str) -> Result<u64> {
        debug!(sql = %stmt.sql(), params = ?stmt.params(), "{}", what);
        let result = stmt.query().execute(&self.pool).await.map_err(|e| {
            error!("Failed to {}: {}", what, e);
            AppError::Db(e.into())
        })?;
        Ok(result.rows_affected())
    }
}

fn connect_options(conn: &DbConnection) -> PgConnectOptions {
    let mut options = PgConnectOptions::new();
    if let Some(host) = &conn.host {
        options = options.host(host);
    }
    if let Some(port) = conn.port {
        options = options.port(port);
    }
    if let Some(database) = &conn.database {
        options = options.database(database);
    }
    if let Some(user) = &conn.user {
        options = options.username(user);
    }
    if let Some(password) = &conn.password {
        options = options.password(password);
    }
    options
}

/// DDL for all tables the station writes to.
fn schema_statements(measurements: &str, tables: &ForecastTables) -> Vec<String> {
    vec![
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                "timestamp" TIMESTAMP PRIMARY KEY,
                "date" DATE NOT NULL,
                "time" TIME NOT NULL,
                "temperature" DOUBLE PRECISION,
                "humidity" DOUBLE PRECISION,
                "pressure" DOUBLE PRECISION,
                "altitude" DOUBLE PRECISION
            )
            "#,
            quote_identifier(measurements)
        ),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                "timestamp" TIMESTAMP PRIMARY KEY,
                "temperature" DOUBLE PRECISION,    -- measured (current row only)
                "humidity" DOUBLE PRECISION,
                "pressure" DOUBLE PRECISION,
                "temperature_fc" DOUBLE PRECISION, -- forecast
                "humidity_fc" DOUBLE PRECISION,
                "pressure_fc" DOUBLE PRECISION,
                "clouds" DOUBLE PRECISION,
                "uvi" DOUBLE PRECISION,
                "visibility" DOUBLE PRECISION,
                "windspeed" DOUBLE PRECISION,
                "winddir" DOUBLE PRECISION,
                "rain" DOUBLE PRECISION,
                "snow" DOUBLE PRECISION,
                "description" TEXT,
                "icon" TEXT,
                "alerts" INTEGER NOT NULL DEFAULT 0,
                "time_cre" TIMESTAMP,
                "time_mod" TIMESTAMP
            )
            "#,
            quote_identifier(&tables.hourly_forecast)
        ),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                "date" DATE PRIMARY KEY,
                "sunrise" TIME,
                "sunset" TIME,
                "temperature_m" DOUBLE PRECISION,
                "temperature_d" DOUBLE PRECISION,
                "temperature_e" DOUBLE PRECISION,
                "temperature_n" DOUBLE PRECISION,
                "temperature_min" DOUBLE PRECISION,
                "temperature_max" DOUBLE PRECISION,
                "humidity" DOUBLE PRECISION,
                "pressure" DOUBLE PRECISION,
                "windspeed" DOUBLE PRECISION,
                "winddir" DOUBLE PRECISION,
                "clouds" DOUBLE PRECISION,
                "uvi" DOUBLE PRECISION,
                "pop" DOUBLE PRECISION,
                "rain" DOUBLE PRECISION,
                "snow" DOUBLE PRECISION,
                "description" TEXT,
                "icon" TEXT,
                "alerts" INTEGER NOT NULL DEFAULT 0
            )
            "#,
            quote_identifier(&tables.daily_forecast)
        ),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                "start" TIMESTAMP NOT NULL,
                "end" TIMESTAMP NOT NULL,
                "event" TEXT,
                "sender_name" TEXT,
                "description" TEXT,
                PRIMARY KEY ("start", "end")
            )
            "#,
            quote_identifier(&tables.alerts_forecast)
        ),
    ]
}

#[async_trait]
impl ForecastStore for Database {
    async fn latest_hourly_timestamp(&self, table: &str) -> Result<Option<NaiveDateTime>> {
        let sql = format!(
            "SELECT MAX(\"timestamp\") FROM {}",
            quote_identifier(table)
        );
        debug!("{}", sql);
        sqlx::query_scalar::<_, Option<NaiveDateTime>>(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to read latest hourly forecast timestamp: {}", e);
                AppError::Db(e.into())
            })
    }

    async fn delete_hourly_from(&self, table: &str, from: NaiveDateTime) -> Result<u64> {
        self.execute(
            statement::delete_from(table, "timestamp", from),
            "delete hourly forecast",
        )
        .await
    }

    async fn upsert_current(
        &self,
        table: &str,
        record: &HourlyRecord,
        measured: Option<&Measurement>,
        touched_at: NaiveDateTime,
    ) -> Result<()> {
        let stmt = statement::current_forecast(table, record, measured, touched_at);
        self.execute(stmt, "upsert current forecast").await.map(|_| ())
    }

    async fn insert_hourly(&self, table: &str, record: &HourlyRecord) -> Result<()> {
        self.execute(
            statement::hourly_forecast(table, record),
            "insert hourly forecast",
        )
        .await
        .map(|_| ())
    }

    async fn delete_daily_from(&self, table: &str, from: NaiveDate) -> Result<u64> {
        self.execute(
            statement::delete_from(table, "date", from),
            "delete daily forecast",
        )
        .await
    }

    async fn insert_daily(&self, table: &str, record: &DailyRecord) -> Result<()> {
        self.execute(
            statement::daily_forecast(table, record),
            "insert daily forecast",
        )
        .await
        .map(|_| ())
    }

    async fn upsert_alert(&self, table: &str, alert: &Alert) -> Result<()> {
        self.execute(statement::alert(table, alert), "upsert alert")
            .await
            .map(|_| ())
    }
}
