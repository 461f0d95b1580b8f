//! Defines the application's primary error type `AppError` and a convenience `Result` alias.
//!
//! Uses the `thiserror` crate for ergonomic error definition and provides `From`
//! implementations to convert common external errors into `AppError` variants.
//! Errors that do not implement `Clone` are wrapped in `Arc` to allow `AppError` to be cloneable.

use std::sync::Arc;
use thiserror::Error;

/// The primary error enumeration for all application-specific errors.
#[derive(Error, Debug, Clone)]
pub enum AppError {
    /// Transport failure talking to the forecast service (`reqwest`), including
    /// non-success HTTP status codes.
    #[error("API Error: {0}")]
    Api(Arc<reqwest::Error>),

    /// Error originating from database operations (`sqlx`).
    #[error("Database Error: {0}")]
    Db(Arc<sqlx::Error>),

    /// Error during JSON parsing or serialization (`serde_json`).
    #[error("JSON Error: {0}")]
    JsonParse(Arc<serde_json::Error>),

    /// Error related to standard I/O operations (output files, config files).
    #[error("I/O Error: {0}")]
    Io(Arc<std::io::Error>),

    /// Invalid or inconsistent configuration.
    #[error("Configuration Error: {0}")]
    Config(String),

    /// The forecast payload violates the contract: a required field is missing
    /// or a present field has the wrong type.
    #[error("Forecast payload error at `{path}`: {reason}")]
    Schema { path: String, reason: String },

    /// The sensor could not deliver a reading this time.
    #[error("Sensor Error: {0}")]
    Sensor(String),
}

impl AppError {
    /// Builds a schema error for the given payload path.
    pub fn schema(path: impl Into<String>, reason: impl Into<String>) -> Self {
        AppError::Schema {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Transport errors end the current forecast poll only; the station keeps running.
    pub fn is_transport(&self) -> bool {
        matches!(self, AppError::Api(_))
    }
}

/// A specialized `Result` type using the application's `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

// --- From implementations ---
// These allow easy conversion from external error types into AppError
// using the `?` operator. Arc is used for non-Clone error types.

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Api(Arc::new(err))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Db(Arc::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(Arc::new(err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::JsonParse(Arc::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_error_names_the_path() {
        let err = AppError::schema("daily[2].temp.morn", "required field is missing");
        assert_eq!(
            err.to_string(),
            "Forecast payload error at `daily[2].temp.morn`: required field is missing"
        );
        assert!(!err.is_transport());
    }

    #[test]
    fn only_api_errors_are_transport_errors() {
        let io = AppError::from(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
        assert!(!io.is_transport());
        assert!(!AppError::Config("bad".into()).is_transport());
        assert!(!AppError::Sensor("timeout".into()).is_transport());
    }
}
