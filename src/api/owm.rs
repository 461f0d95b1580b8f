//! Client for the OpenWeatherMap One Call API.
//!
//! The client only performs the HTTP exchange and returns the payload as a
//! `serde_json::Value`; interpreting it is up to the forecast mapper.

use crate::config::ForecastQuery;
use crate::error::{AppError, Result};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// An asynchronous client fetching one forecast payload per call.
pub struct ForecastClient {
    client: Client,
    url: String,
    query: ForecastQuery,
}

impl ForecastClient {
    pub fn new(url: &str, query: ForecastQuery) -> Self {
        Self {
            client: Client::new(),
            url: url.to_string(),
            query,
        }
    }

    /// Fetches the forecast for the configured location.
    ///
    /// Sends `lat`, `lon`, `units`, `lang` and `appid` as query parameters.
    /// Network failures and non-success status codes are returned as
    /// `AppError::Api`, so callers can treat them as transport errors.
    pub async fn fetch(&self) -> Result<Value> {
        info!(
            "Fetching forecast for lat={} lon={} from {}",
            self.query.lat, self.query.lon, self.url
        );

        let response = self
            .client
            .get(&self.url)
            .query(&self.query)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                error!("Error requesting forecast from {}: {}", self.url, e);
                AppError::Api(e.into())
            })?;

        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                let status = e.status();
                error!(
                    "Forecast request to {} failed with status {}",
                    self.url,
                    status.unwrap_or_default()
                );
                if status == Some(reqwest::StatusCode::UNAUTHORIZED) {
                    error!("Received 401. Check the configured appid (OWM_APPID).");
                }
                return Err(AppError::Api(e.into()));
            },
        };

        let payload: Value = response.json().await.map_err(|e| {
            error!("Error parsing forecast response JSON: {}", e);
            AppError::Api(e.into())
        })?;

        debug!(
            "Received forecast payload with keys {:?}",
            payload
                .as_object()
                .map(|o| o.keys().cloned().collect::<Vec<_>>())
                .unwrap_or_default()
        );

        Ok(payload)
    }
}
