//! Provides the client for the external forecast service.
//!
//! Includes:
//! - `owm`: Client for the OpenWeatherMap One Call API.

mod owm;

pub use owm::*;
