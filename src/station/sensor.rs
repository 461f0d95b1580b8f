//! Environment sensors.
//!
//! Hardware drivers (BME280, DHT11/22) live outside this crate; they plug in by
//! implementing [`Sensor`]. [`SimulatedSensor`] produces plausible readings for
//! test runs and machines without a sensor attached.

use crate::error::{AppError, Result};
use crate::models::SensorReading;
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// A source of environment readings.
pub trait Sensor {
    /// Short identifier used in log messages.
    fn name(&self) -> &str;

    /// Takes one reading. Transient read failures are reported as
    /// `AppError::Sensor`; the station retries them.
    fn read(&mut self) -> Result<SensorReading>;
}

/// Random-walk sensor around typical Central European values.
pub struct SimulatedSensor {
    rng: StdRng,
    temperature: f64,
    humidity: f64,
    pressure: f64,
    altitude: Option<f64>,
    failure_rate: f64,
}

impl SimulatedSensor {
    pub fn new(altitude: Option<f64>) -> Self {
        Self::with_rng(StdRng::from_entropy(), altitude)
    }

    /// Deterministic sensor for tests.
    #[cfg(test)]
    pub fn seeded(seed: u64, altitude: Option<f64>) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), altitude)
    }

    fn with_rng(mut rng: StdRng, altitude: Option<f64>) -> Self {
        let temperature = rng.gen_range(5.0..20.0);
        let humidity = rng.gen_range(40.0..70.0);
        let pressure = rng.gen_range(995.0..1025.0);
        debug!(
            "Simulated sensor starts at {:.1} °C, {:.1} %, {:.1} hPa",
            temperature, humidity, pressure
        );
        Self {
            rng,
            temperature,
            humidity,
            pressure,
            altitude,
            failure_rate: 0.0,
        }
    }

    /// Makes a share of reads fail the way DHT sensors occasionally do.
    #[cfg(test)]
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = rate.clamp(0.0, 1.0);
        self
    }
}

impl Sensor for SimulatedSensor {
    fn name(&self) -> &str {
        "simulated"
    }

    fn read(&mut self) -> Result<SensorReading> {
        if self.failure_rate > 0.0 && self.rng.gen_bool(self.failure_rate) {
            return Err(AppError::Sensor("checksum did not validate, try again".into()));
        }

        let step = Uniform::new_inclusive(-1.0, 1.0);
        self.temperature = (self.temperature + 0.2 * step.sample(&mut self.rng)).clamp(-30.0, 45.0);
        self.humidity = (self.humidity + 0.5 * step.sample(&mut self.rng)).clamp(5.0, 100.0);
        self.pressure = (self.pressure + 0.1 * step.sample(&mut self.rng)).clamp(950.0, 1050.0);

        Ok(SensorReading {
            temperature: Some(self.temperature),
            humidity: Some(self.humidity),
            pressure: Some(self.pressure),
            altitude: self.altitude,
        })
    }
}
