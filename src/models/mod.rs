//! Defines the data structures and models used throughout the application.
//!
//! This includes the One Call payload structs, the normalized forecast records
//! produced from them and the station's own sensor measurements.

mod forecast;
mod measurement;
mod onecall;

pub use forecast::*;
pub use measurement::*;
pub use onecall::*;
