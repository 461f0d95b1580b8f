/// Temperature lapse rate of the standard atmosphere in K/m.
const LAPSE_RATE: f64 = 0.0065;
const KELVIN: f64 = 273.15;
const EXPONENT: f64 = 5.257;

/// Reduces station pressure `p` (hPa) measured at height `h` (m) and air
/// temperature `t` (°C) to sea level using the barometric formula.
pub fn reduce_to_sea_level(p: f64, h: f64, t: f64) -> f64 {
    p * (1.0 - LAPSE_RATE * h / (t + LAPSE_RATE * h + KELVIN)).powf(-EXPONENT)
}
