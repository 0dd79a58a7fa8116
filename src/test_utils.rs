//! Shared fixtures for unit tests

use crate::SensorParams;
use std::f64::consts::PI;

/// A small full circle sensor: 8 beams from +3 to -4 degrees at 1 degree spacing, listed top-down,
/// and 360 one degree columns starting at the X axis.
pub fn small_sensor() -> SensorParams {
    let beams = (0..8).map(|i| (3.0 - i as f64).to_radians()).collect();
    SensorParams::new(beams, 360, 2.0 * PI, 0.0).unwrap()
}
