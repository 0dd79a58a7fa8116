//! Built-in sensor geometries. Beams are listed top-down, so row 0 of a grid is the highest beam.

use super::SensorParams;
use crate::common::linear_space;
use std::f64::consts::PI;

/// Parameters for a Velodyne HDL-64E style scanner. The upper block has 32 beams from +2.0 to
/// -8.33 degrees at 1/3 degree spacing, the lower block 32 beams from -8.83 to -24.33 degrees at
/// 1/2 degree spacing. The full circle is divided into 2048 columns with the seam behind the
/// vehicle, so the forward direction sits in the middle of the grid.
pub fn velodyne_params() -> SensorParams {
    let upper = linear_space(2.0, 2.0 - 31.0 / 3.0, 32);
    let lower = linear_space(-8.0 - 5.0 / 6.0, -8.0 - 5.0 / 6.0 - 15.5, 32);
    let beams = upper
        .into_iter()
        .chain(lower)
        .map(|d: f64| d.to_radians())
        .collect();

    SensorParams::new(beams, 2048, 2.0 * PI, -PI).expect("velodyne preset is valid")
}

/// Parameters for a Valeo Scala style scanner, which has four layers 0.8 degrees apart and a
/// 145 degree forward facing field of view at 0.25 degree horizontal resolution.
pub fn scala_params() -> SensorParams {
    let beams = linear_space(1.2, -1.2, 4)
        .into_iter()
        .map(|d| d.to_radians())
        .collect();
    let fov = 145.0f64.to_radians();

    SensorParams::from_resolution(beams, 0.25f64.to_radians(), fov, -fov / 2.0)
        .expect("scala preset is valid")
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn velodyne_shape() {
        let params = velodyne_params();
        assert_eq!(params.shape(), (64, 2048));
        assert!(params.is_full_circle());
        assert_relative_eq!(params.elevation_for_row(0), 2.0f64.to_radians(), epsilon = 1e-12);
        assert_relative_eq!(
            params.elevation_for_row(63),
            (-24.0 - 1.0 / 3.0f64).to_radians(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn velodyne_forward_is_centered() {
        let params = velodyne_params();
        assert_eq!(params.col_for_azimuth(1.0e-6), 1024);
        assert_eq!(params.col_for_azimuth(-1.0e-6), 1023);
    }

    #[test]
    fn scala_shape() {
        let params = scala_params();
        assert_eq!(params.shape(), (4, 580));
        assert!(!params.is_full_circle());
        assert!(params.in_fov(0.0));
        assert!(!params.in_fov(PI / 2.0));
        assert_eq!(params.col_for_azimuth(1.0e-6), 290);
    }
}
