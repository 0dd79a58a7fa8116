//! This module contains the geometric description of rotating multi-beam LiDAR sensors, which
//! determines how a point cloud is discretized into a range-image grid and how grid cells are
//! turned back into directions.
//!
//! A sensor is modeled as a set of fixed beams, each one at a constant elevation angle and each
//! one mapping to a row of the grid, swept horizontally through a field of view which is divided
//! into equally sized azimuth bins, each one mapping to a column of the grid.

mod presets;
mod registry;

use crate::common::{AngleInterval, Monotonic, monotonic_direction, nearest_index};
use crate::grid::{GridLayout, grid_len};
use crate::{RaysError, Result, Vector3};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

pub use presets::{scala_params, velodyne_params};
pub use registry::{LidarModel, LidarType, ModelSpec, RegistrySpec, SensorRegistry};

/// The tolerance used to decide whether a point lies close enough to a beam's nominal elevation
/// to have been produced by that beam. Points outside the tolerance are dropped during
/// rasterization, which keeps points that fall between beams from aliasing onto a row.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Allowance {
    /// Maximum absolute deviation from the beam elevation, in radians
    Angle(f64),

    /// Maximum deviation from the beam elevation as a fraction of the angular distance to the
    /// closest neighboring beam. A value of 0.5 accepts everything between two beams.
    BeamFraction(f64),

    /// Every point is assigned to its nearest beam
    #[default]
    Unbounded,
}

impl From<f64> for Allowance {
    fn from(value: f64) -> Self {
        Allowance::Angle(value)
    }
}

/// The declarative, degree based description of a sensor as it appears in configuration files.
/// Convert it into a validated `SensorParams` with `SensorParams::try_from`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SensorSpec {
    /// Elevation of every beam in degrees, one per grid row, strictly monotonic
    pub beam_elevations_deg: Vec<f64>,

    /// Angular width of a single azimuth bin in degrees
    pub azimuth_resolution_deg: f64,

    /// Total horizontal coverage in degrees
    #[serde(default = "full_circle_deg")]
    pub horizontal_fov_deg: f64,

    /// Azimuth of the leading edge of column 0 in degrees, measured counter-clockwise from the
    /// ego X axis
    #[serde(default)]
    pub azimuth_start_deg: f64,
}

fn full_circle_deg() -> f64 {
    360.0
}

/// The immutable geometric parameters of a rotating multi-beam sensor. Shared read-only by both
/// directions of the grid transformation.
#[derive(Clone, Debug, PartialEq)]
pub struct SensorParams {
    beam_elevations: Vec<f64>,
    direction: Monotonic,
    beam_spacing: Vec<f64>,
    fov: AngleInterval,
    azimuth_bins: usize,
}

impl SensorParams {
    /// Create a new set of sensor parameters.
    ///
    /// # Arguments
    ///
    /// * `beam_elevations`: the elevation angle of each beam in radians, one per grid row. Must
    ///   be strictly ascending or strictly descending.
    /// * `azimuth_bins`: the number of grid columns the field of view is divided into
    /// * `horizontal_fov`: the total horizontal coverage in radians, in (0, 2pi]
    /// * `azimuth_start`: the azimuth in radians at which column 0 begins
    ///
    /// returns: Result<SensorParams, RaysError>
    pub fn new(
        beam_elevations: Vec<f64>,
        azimuth_bins: usize,
        horizontal_fov: f64,
        azimuth_start: f64,
    ) -> Result<Self> {
        let direction = monotonic_direction(&beam_elevations).ok_or_else(|| {
            RaysError::InvalidSensor(
                "beam elevations must be a non-empty, finite, strictly monotonic sequence".into(),
            )
        })?;

        if azimuth_bins == 0 {
            return Err(RaysError::InvalidSensor(
                "sensor must have at least one azimuth bin".into(),
            ));
        }

        // Even a grid without feature channels must be addressable
        grid_len(beam_elevations.len(), azimuth_bins, GridLayout::FEATURES + 1).map_err(|_| {
            RaysError::InvalidSensor(format!(
                "{} beams by {azimuth_bins} azimuth bins is too large a grid",
                beam_elevations.len()
            ))
        })?;

        if !horizontal_fov.is_finite() || horizontal_fov <= 0.0 || horizontal_fov > 2.0 * PI + 1e-9
        {
            return Err(RaysError::InvalidSensor(format!(
                "horizontal field of view must be in (0, 2pi], got {horizontal_fov}"
            )));
        }

        if !azimuth_start.is_finite() {
            return Err(RaysError::InvalidSensor("azimuth start must be finite".into()));
        }

        let beam_spacing = (0..beam_elevations.len())
            .map(|i| {
                let prev = i.checked_sub(1).map(|j| beam_elevations[j]);
                let next = beam_elevations.get(i + 1).copied();
                [prev, next]
                    .into_iter()
                    .flatten()
                    .map(|e| (e - beam_elevations[i]).abs())
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();

        Ok(Self {
            beam_elevations,
            direction,
            beam_spacing,
            fov: AngleInterval::new(azimuth_start, horizontal_fov),
            azimuth_bins,
        })
    }

    /// Create sensor parameters from a desired azimuth resolution rather than a bin count. The
    /// bin count is the field of view divided by the resolution, rounded to the nearest integer,
    /// so the effective resolution may differ slightly from the one requested.
    pub fn from_resolution(
        beam_elevations: Vec<f64>,
        azimuth_resolution: f64,
        horizontal_fov: f64,
        azimuth_start: f64,
    ) -> Result<Self> {
        if !azimuth_resolution.is_finite() || azimuth_resolution <= 0.0 {
            return Err(RaysError::InvalidSensor(format!(
                "azimuth resolution must be positive, got {azimuth_resolution}"
            )));
        }
        let bins = (horizontal_fov / azimuth_resolution).round().max(1.0);
        if bins >= usize::MAX as f64 {
            return Err(RaysError::InvalidSensor(format!(
                "azimuth resolution {azimuth_resolution} gives too many bins"
            )));
        }
        Self::new(beam_elevations, bins as usize, horizontal_fov, azimuth_start)
    }

    /// Number of grid rows, one per beam
    pub fn rows(&self) -> usize {
        self.beam_elevations.len()
    }

    /// Number of grid columns, one per azimuth bin
    pub fn cols(&self) -> usize {
        self.azimuth_bins
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows(), self.cols())
    }

    pub fn beam_elevations(&self) -> &[f64] {
        &self.beam_elevations
    }

    pub fn horizontal_fov(&self) -> f64 {
        self.fov.angle()
    }

    pub fn azimuth_start(&self) -> f64 {
        self.fov.start()
    }

    /// The angular width of one column, in radians
    pub fn azimuth_resolution(&self) -> f64 {
        self.fov.angle() / self.azimuth_bins as f64
    }

    pub fn is_full_circle(&self) -> bool {
        self.fov.is_full_circle()
    }

    /// Map a continuous elevation angle to the row of the nearest beam. Elevations above or
    /// below the configured beams clamp to the outermost rows. A value exactly halfway between
    /// two beams goes to the lower row index.
    pub fn row_for_elevation(&self, elevation: f64) -> usize {
        nearest_index(&self.beam_elevations, self.direction, elevation)
    }

    /// The nominal elevation of the beam for a row. Row indices past the end clamp to the last
    /// row.
    pub fn elevation_for_row(&self, row: usize) -> f64 {
        self.beam_elevations[row.min(self.rows() - 1)]
    }

    /// Map an azimuth angle (any range, radians) to its column. Column `c` covers the half-open
    /// interval `[start + c * w, start + (c + 1) * w)`. For a full circle sensor the seam belongs
    /// to column 0. For a partial field of view, azimuths outside the field clamp to the nearest
    /// edge column; use `in_fov` to reject them instead.
    pub fn col_for_azimuth(&self, azimuth: f64) -> usize {
        let offset = self.fov.offset_of(azimuth);
        if self.is_full_circle() {
            ((offset / self.azimuth_resolution()).floor() as usize) % self.azimuth_bins
        } else if offset >= self.fov.angle() {
            // Outside of the field, snap to whichever edge is angularly closer
            let past_end = offset - self.fov.angle();
            let before_start = 2.0 * PI - offset;
            if past_end < before_start {
                self.azimuth_bins - 1
            } else {
                0
            }
        } else {
            ((offset / self.azimuth_resolution()).floor() as usize).min(self.azimuth_bins - 1)
        }
    }

    /// The azimuth at the center of a column, in the range [0, 2pi). Column indices wrap for a
    /// full circle sensor and clamp otherwise.
    pub fn azimuth_for_col(&self, col: usize) -> f64 {
        let col = if self.is_full_circle() {
            col % self.azimuth_bins
        } else {
            col.min(self.azimuth_bins - 1)
        };
        crate::common::angle_to_2pi(self.fov.start() + (col as f64 + 0.5) * self.azimuth_resolution())
    }

    /// Returns true if the azimuth lies within the sensor's horizontal field of view
    pub fn in_fov(&self, azimuth: f64) -> bool {
        self.fov.contains(azimuth)
    }

    /// Check whether an elevation is close enough to the nominal elevation of `row` to be
    /// accepted under the given allowance. The comparison is inclusive.
    pub fn accepts(&self, row: usize, elevation: f64, allowance: Allowance) -> bool {
        let deviation = (elevation - self.elevation_for_row(row)).abs();
        match allowance {
            Allowance::Angle(limit) => deviation <= limit,
            Allowance::BeamFraction(f) => {
                let spacing = self.beam_spacing[row.min(self.rows() - 1)];
                spacing.is_infinite() || deviation <= f * spacing
            }
            Allowance::Unbounded => true,
        }
    }

    /// The unit vector pointing along the center of a grid cell, in the ego frame (X front,
    /// Y left, Z up)
    pub fn cell_direction(&self, row: usize, col: usize) -> Vector3 {
        direction_from_angles(self.elevation_for_row(row), self.azimuth_for_col(col))
    }
}

impl TryFrom<&SensorSpec> for SensorParams {
    type Error = RaysError;

    fn try_from(spec: &SensorSpec) -> Result<Self> {
        SensorParams::from_resolution(
            spec.beam_elevations_deg.iter().map(|d| d.to_radians()).collect(),
            spec.azimuth_resolution_deg.to_radians(),
            spec.horizontal_fov_deg.to_radians(),
            spec.azimuth_start_deg.to_radians(),
        )
    }
}

impl TryFrom<SensorSpec> for SensorParams {
    type Error = RaysError;

    fn try_from(spec: SensorSpec) -> Result<Self> {
        SensorParams::try_from(&spec)
    }
}

/// Convert a sensor-relative vector into spherical coordinates, returning
/// `(range, elevation, azimuth)`. Elevation is measured up from the XY plane and azimuth
/// counter-clockwise from the X axis, in (-pi, pi].
pub fn spherical_coords(v: &Vector3) -> (f64, f64, f64) {
    let range = v.norm();
    let elevation = v.z.atan2(v.x.hypot(v.y));
    let azimuth = v.y.atan2(v.x);
    (range, elevation, azimuth)
}

/// The unit direction for an elevation and azimuth, the inverse of `spherical_coords`
pub fn direction_from_angles(elevation: f64, azimuth: f64) -> Vector3 {
    let (se, ce) = elevation.sin_cos();
    let (sa, ca) = azimuth.sin_cos();
    Vector3::new(ce * ca, ce * sa, se)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use test_case::test_case;

    fn four_beam() -> SensorParams {
        let beams = [3.0f64, 1.0, -1.0, -3.0].iter().map(|d| d.to_radians()).collect();
        SensorParams::new(beams, 360, 2.0 * PI, 0.0).unwrap()
    }

    #[test]
    fn rejects_bad_tables() {
        assert!(SensorParams::new(vec![], 10, PI, 0.0).is_err());
        assert!(SensorParams::new(vec![0.1, 0.1], 10, PI, 0.0).is_err());
        assert!(SensorParams::new(vec![0.1, 0.3, 0.2], 10, PI, 0.0).is_err());
        assert!(SensorParams::new(vec![0.1], 0, PI, 0.0).is_err());
        assert!(SensorParams::new(vec![0.1], 10, 0.0, 0.0).is_err());
        assert!(SensorParams::new(vec![0.1], 10, 7.0, 0.0).is_err());
        assert!(SensorParams::from_resolution(vec![0.1], 0.0, PI, 0.0).is_err());
    }

    #[test]
    fn rejects_unaddressable_grids() {
        let result = SensorParams::from_resolution(vec![0.0], 1.0e-300, 2.0 * PI, 0.0);
        assert!(matches!(result, Err(RaysError::InvalidSensor(_))));

        let result = SensorParams::new(vec![0.1, 0.2], usize::MAX / 2, 2.0 * PI, 0.0);
        assert!(matches!(result, Err(RaysError::InvalidSensor(_))));

        let spec: SensorSpec = serde_json::from_str(
            r#"{"beam_elevations_deg": [0.0], "azimuth_resolution_deg": 1e-300}"#,
        )
        .unwrap();
        assert!(SensorParams::try_from(&spec).is_err());
    }

    #[test_case(5.0, 0)]
    #[test_case(2.1, 0)]
    #[test_case(1.9, 1)]
    #[test_case(0.2, 1)]
    #[test_case(-0.2, 2)]
    #[test_case(-2.9, 3)]
    #[test_case(-40.0, 3)]
    fn row_lookup_is_nearest_and_clamped(elevation_deg: f64, expected: usize) {
        let params = four_beam();
        assert_eq!(params.row_for_elevation(elevation_deg.to_radians()), expected);
    }

    #[test]
    fn elevation_for_row_is_table_lookup() {
        let params = four_beam();
        for (row, e) in params.beam_elevations().iter().enumerate() {
            assert_eq!(params.elevation_for_row(row), *e);
            assert_eq!(params.row_for_elevation(*e), row);
        }
        assert_eq!(params.elevation_for_row(99), params.beam_elevations()[3]);
    }

    #[test_case(0.0, 0)]
    #[test_case(0.5, 0)]
    #[test_case(1.5, 1)]
    #[test_case(359.5, 359)]
    #[test_case(360.0, 0)]
    #[test_case(-0.5, 359)]
    #[test_case(-179.5, 180)]
    #[test_case(720.25, 0)]
    fn column_lookup_wraps(azimuth_deg: f64, expected: usize) {
        let params = four_beam();
        assert_eq!(params.col_for_azimuth(azimuth_deg.to_radians()), expected);
    }

    #[test]
    fn seam_is_a_single_column() {
        let params = four_beam();
        let eps = 1.0e-6;
        assert_eq!(
            params.col_for_azimuth(-eps),
            params.col_for_azimuth(2.0 * PI - eps)
        );
        assert_eq!(params.col_for_azimuth(-1.0e-300), 0);
    }

    #[test]
    fn column_center_round_trips() {
        let params = four_beam();
        for col in 0..params.cols() {
            let az = params.azimuth_for_col(col);
            assert!((0.0..2.0 * PI).contains(&az));
            assert_eq!(params.col_for_azimuth(az), col);
        }
        assert_relative_eq!(params.azimuth_for_col(0), 0.5f64.to_radians(), epsilon = 1e-12);
        assert_eq!(params.azimuth_for_col(360), params.azimuth_for_col(0));
    }

    #[test]
    fn partial_fov_clamps_and_rejects() {
        let beams = vec![0.0];
        let params = SensorParams::from_resolution(
            beams,
            1.0f64.to_radians(),
            90.0f64.to_radians(),
            (-45.0f64).to_radians(),
        )
        .unwrap();
        assert_eq!(params.cols(), 90);
        assert_eq!(params.col_for_azimuth(0.5f64.to_radians()), 45);
        assert_eq!(params.col_for_azimuth((-45.0f64).to_radians()), 0);
        assert_eq!(params.col_for_azimuth(50.0f64.to_radians()), 89);
        assert_eq!(params.col_for_azimuth((-50.0f64).to_radians()), 0);
        assert!(params.in_fov(44.0f64.to_radians()));
        assert!(!params.in_fov(46.0f64.to_radians()));
        assert!(!params.in_fov(PI));
    }

    #[test]
    fn allowance_modes() {
        let params = four_beam();
        let near = 1.3f64.to_radians();
        let far = 1.7f64.to_radians();

        assert!(params.accepts(1, near, Allowance::Angle(0.35f64.to_radians())));
        assert!(!params.accepts(1, far, Allowance::Angle(0.35f64.to_radians())));

        // Beam spacing is 2 degrees, so 0.2 of it is 0.4 degrees
        assert!(params.accepts(1, near, Allowance::BeamFraction(0.2)));
        assert!(!params.accepts(1, far, Allowance::BeamFraction(0.2)));

        assert!(params.accepts(1, far, Allowance::Unbounded));
    }

    #[test]
    fn single_beam_fraction_accepts_everything() {
        let params = SensorParams::new(vec![0.0], 8, 2.0 * PI, 0.0).unwrap();
        assert!(params.accepts(0, 0.5, Allowance::BeamFraction(0.1)));
    }

    #[test]
    fn spec_conversion_uses_degrees() {
        let spec: SensorSpec = serde_json::from_str(
            r#"{"beam_elevations_deg": [2.0, 0.0, -2.0], "azimuth_resolution_deg": 0.5}"#,
        )
        .unwrap();
        let params = SensorParams::try_from(&spec).unwrap();
        assert_eq!(params.shape(), (3, 720));
        assert!(params.is_full_circle());
        assert_relative_eq!(params.elevation_for_row(0), 2.0f64.to_radians(), epsilon = 1e-12);
    }

    #[test]
    fn spherical_round_trip() {
        let v = Vector3::new(3.0, -4.0, 2.0);
        let (r, el, az) = spherical_coords(&v);
        let back = direction_from_angles(el, az) * r;
        assert_relative_eq!(back, v, epsilon = 1e-12);
    }
}
