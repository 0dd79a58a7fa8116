//! This module contains common constructs for working with periodic azimuth angles

use std::f64::consts::PI;

pub const ANGLE_TOL: f64 = 1.0e-12;

const TAU: f64 = 2.0 * PI;

/// Re-expresses an angle, specified in radians, in the half-open range [0, 2pi). An angle which is
/// a tiny negative number can round up to exactly 2pi in floating point, in that case 0.0 is
/// returned so that the seam has a single canonical side.
///
/// # Arguments
///
/// * `angle`: The angle to re-express, in radians
///
/// returns: f64
///
/// # Examples
///
/// ```
/// use rays::common::angle_to_2pi;
/// use std::f64::consts::PI;
/// use approx::assert_relative_eq;
/// let new_angle = angle_to_2pi(-PI / 2.0);
/// assert_relative_eq!(new_angle, 1.5 * PI, epsilon = 1.0e-10);
/// ```
pub fn angle_to_2pi(angle: f64) -> f64 {
    let angle = angle.rem_euclid(TAU);
    if angle >= TAU { 0.0 } else { angle }
}

/// A counter-clockwise interval of angles beginning at `start` and sweeping through `angle`
/// radians. Used to describe the horizontal field of view of a sensor.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AngleInterval {
    /// The starting angle of the interval, in radians. Will always take a value in the range
    /// [0, 2pi).
    start: f64,

    /// The swept angle of the interval, in radians, in the range (0, 2pi].
    angle: f64,
}

impl AngleInterval {
    pub fn new(start: f64, angle: f64) -> Self {
        if angle < 0.0 {
            Self {
                start: angle_to_2pi(start + angle),
                angle: angle.abs().min(TAU),
            }
        } else {
            Self {
                start: angle_to_2pi(start),
                angle: angle.min(TAU),
            }
        }
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }

    pub fn is_full_circle(&self) -> bool {
        self.angle >= TAU - ANGLE_TOL
    }

    /// Returns the counter-clockwise offset of `angle` from the start of the interval, in the
    /// range [0, 2pi). The offset may lie past the end of the interval. Offsets within
    /// `ANGLE_TOL` below a full turn snap to 0.0, so the start itself always lands on the
    /// inclusive side of the seam regardless of how it was rounded.
    pub fn offset_of(&self, angle: f64) -> f64 {
        let offset = angle_to_2pi(angle - self.start);
        if offset >= TAU - ANGLE_TOL { 0.0 } else { offset }
    }

    /// Returns true if the interval contains the given angle. The start is inclusive and the end
    /// is exclusive, so a full circle contains every angle exactly once.
    ///
    /// # Arguments
    ///
    /// * `angle`: the angle to test, in radians, in any range
    ///
    /// returns: bool
    pub fn contains(&self, angle: f64) -> bool {
        self.is_full_circle() || self.offset_of(angle) < self.angle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::linear_space;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use test_case::test_case;

    #[test_case(-90.0, 270.0)]
    #[test_case(-180.0, 180.0)]
    #[test_case(360.0, 0.0)]
    #[test_case(725.0, 5.0)]
    #[test_case(-725.0, 355.0)]
    fn angle_to_2pi_wraps(angle: f64, expected: f64) {
        let test = angle_to_2pi(angle.to_radians());
        assert_relative_eq!(test, expected.to_radians(), epsilon = 1.0e-10);
    }

    #[test]
    fn tiny_negative_lands_on_zero() {
        assert_eq!(angle_to_2pi(-1.0e-300), 0.0);
        assert!(angle_to_2pi(-1.0e-9) < TAU);
    }

    #[test]
    fn partial_interval_contains() {
        let interval = AngleInterval::new((-72.5f64).to_radians(), 145.0f64.to_radians());
        assert!(interval.contains(0.0));
        assert!(interval.contains((-72.5f64).to_radians()));
        assert!(interval.contains((-72.0f64).to_radians()));
        assert!(interval.contains(72.0f64.to_radians()));
        assert!(!interval.contains(73.0f64.to_radians()));
        assert!(!interval.contains(PI));
    }

    #[test]
    fn negative_sweep_is_normalized() {
        let interval = AngleInterval::new(0.5, -1.0);
        assert_relative_eq!(interval.start(), angle_to_2pi(-0.5), epsilon = 1.0e-12);
        assert_relative_eq!(interval.angle(), 1.0, epsilon = 1.0e-12);
    }

    #[test]
    fn random_interval_includes_sweep() {
        let mut rnd = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let start = rnd.random_range(-2.0 * PI..2.0 * PI);
            let angle = rnd.random_range(0.1..2.0 * PI - 0.1);
            let interval = AngleInterval::new(start, angle);

            let sweep = linear_space(0.0, angle, 100);
            for da in &sweep[1..sweep.len() - 1] {
                assert!(interval.contains(start + da), "start={start}, da={da}, angle={angle}");
            }

            let outside = start + angle + (TAU - angle) / 2.0;
            assert!(!interval.contains(outside), "start={start}, angle={angle}");
        }
    }
}
