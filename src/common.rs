mod angles;
mod ordered;

pub use angles::{ANGLE_TOL, AngleInterval, angle_to_2pi};
pub use ordered::{Monotonic, monotonic_direction, nearest_index};

/// Generate a vec of values which are linearly spaced between `start` and `end` and which have a
/// count of `count`. The first value will be `start` and the last value will be `end`. A count of
/// one produces just `start`.
///
/// # Arguments
///
/// * `start`: the starting value of the domain, inclusive
/// * `end`: the ending value of the domain, inclusive
/// * `count`: the total number of discrete, evenly spaced values in the domain
///
/// returns: Vec<f64, Global>
///
/// # Examples
///
/// ```
/// use rays::common::linear_space;
/// let domain = linear_space(0.0, 1.0, 3);
/// assert_eq!(domain, vec![0.0, 0.5, 1.0]);
/// ```
pub fn linear_space(start: f64, end: f64, count: usize) -> Vec<f64> {
    if count < 2 {
        return vec![start; count];
    }
    let step = (end - start) / (count - 1) as f64;
    (0..count).map(|i| start + i as f64 * step).collect()
}
