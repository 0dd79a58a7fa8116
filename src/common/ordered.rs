//! Lookups over strictly monotonic tables of f64 values, such as the beam elevations of a sensor.

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Monotonic {
    Ascending,
    Descending,
}

/// Determine whether `values` is strictly ascending or strictly descending. Returns `None` if
/// the slice is empty, contains a non-finite value, repeats a value, or changes direction. A
/// single finite value counts as ascending.
pub fn monotonic_direction(values: &[f64]) -> Option<Monotonic> {
    if values.is_empty() || values.iter().any(|v| !v.is_finite()) {
        return None;
    }
    if values.windows(2).all(|w| w[0] < w[1]) {
        Some(Monotonic::Ascending)
    } else if values.windows(2).all(|w| w[0] > w[1]) {
        Some(Monotonic::Descending)
    } else {
        None
    }
}

/// Find the index of the value in a strictly monotonic, non-empty table which is closest to
/// `value`. Values beyond either end of the table clamp to that end. When `value` lies exactly
/// halfway between two entries the lower index is returned.
///
/// # Arguments
///
/// * `table`: the strictly monotonic table to search
/// * `direction`: the ordering of `table`, as returned by `monotonic_direction`
/// * `value`: the value to look up
///
/// returns: usize
///
/// # Examples
///
/// ```
/// use rays::common::{nearest_index, Monotonic};
/// let table = [3.0, 2.0, 1.0];
/// assert_eq!(nearest_index(&table, Monotonic::Descending, 2.2), 1);
/// assert_eq!(nearest_index(&table, Monotonic::Descending, 10.0), 0);
/// assert_eq!(nearest_index(&table, Monotonic::Descending, 1.5), 1);
/// ```
pub fn nearest_index(table: &[f64], direction: Monotonic, value: f64) -> usize {
    // First index whose entry lies at or beyond `value` in table order
    let upper = match direction {
        Monotonic::Ascending => table.partition_point(|&t| t < value),
        Monotonic::Descending => table.partition_point(|&t| t > value),
    };

    if upper == 0 {
        return 0;
    }
    if upper >= table.len() {
        return table.len() - 1;
    }

    let lower = upper - 1;
    if (value - table[lower]).abs() <= (table[upper] - value).abs() {
        lower
    } else {
        upper
    }
}
