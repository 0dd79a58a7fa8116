//! Point cloud to grid rasterization.
//!
//! Every point is converted to spherical coordinates around the sensor center, assigned to the
//! nearest beam row and to the azimuth column it falls in, and then competes with every other
//! point assigned to the same cell. The closest point wins, the way a real beam only returns the
//! first surface it hits.
//!
//! The work is split in two parallel passes. The first computes the placement of every point
//! independently. The second hands each worker whole rows of the output buffer, so no two workers
//! ever write the same cell and the result does not depend on how many workers there are.

use super::{Grid, GridLayout};
use crate::sensors::spherical_coords;
use crate::{Allowance, PointCloud, RaysError, Result, SensorParams, Vector3};
use log::{debug, trace};
use rayon::ThreadPool;
use rayon::prelude::*;

/// Points at or below this range have no defined direction and are dropped
const MIN_RANGE: f64 = f64::EPSILON;

#[derive(Copy, Clone, Debug)]
struct Candidate {
    index: usize,
    col: usize,
    range: f64,
    rel: Vector3,
}

impl Candidate {
    /// Occlusion tie-break: the closer point wins, and between equally close points the one
    /// that came first in the input wins
    fn beats(&self, other: &Candidate) -> bool {
        self.range < other.range || (self.range == other.range && self.index < other.index)
    }
}

enum Placement {
    Cell(usize, Candidate),
    ZeroRange,
    OutsideFov,
    OutsideAllowance,
}

fn place(
    index: usize,
    rel: Vector3,
    params: &SensorParams,
    allowance: Allowance,
) -> Placement {
    let (range, elevation, azimuth) = spherical_coords(&rel);
    if range <= MIN_RANGE {
        return Placement::ZeroRange;
    }

    if !params.in_fov(azimuth) {
        return Placement::OutsideFov;
    }

    let row = params.row_for_elevation(elevation);
    if !params.accepts(row, elevation, allowance) {
        return Placement::OutsideAllowance;
    }

    Placement::Cell(
        row,
        Candidate {
            index,
            col: params.col_for_azimuth(azimuth),
            range,
            rel,
        },
    )
}

fn check_allowance(allowance: Allowance) -> Result<()> {
    let ok = match allowance {
        Allowance::Angle(a) | Allowance::BeamFraction(a) => !a.is_nan() && a >= 0.0,
        Allowance::Unbounded => true,
    };
    if ok {
        Ok(())
    } else {
        Err(RaysError::InvalidArgument(format!(
            "allowance must be non-negative, got {allowance:?}"
        )))
    }
}

pub(crate) fn check_center(camera_center: Option<&Vector3>) -> Result<Vector3> {
    let center = camera_center.copied().unwrap_or_else(Vector3::zeros);
    if center.iter().all(|c| c.is_finite()) {
        Ok(center)
    } else {
        Err(RaysError::InvalidArgument(format!(
            "camera center must be finite, got [{}, {}, {}]",
            center.x, center.y, center.z
        )))
    }
}

/// Rasterize a point cloud into a dense range-image grid using rayon's global thread pool. See
/// `points_to_grid_in_pool` for the details.
pub fn points_to_grid(
    cloud: &PointCloud,
    params: &SensorParams,
    allowance: impl Into<Allowance>,
    camera_center: Option<&Vector3>,
) -> Result<Grid> {
    points_to_grid_in_pool(cloud, params, allowance, camera_center, None)
}

/// Rasterize a point cloud into a dense `rows x cols` grid for the given sensor, with the channel
/// layout described by `GridLayout` for the cloud's feature count.
///
/// Points are silently dropped when they sit at the sensor center, fall outside the sensor's
/// horizontal field of view, or deviate from their nearest beam by more than `allowance`. When
/// several points land in the same cell the one with the smallest range is kept, and equal ranges
/// are resolved in favor of the earlier point in the cloud. The output is identical for any
/// number of worker threads.
///
/// # Arguments
///
/// * `cloud`: the points, in the ego frame
/// * `params`: the sensor geometry
/// * `allowance`: how far from a beam's elevation a point may be and still be kept; a bare `f64`
///   is interpreted as an angle in radians
/// * `camera_center`: the sensor position in the cloud's frame, subtracted from every point
///   before rasterization. `None` places the sensor at the origin.
/// * `pool`: an optional thread pool to run in, otherwise rayon's global pool is used
///
/// returns: Result<Grid, RaysError>
pub fn points_to_grid_in_pool(
    cloud: &PointCloud,
    params: &SensorParams,
    allowance: impl Into<Allowance>,
    camera_center: Option<&Vector3>,
    pool: Option<&ThreadPool>,
) -> Result<Grid> {
    let allowance = allowance.into();
    check_allowance(allowance)?;
    let center = check_center(camera_center)?;

    let run = || -> Result<Grid> {
        let (rows, cols) = params.shape();
        let layout = GridLayout::new(cloud.feature_count());
        let depth = layout.depth();

        trace!(
            "[PointsToGrid] start: points={} grid={}x{}x{} allowance={:?}",
            cloud.len(),
            rows,
            cols,
            depth,
            allowance
        );

        let placements = cloud
            .points()
            .par_iter()
            .enumerate()
            .map(|(i, p)| place(i, p.coords - center, params, allowance))
            .collect::<Vec<_>>();

        let mut buckets: Vec<Vec<Candidate>> = vec![Vec::new(); rows];
        let (mut zero_range, mut outside_fov, mut outside_allowance) = (0usize, 0usize, 0usize);
        for placement in placements {
            match placement {
                Placement::Cell(row, candidate) => buckets[row].push(candidate),
                Placement::ZeroRange => zero_range += 1,
                Placement::OutsideFov => outside_fov += 1,
                Placement::OutsideAllowance => outside_allowance += 1,
            }
        }

        let mut grid = Grid::empty(rows, cols, layout)?;
        grid.data
            .par_chunks_mut(cols * depth)
            .zip(buckets.par_iter())
            .for_each(|(row_buffer, bucket)| {
                let mut winners: Vec<Option<&Candidate>> = vec![None; cols];
                for candidate in bucket {
                    let slot = &mut winners[candidate.col];
                    if slot.is_none_or(|w| candidate.beats(w)) {
                        *slot = Some(candidate);
                    }
                }

                for (cell, winner) in row_buffer.chunks_exact_mut(depth).zip(winners) {
                    if let Some(w) = winner {
                        cell[GridLayout::RANGE] = w.range;
                        cell[GridLayout::POSITION] = w.rel.x;
                        cell[GridLayout::POSITION + 1] = w.rel.y;
                        cell[GridLayout::POSITION + 2] = w.rel.z;
                        cell[layout.features()].copy_from_slice(cloud.features_of(w.index));
                        cell[layout.validity()] = 1.0;
                    }
                }
            });

        let candidates = buckets.iter().map(|b| b.len()).sum::<usize>();
        debug!(
            "[PointsToGrid] points={} candidates={} occupied={} dropped: zero_range={} outside_fov={} outside_allowance={}",
            cloud.len(),
            candidates,
            grid.valid_count(),
            zero_range,
            outside_fov,
            outside_allowance
        );

        Ok(grid)
    };

    match pool {
        Some(p) => p.install(run),
        None => run(),
    }
}
