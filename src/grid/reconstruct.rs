//! Grid to point cloud reconstruction, the inverse direction of rasterization.
//!
//! Only occupied cells produce points. The output is in row-major scan order, which is
//! deterministic but carries no meaning beyond that. Because rasterization keeps a single point
//! per cell and drops implausible points, rasterizing and then reconstructing yields a subset of
//! the original cloud, never more.

use super::rasterize::check_center;
use super::{Grid, GridLayout, Reconstruction, cell_is_valid};
use crate::sensors::direction_from_angles;
use crate::{Point3, PointCloud, RaysError, Result, SensorParams, Vector3};
use log::debug;
use rayon::ThreadPool;
use rayon::prelude::*;

/// Reconstruct a point cloud from a grid using rayon's global thread pool. See
/// `grid_to_points_in_pool` for the details.
pub fn grid_to_points(
    grid: &Grid,
    params: &SensorParams,
    camera_center: Option<&Vector3>,
    mode: Reconstruction,
) -> Result<PointCloud> {
    grid_to_points_in_pool(grid, params, camera_center, mode, None)
}

/// Reconstruct a point cloud from the occupied cells of a grid.
///
/// With `Reconstruction::BeamDirection` each point is placed along the cell's nominal direction
/// (the row's beam elevation and the column's center azimuth) at the cell's range, so a range
/// channel rewritten by a model is honored. With `Reconstruction::StoredPosition` the position
/// channels written during rasterization are used instead. In both modes `camera_center` is added
/// back and the feature channels are copied unchanged.
///
/// Cells are skipped if their validity flag is unset or their range is not a positive finite
/// number. In `StoredPosition` mode cells with a non-finite stored position are skipped too.
///
/// # Arguments
///
/// * `grid`: a grid whose rows and columns match the sensor
/// * `params`: the sensor geometry the grid was produced for
/// * `camera_center`: the sensor position in the output frame, `None` for the origin
/// * `mode`: how positions are rebuilt
/// * `pool`: an optional thread pool to run in, otherwise rayon's global pool is used
///
/// returns: Result<PointCloud, RaysError>
pub fn grid_to_points_in_pool(
    grid: &Grid,
    params: &SensorParams,
    camera_center: Option<&Vector3>,
    mode: Reconstruction,
    pool: Option<&ThreadPool>,
) -> Result<PointCloud> {
    if (grid.rows(), grid.cols()) != params.shape() {
        return Err(RaysError::Shape(format!(
            "a {}x{} grid does not match a {}x{} sensor",
            grid.rows(),
            grid.cols(),
            params.rows(),
            params.cols()
        )));
    }
    let center = check_center(camera_center)?;

    let run = || {
        let layout = grid.layout();
        let depth = layout.depth();
        let columns = (0..grid.cols())
            .map(|c| params.azimuth_for_col(c))
            .collect::<Vec<_>>();

        let row_clouds = grid
            .data
            .par_chunks(grid.cols() * depth)
            .enumerate()
            .map(|(row, buffer)| {
                let elevation = params.elevation_for_row(row);
                let mut cloud = PointCloud::empty(layout.feature_count());

                for (cell, azimuth) in buffer.chunks_exact(depth).zip(&columns) {
                    if !cell_is_valid(cell, &layout) {
                        continue;
                    }

                    let rel = match mode {
                        Reconstruction::BeamDirection => {
                            direction_from_angles(elevation, *azimuth) * cell[GridLayout::RANGE]
                        }
                        Reconstruction::StoredPosition => {
                            let p = GridLayout::POSITION;
                            Vector3::new(cell[p], cell[p + 1], cell[p + 2])
                        }
                    };
                    if !rel.iter().all(|c| c.is_finite()) {
                        continue;
                    }

                    cloud.push_unchecked(Point3::from(rel + center), &cell[layout.features()]);
                }
                cloud
            })
            .collect::<Vec<_>>();

        let total = row_clouds.iter().map(|c| c.len()).sum();
        let mut result = PointCloud::with_capacity(layout.feature_count(), total);
        for cloud in row_clouds {
            result.append(cloud);
        }

        debug!(
            "[GridToPoints] grid={}x{}x{} mode={:?} points={}",
            grid.rows(),
            grid.cols(),
            depth,
            mode,
            result.len()
        );
        result
    };

    Ok(match pool {
        Some(p) => p.install(run),
        None => run(),
    })
}
