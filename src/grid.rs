//! This module contains the dense range-image grid and the two transformations between grids and
//! point clouds.
//!
//! A grid has one row per sensor beam and one column per azimuth bin. Every cell holds the same
//! sequence of channels, described by `GridLayout`:
//!
//! | channel          | contents                                                    |
//! |------------------|-------------------------------------------------------------|
//! | 0                | range from the sensor center                                |
//! | 1, 2, 3          | x, y, z of the winning point relative to the sensor center  |
//! | 4 .. 4 + F       | the winning point's feature channels, verbatim              |
//! | 4 + F            | validity, 1.0 for an occupied cell and 0.0 otherwise        |
//!
//! Unoccupied cells are all zeros. The buffer is stored row-major as `(row, column, channel)`.

mod rasterize;
mod reconstruct;

use crate::{RaysError, Result};
use std::ops::Range;

pub use rasterize::{points_to_grid, points_to_grid_in_pool};
pub use reconstruct::{grid_to_points, grid_to_points_in_pool};

/// Describes the channel layout of a grid cell for a given number of feature channels
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GridLayout {
    feature_count: usize,
}

impl GridLayout {
    pub const RANGE: usize = 0;
    pub const POSITION: usize = 1;
    pub const FEATURES: usize = 4;

    pub fn new(feature_count: usize) -> Self {
        Self { feature_count }
    }

    /// Recover the layout from a total channel depth, which must be at least 5 (range, position
    /// and validity with no features)
    pub fn from_depth(depth: usize) -> Result<Self> {
        if depth < Self::FEATURES + 1 {
            return Err(RaysError::Shape(format!(
                "grid depth must be at least {}, got {depth}",
                Self::FEATURES + 1
            )));
        }
        Ok(Self::new(depth - Self::FEATURES - 1))
    }

    pub fn feature_count(&self) -> usize {
        self.feature_count
    }

    /// The channel index of feature `i`
    pub fn feature(&self, i: usize) -> usize {
        Self::FEATURES + i
    }

    pub fn features(&self) -> Range<usize> {
        Self::FEATURES..Self::FEATURES + self.feature_count
    }

    pub fn validity(&self) -> usize {
        Self::FEATURES + self.feature_count
    }

    /// Total number of channels per cell
    pub fn depth(&self) -> usize {
        self.validity() + 1
    }
}

/// How `grid_to_points` turns an occupied cell back into a position
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum Reconstruction {
    /// Place the point along the nominal direction of the cell (beam elevation and column center
    /// azimuth) at the stored range. This is the only mode that honors an edited range channel.
    #[default]
    BeamDirection,

    /// Use the position channels stored for the winning point, which reproduces it exactly
    StoredPosition,
}

/// A dense `rows x cols x depth` range-image grid
#[derive(Clone, Debug, PartialEq)]
pub struct Grid {
    rows: usize,
    cols: usize,
    layout: GridLayout,
    data: Vec<f64>,
}

impl Grid {
    /// Create a grid with every cell at the sentinel (all channels zero). Fails if the total
    /// number of values does not fit in a `usize`.
    pub fn empty(rows: usize, cols: usize, layout: GridLayout) -> Result<Self> {
        let len = grid_len(rows, cols, layout.depth())?;
        Ok(Self {
            rows,
            cols,
            layout,
            data: vec![0.0; len],
        })
    }

    /// Wrap a flat `(row, column, channel)` buffer, such as one loaded by the dataset layer
    ///
    /// # Arguments
    ///
    /// * `rows`: number of rows
    /// * `cols`: number of columns
    /// * `depth`: channels per cell, at least 5
    /// * `data`: exactly `rows * cols * depth` values
    ///
    /// returns: Result<Grid, RaysError>
    pub fn from_raw(rows: usize, cols: usize, depth: usize, data: Vec<f64>) -> Result<Self> {
        let layout = GridLayout::from_depth(depth)?;
        let len = grid_len(rows, cols, depth)?;
        if data.len() != len {
            return Err(RaysError::Shape(format!(
                "expected {len} values for a {rows}x{cols}x{depth} grid, got {}",
                data.len()
            )));
        }
        Ok(Self {
            rows,
            cols,
            layout,
            data,
        })
    }

    pub fn into_raw(self) -> Vec<f64> {
        self.data
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn depth(&self) -> usize {
        self.layout.depth()
    }

    pub fn layout(&self) -> GridLayout {
        self.layout
    }

    /// `(rows, cols, depth)`
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.rows, self.cols, self.depth())
    }

    fn offset(&self, row: usize, col: usize) -> usize {
        assert!(
            row < self.rows && col < self.cols,
            "cell ({row}, {col}) out of bounds for a {}x{} grid",
            self.rows,
            self.cols
        );
        (row * self.cols + col) * self.depth()
    }

    /// All channels of one cell. Panics if the cell is out of bounds.
    pub fn cell(&self, row: usize, col: usize) -> &[f64] {
        let start = self.offset(row, col);
        &self.data[start..start + self.depth()]
    }

    pub fn range_at(&self, row: usize, col: usize) -> f64 {
        self.cell(row, col)[GridLayout::RANGE]
    }

    pub fn features_at(&self, row: usize, col: usize) -> &[f64] {
        &self.cell(row, col)[self.layout.features()]
    }

    /// True if the cell holds a point: the validity flag is set and the range is a positive,
    /// finite number
    pub fn is_valid(&self, row: usize, col: usize) -> bool {
        cell_is_valid(self.cell(row, col), &self.layout)
    }

    /// Number of occupied cells
    pub fn valid_count(&self) -> usize {
        self.data
            .chunks_exact(self.depth())
            .filter(|c| cell_is_valid(c, &self.layout))
            .count()
    }

    /// Extract a single channel as a `rows x cols` row-major plane
    pub fn channel(&self, channel: usize) -> Result<Vec<f64>> {
        self.check_channel(channel)?;
        Ok(self
            .data
            .chunks_exact(self.depth())
            .map(|c| c[channel])
            .collect())
    }

    /// Overwrite a single channel from a `rows x cols` row-major plane, as when a model has
    /// predicted new values for it
    pub fn set_channel(&mut self, channel: usize, values: &[f64]) -> Result<()> {
        self.check_channel(channel)?;
        if values.len() != self.rows * self.cols {
            return Err(RaysError::Shape(format!(
                "expected {} values for channel {channel}, got {}",
                self.rows * self.cols,
                values.len()
            )));
        }
        let depth = self.depth();
        for (cell, v) in self.data.chunks_exact_mut(depth).zip(values) {
            cell[channel] = *v;
        }
        Ok(())
    }

    /// Copy out a window of rows and columns. The result is no longer aligned with the sensor
    /// that produced this grid, so it is meant for consumers such as model inputs rather than
    /// for reconstruction.
    pub fn crop(&self, rows: Range<usize>, cols: Range<usize>) -> Result<Grid> {
        if rows.start > rows.end || rows.end > self.rows || cols.start > cols.end || cols.end > self.cols
        {
            return Err(RaysError::Shape(format!(
                "window {rows:?} x {cols:?} does not fit a {}x{} grid",
                self.rows, self.cols
            )));
        }

        let depth = self.depth();
        let mut data = Vec::with_capacity(rows.len() * cols.len() * depth);
        for r in rows.clone() {
            let start = (r * self.cols + cols.start) * depth;
            let end = (r * self.cols + cols.end) * depth;
            data.extend_from_slice(&self.data[start..end]);
        }

        Ok(Grid {
            rows: rows.len(),
            cols: cols.len(),
            layout: self.layout,
            data,
        })
    }

    fn check_channel(&self, channel: usize) -> Result<()> {
        if channel >= self.depth() {
            return Err(RaysError::Shape(format!(
                "channel {channel} out of range for a grid of depth {}",
                self.depth()
            )));
        }
        Ok(())
    }
}

/// The number of values in a `rows x cols x depth` buffer
pub(crate) fn grid_len(rows: usize, cols: usize, depth: usize) -> Result<usize> {
    rows.checked_mul(cols)
        .and_then(|n| n.checked_mul(depth))
        .ok_or_else(|| {
            RaysError::Shape(format!("a {rows}x{cols}x{depth} grid is too large to allocate"))
        })
}

pub(crate) fn cell_is_valid(cell: &[f64], layout: &GridLayout) -> bool {
    let range = cell[GridLayout::RANGE];
    cell[layout.validity()] > 0.5 && range.is_finite() && range > 0.0
}
