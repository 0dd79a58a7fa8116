//! Rasterization of rotating multi-beam LiDAR point clouds into dense range-image grids, and the
//! reconstruction of point clouds from those grids.
//!
//! The two transformations, [`points_to_grid`] and [`grid_to_points`], are pure functions over
//! caller owned data. They share nothing but an immutable [`SensorParams`] descriptor and the
//! channel layout described by [`GridLayout`].

pub mod common;
mod errors;
pub mod grid;
pub mod point_cloud;
pub mod sensors;
pub mod store;

#[cfg(test)]
mod test_utils;

pub use errors::{RaysError, Result};
pub use grid::{
    Grid, GridLayout, Reconstruction, grid_to_points, grid_to_points_in_pool, points_to_grid,
    points_to_grid_in_pool,
};
pub use point_cloud::PointCloud;
pub use sensors::{Allowance, LidarModel, LidarType, SensorParams, SensorRegistry, SensorSpec};
pub use store::AttributeStore;

pub use parry3d_f64::na;

pub type Point3 = parry3d_f64::na::Point3<f64>;
pub type Vector3 = parry3d_f64::na::Vector3<f64>;
pub type Iso3 = parry3d_f64::na::Isometry3<f64>;
pub type Aabb3 = parry3d_f64::bounding_volume::Aabb;
