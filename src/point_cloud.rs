//! A point cloud of 3D positions with a fixed number of caller defined feature channels per point
//! (class label, color, intensity, a returned-ray flag, etc). The feature channels are opaque to
//! this crate: their count and order are preserved verbatim through every operation.

use crate::{Aabb3, Iso3, Point3, RaysError, Result};
use itertools::izip;

#[derive(Clone, Debug, PartialEq)]
pub struct PointCloud {
    points: Vec<Point3>,
    features: Vec<f64>,
    feature_count: usize,
}

fn check_finite(index: usize, p: &Point3) -> Result<()> {
    if p.coords.iter().all(|c| c.is_finite()) {
        Ok(())
    } else {
        Err(RaysError::NonFinite {
            index,
            x: p.x,
            y: p.y,
            z: p.z,
        })
    }
}

fn position_channels(channels: usize) -> Result<usize> {
    if channels < 3 {
        return Err(RaysError::Shape(format!(
            "a point cloud needs at least 3 position channels, got {channels}"
        )));
    }
    Ok(channels - 3)
}

impl PointCloud {
    /// Create a new point cloud from positions and a flat, point-major buffer of features.
    ///
    /// # Arguments
    ///
    /// * `points`: the positions, which must all be finite
    /// * `features`: `feature_count` values for each point, stored point after point
    /// * `feature_count`: the number of feature channels per point, may be zero
    ///
    /// returns: Result<PointCloud, RaysError>
    pub fn try_new(points: Vec<Point3>, features: Vec<f64>, feature_count: usize) -> Result<Self> {
        if features.len() != points.len() * feature_count {
            return Err(RaysError::Shape(format!(
                "expected {} feature values for {} points with {} channels, got {}",
                points.len() * feature_count,
                points.len(),
                feature_count,
                features.len()
            )));
        }

        for (i, p) in points.iter().enumerate() {
            check_finite(i, p)?;
        }

        Ok(Self {
            points,
            features,
            feature_count,
        })
    }

    /// Create an empty point cloud which will carry `feature_count` features per point
    pub fn empty(feature_count: usize) -> Self {
        Self {
            points: Vec::new(),
            features: Vec::new(),
            feature_count,
        }
    }

    pub(crate) fn with_capacity(feature_count: usize, capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
            features: Vec::with_capacity(capacity * feature_count),
            feature_count,
        }
    }

    /// Build a point cloud from a channel-major array, the `(channel, point)` layout the dataset
    /// layer stores point clouds in. Channels 0, 1, 2 are x, y, z and every following channel is
    /// a feature.
    ///
    /// # Arguments
    ///
    /// * `data`: `channels * n` values, channel after channel
    /// * `channels`: total channel count including the three position channels
    ///
    /// returns: Result<PointCloud, RaysError>
    ///
    /// # Examples
    ///
    /// ```
    /// use rays::PointCloud;
    /// // two points, x, y, z and one label channel
    /// let data = [1.0, 2.0, 0.0, 0.0, 0.5, 0.5, 7.0, 9.0];
    /// let cloud = PointCloud::from_channel_major(&data, 4).unwrap();
    /// assert_eq!(cloud.len(), 2);
    /// assert_eq!(cloud.features_of(1), &[9.0]);
    /// ```
    pub fn from_channel_major(data: &[f64], channels: usize) -> Result<Self> {
        let feature_count = position_channels(channels)?;
        if data.len() % channels != 0 {
            return Err(RaysError::Shape(format!(
                "buffer of {} values is not divisible into {} channels",
                data.len(),
                channels
            )));
        }

        let n = data.len() / channels;
        let points = izip!(&data[..n], &data[n..2 * n], &data[2 * n..3 * n])
            .map(|(&x, &y, &z)| Point3::new(x, y, z))
            .collect::<Vec<_>>();

        let mut features = Vec::with_capacity(n * feature_count);
        for i in 0..n {
            features.extend((0..feature_count).map(|f| data[(3 + f) * n + i]));
        }

        Self::try_new(points, features, feature_count)
    }

    /// The inverse of `from_channel_major`
    pub fn to_channel_major(&self) -> Vec<f64> {
        let n = self.len();
        let mut data = Vec::with_capacity(n * self.channels());
        data.extend(self.points.iter().map(|p| p.x));
        data.extend(self.points.iter().map(|p| p.y));
        data.extend(self.points.iter().map(|p| p.z));
        for f in 0..self.feature_count {
            data.extend((0..n).map(|i| self.features[i * self.feature_count + f]));
        }
        data
    }

    /// Build a point cloud from a point-major array, where each point's x, y, z and features are
    /// stored contiguously.
    pub fn from_point_major(data: &[f64], channels: usize) -> Result<Self> {
        let feature_count = position_channels(channels)?;
        if data.len() % channels != 0 {
            return Err(RaysError::Shape(format!(
                "buffer of {} values is not divisible into rows of {} channels",
                data.len(),
                channels
            )));
        }

        let n = data.len() / channels;
        let mut points = Vec::with_capacity(n);
        let mut features = Vec::with_capacity(n * feature_count);
        for row in data.chunks_exact(channels) {
            points.push(Point3::new(row[0], row[1], row[2]));
            features.extend_from_slice(&row[3..]);
        }

        Self::try_new(points, features, feature_count)
    }

    /// The inverse of `from_point_major`
    pub fn to_point_major(&self) -> Vec<f64> {
        let mut data = Vec::with_capacity(self.len() * self.channels());
        for (i, p) in self.points.iter().enumerate() {
            data.extend_from_slice(&[p.x, p.y, p.z]);
            data.extend_from_slice(self.features_of(i));
        }
        data
    }

    /// Concatenate several frames into one cloud, as is done when a window of consecutive frames
    /// is rasterized together. All clouds must carry the same number of feature channels.
    pub fn stack(clouds: &[PointCloud]) -> Result<Self> {
        let Some(first) = clouds.first() else {
            return Err(RaysError::Shape("cannot stack an empty list of point clouds".into()));
        };

        if let Some(bad) = clouds.iter().find(|c| c.feature_count != first.feature_count) {
            return Err(RaysError::Shape(format!(
                "cannot stack point clouds with {} and {} feature channels",
                first.feature_count, bad.feature_count
            )));
        }

        let total = clouds.iter().map(|c| c.len()).sum();
        let mut result = Self::with_capacity(first.feature_count, total);
        for cloud in clouds {
            result.points.extend_from_slice(&cloud.points);
            result.features.extend_from_slice(&cloud.features);
        }
        Ok(result)
    }

    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    /// The flat, point-major feature buffer
    pub fn features(&self) -> &[f64] {
        &self.features
    }

    /// The feature channels of the point at `index`
    pub fn features_of(&self, index: usize) -> &[f64] {
        let start = index * self.feature_count;
        &self.features[start..start + self.feature_count]
    }

    pub fn feature_count(&self) -> usize {
        self.feature_count
    }

    /// Total channel count, the three position channels plus the features
    pub fn channels(&self) -> usize {
        3 + self.feature_count
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Add a single point to the cloud. The number of features must match the cloud's feature
    /// count and the position must be finite.
    pub fn push(&mut self, point: Point3, features: &[f64]) -> Result<()> {
        if features.len() != self.feature_count {
            return Err(RaysError::Shape(format!(
                "expected {} features, got {}",
                self.feature_count,
                features.len()
            )));
        }
        check_finite(self.points.len(), &point)?;
        self.push_unchecked(point, features);
        Ok(())
    }

    pub(crate) fn push_unchecked(&mut self, point: Point3, features: &[f64]) {
        self.points.push(point);
        self.features.extend_from_slice(features);
    }

    /// Append another cloud with the same feature count to the end of this one
    pub(crate) fn append(&mut self, other: PointCloud) {
        self.points.extend(other.points);
        self.features.extend(other.features);
    }

    /// Create a new point cloud from a subset of this one's points, in the order given
    pub fn select(&self, indices: &[usize]) -> Result<Self> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.len()) {
            return Err(RaysError::Shape(format!(
                "index {bad} out of bounds for a cloud of {} points",
                self.len()
            )));
        }

        let mut result = Self::with_capacity(self.feature_count, indices.len());
        for &i in indices {
            result.push_unchecked(self.points[i], self.features_of(i));
        }
        Ok(result)
    }

    /// The axis aligned bounding box of the points, or `None` if the cloud is empty
    pub fn aabb(&self) -> Option<Aabb3> {
        if self.is_empty() {
            None
        } else {
            Some(Aabb3::from_points(&self.points))
        }
    }

    /// Keep only the points that lie inside the bounding box (boundary inclusive)
    pub fn crop_to_aabb(&self, aabb: &Aabb3) -> Self {
        let indices = self
            .points
            .iter()
            .enumerate()
            .filter_map(|(i, p)| aabb.contains_local_point(p).then_some(i))
            .collect::<Vec<_>>();

        let mut result = Self::with_capacity(self.feature_count, indices.len());
        for i in indices {
            result.push_unchecked(self.points[i], self.features_of(i));
        }
        result
    }

    /// Keep only the points strictly within `half_extents` of the origin on every axis, which is
    /// how far-away returns are discarded before rasterization.
    pub fn within_extents(&self, hx: f64, hy: f64, hz: f64) -> Self {
        let mut result = Self::with_capacity(self.feature_count, self.len());
        for (i, p) in self.points.iter().enumerate() {
            if p.x.abs() < hx && p.y.abs() < hy && p.z.abs() < hz {
                result.push_unchecked(*p, self.features_of(i));
            }
        }
        result
    }

    /// Transform every position in place by a rigid transformation. Features are untouched.
    pub fn transform_by(&mut self, transform: &Iso3) {
        for p in &mut self.points {
            *p = transform * *p;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Vector3;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn sample() -> PointCloud {
        let points = vec![
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
            Point3::new(0.0, 0.0, 3.0),
        ];
        let features = vec![1.0, 10.0, 2.0, 20.0, 3.0, 30.0];
        PointCloud::try_new(points, features, 2).unwrap()
    }

    #[test]
    fn rejects_mismatched_features() {
        let result = PointCloud::try_new(vec![Point3::origin()], vec![1.0, 2.0], 1);
        assert!(matches!(result, Err(RaysError::Shape(_))));
    }

    #[test]
    fn rejects_non_finite_positions() {
        let points = vec![Point3::origin(), Point3::new(1.0, f64::NAN, 0.0)];
        let result = PointCloud::try_new(points, vec![], 0);
        assert!(matches!(result, Err(RaysError::NonFinite { index: 1, .. })));
    }

    #[test]
    fn non_finite_features_are_carried() {
        let cloud = PointCloud::try_new(vec![Point3::origin()], vec![f64::NAN], 1).unwrap();
        assert!(cloud.features_of(0)[0].is_nan());
    }

    #[test]
    fn channel_major_layout() {
        let cloud = sample();
        let data = cloud.to_channel_major();
        assert_eq!(
            data,
            vec![1.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 3.0, 1.0, 2.0, 3.0, 10.0, 20.0, 30.0]
        );
        assert_eq!(PointCloud::from_channel_major(&data, 5).unwrap(), cloud);
    }

    #[test]
    fn point_major_layout() {
        let cloud = sample();
        let data = cloud.to_point_major();
        assert_eq!(&data[..5], &[1.0, 0.0, 0.0, 1.0, 10.0]);
        assert_eq!(PointCloud::from_point_major(&data, 5).unwrap(), cloud);
    }

    #[test]
    fn layouts_reject_bad_shapes() {
        assert!(PointCloud::from_channel_major(&[1.0, 2.0], 2).is_err());
        assert!(PointCloud::from_channel_major(&[1.0; 7], 4).is_err());
        assert!(PointCloud::from_point_major(&[1.0; 7], 3).is_err());
    }

    #[test]
    fn stack_concatenates_frames() {
        let a = sample();
        let b = sample();
        let stacked = PointCloud::stack(&[a, b]).unwrap();
        assert_eq!(stacked.len(), 6);
        assert_eq!(stacked.features_of(4), &[2.0, 20.0]);

        let other = PointCloud::empty(1);
        assert!(PointCloud::stack(&[sample(), other]).is_err());
        assert!(PointCloud::stack(&[]).is_err());
    }

    #[test]
    fn push_checks_consistency() {
        let mut cloud = PointCloud::empty(1);
        assert!(cloud.push(Point3::origin(), &[]).is_err());
        assert!(cloud.push(Point3::new(f64::INFINITY, 0.0, 0.0), &[1.0]).is_err());
        cloud.push(Point3::origin(), &[4.0]).unwrap();
        assert_eq!(cloud.len(), 1);
    }

    #[test]
    fn select_and_bounds() {
        let cloud = sample();
        let picked = cloud.select(&[2, 0]).unwrap();
        assert_eq!(picked.points()[0], Point3::new(0.0, 0.0, 3.0));
        assert_eq!(picked.features_of(1), &[1.0, 10.0]);
        assert!(cloud.select(&[3]).is_err());
    }

    #[test]
    fn crop_filters_points() {
        let cloud = sample();
        let aabb = cloud.aabb().unwrap();
        assert_eq!(aabb.maxs, Point3::new(1.0, 2.0, 3.0));
        assert_eq!(cloud.crop_to_aabb(&aabb).len(), 3);

        let small = Aabb3::new(Point3::new(-0.5, -0.5, -0.5), Point3::new(1.5, 1.5, 1.5));
        let cropped = cloud.crop_to_aabb(&small);
        assert_eq!(cropped.len(), 1);
        assert_eq!(cropped.features_of(0), &[1.0, 10.0]);

        assert_eq!(cloud.within_extents(2.5, 2.5, 2.5).len(), 2);
        assert!(PointCloud::empty(0).aabb().is_none());
    }

    #[test]
    fn transform_moves_positions_only() {
        let mut cloud = sample();
        let iso = Iso3::new(Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 0.0, PI / 2.0));
        cloud.transform_by(&iso);
        assert_relative_eq!(cloud.points()[0], Point3::new(1.0, 1.0, 0.0), epsilon = 1e-12);
        assert_eq!(cloud.features_of(0), &[1.0, 10.0]);
    }
}
