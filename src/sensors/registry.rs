//! A registry of named lidar models. Each model bundles a sensor geometry with the allowance and
//! sensor offset that the dataset layer would otherwise bind by hand to every grid and point
//! cloud attribute, and exposes the two grid transformations already parameterized.

use super::{Allowance, SensorParams, SensorSpec, scala_params, velodyne_params};
use crate::grid::{Grid, Reconstruction, grid_to_points, points_to_grid};
use crate::{PointCloud, RaysError, Result, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::str::FromStr;

/// The built-in lidar types
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum LidarType {
    Velodyne,
    Scala,
}

impl LidarType {
    pub const ALL: [LidarType; 2] = [LidarType::Velodyne, LidarType::Scala];

    pub fn name(self) -> &'static str {
        match self {
            LidarType::Velodyne => "velodyne",
            LidarType::Scala => "scala",
        }
    }

    /// The built-in model for this lidar type. Both use a beam fraction allowance of 0.2, which
    /// is how the synthetic capture data is thinned down to plausible beam returns.
    ///
    /// Neither model carries a sensor offset, so the sensor sits at the ego origin. Datasets that
    /// mount the sensor elsewhere bind the offset themselves, e.g. the KITTI style scala shift of
    /// `[2.0, 0.0, -2.0]` is `LidarType::Scala.model().with_offset(Some(Vector3::new(2.0, 0.0, -2.0)))`.
    pub fn model(self) -> LidarModel {
        let params = match self {
            LidarType::Velodyne => velodyne_params(),
            LidarType::Scala => scala_params(),
        };
        LidarModel::new(self.name(), params, Allowance::BeamFraction(0.2), None)
    }
}

impl Display for LidarType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for LidarType {
    type Err = RaysError;

    fn from_str(s: &str) -> Result<Self> {
        LidarType::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| RaysError::UnknownLidar(s.to_string()))
    }
}

/// A named sensor geometry together with the defaults used when rasterizing for it
#[derive(Clone, Debug, PartialEq)]
pub struct LidarModel {
    name: String,
    params: SensorParams,
    allowance: Allowance,
    offset: Option<Vector3>,
}

impl LidarModel {
    pub fn new(
        name: &str,
        params: SensorParams,
        allowance: Allowance,
        offset: Option<Vector3>,
    ) -> Self {
        Self {
            name: name.to_string(),
            params,
            allowance,
            offset,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &SensorParams {
        &self.params
    }

    pub fn allowance(&self) -> Allowance {
        self.allowance
    }

    /// The default sensor center used when the caller does not provide one
    pub fn offset(&self) -> Option<&Vector3> {
        self.offset.as_ref()
    }

    pub fn with_allowance(mut self, allowance: Allowance) -> Self {
        self.allowance = allowance;
        self
    }

    pub fn with_offset(mut self, offset: Option<Vector3>) -> Self {
        self.offset = offset;
        self
    }

    /// Rasterize a point cloud with this model's allowance. An explicit `camera_center` takes
    /// precedence over the model's default offset.
    pub fn points_to_grid(
        &self,
        cloud: &PointCloud,
        camera_center: Option<&Vector3>,
    ) -> Result<Grid> {
        points_to_grid(
            cloud,
            &self.params,
            self.allowance,
            camera_center.or(self.offset.as_ref()),
        )
    }

    /// Reconstruct a point cloud from a grid produced for this model. An explicit
    /// `camera_center` takes precedence over the model's default offset.
    pub fn grid_to_points(
        &self,
        grid: &Grid,
        camera_center: Option<&Vector3>,
        mode: Reconstruction,
    ) -> Result<PointCloud> {
        grid_to_points(
            grid,
            &self.params,
            camera_center.or(self.offset.as_ref()),
            mode,
        )
    }
}

/// The serialized form of a single model in a registry file
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub sensor: SensorSpec,

    #[serde(default)]
    pub allowance: Allowance,

    #[serde(default)]
    pub offset: Option<[f64; 3]>,
}

/// The serialized form of a registry file
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistrySpec {
    #[serde(default)]
    pub models: BTreeMap<String, ModelSpec>,
}

/// Maps lidar type names to models. The registry is an ordinary value owned by the caller, there
/// is no process-wide instance.
#[derive(Clone, Debug, Default)]
pub struct SensorRegistry {
    models: BTreeMap<String, LidarModel>,
}

impl SensorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry containing the built-in "velodyne" and "scala" models
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for t in LidarType::ALL {
            registry.insert(t.model());
        }
        registry
    }

    /// Insert a model under its own name, returning any model it replaced
    pub fn insert(&mut self, model: LidarModel) -> Option<LidarModel> {
        self.models.insert(model.name.clone(), model)
    }

    pub fn get(&self, name: &str) -> Result<&LidarModel> {
        self.models
            .get(name)
            .ok_or_else(|| RaysError::UnknownLidar(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    /// The names of all registered models, in sorted order
    pub fn names(&self) -> Vec<&str> {
        self.models.keys().map(|k| k.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Add every model from a parsed registry description, replacing models with the same
    /// name. Nothing is added if any of the sensor descriptions is invalid.
    pub fn extend_from_spec(&mut self, spec: &RegistrySpec) -> Result<()> {
        let mut parsed = Vec::with_capacity(spec.models.len());
        for (name, model) in spec.models.iter() {
            let params = SensorParams::try_from(&model.sensor).map_err(|e| {
                RaysError::InvalidSensor(format!("model '{name}': {e}"))
            })?;
            let offset = model.offset.map(|[x, y, z]| Vector3::new(x, y, z));
            parsed.push(LidarModel::new(name, params, model.allowance, offset));
        }

        for model in parsed {
            self.insert(model);
        }
        Ok(())
    }

    /// Add the models described by a JSON document, see `RegistrySpec`
    pub fn extend_from_json(&mut self, json: &str) -> Result<()> {
        let spec: RegistrySpec = serde_json::from_str(json)?;
        self.extend_from_spec(&spec)
    }

    /// Add the models described by a JSON file, see `RegistrySpec`
    pub fn load_json(&mut self, path: &Path) -> Result<()> {
        let text = std::fs::read_to_string(path)?;
        self.extend_from_json(&text)
    }
}
