//! A memoizing store for per-entry dataset attributes, such as the grid and reconstructed point
//! cloud of a frame. Values are keyed by `(entry id, attribute name)` and materialized on first
//! access: from the in-memory cache if present, otherwise through the attribute's `load`
//! callback, otherwise by calling `create` and handing the result to `save`.
//!
//! The store knows nothing about files or formats, those live entirely in the callbacks. It is
//! an ordinary value owned by the caller, and nothing in the rasterization functions uses it.

use crate::{RaysError, Result};
use log::debug;
use std::collections::HashMap;

type CreateFn<V> = Box<dyn Fn(usize) -> Result<V>>;
type LoadFn<V> = Box<dyn Fn(usize) -> Result<Option<V>>>;
type SaveFn<V> = Box<dyn Fn(usize, &V) -> Result<()>>;

/// The callbacks that produce and persist one named attribute
pub struct Attribute<V> {
    create: CreateFn<V>,
    load: Option<LoadFn<V>>,
    save: Option<SaveFn<V>>,
}

impl<V> Attribute<V> {
    /// An attribute which is computed by `create` and only ever cached in memory
    pub fn new(create: impl Fn(usize) -> Result<V> + 'static) -> Self {
        Self {
            create: Box::new(create),
            load: None,
            save: None,
        }
    }

    /// Set a callback which tries to load a previously persisted value. It returns `Ok(None)` when
    /// nothing has been persisted for the entry yet.
    pub fn with_load(mut self, load: impl Fn(usize) -> Result<Option<V>> + 'static) -> Self {
        self.load = Some(Box::new(load));
        self
    }

    /// Set a callback which persists a freshly created value
    pub fn with_save(mut self, save: impl Fn(usize, &V) -> Result<()> + 'static) -> Self {
        self.save = Some(Box::new(save));
        self
    }
}

pub struct AttributeStore<V> {
    attributes: HashMap<String, Attribute<V>>,
    cache: HashMap<(usize, String), V>,
}

impl<V> Default for AttributeStore<V> {
    fn default() -> Self {
        Self {
            attributes: HashMap::new(),
            cache: HashMap::new(),
        }
    }
}

impl<V> AttributeStore<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an attribute under a name, replacing any previous registration. Cached values of
    /// a replaced attribute are discarded.
    pub fn register(&mut self, name: &str, attribute: Attribute<V>) {
        if self.attributes.insert(name.to_string(), attribute).is_some() {
            self.cache.retain(|(_, n), _| n != name);
        }
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// True if the value is currently held in memory
    pub fn is_cached(&self, entry: usize, name: &str) -> bool {
        self.cache.contains_key(&(entry, name.to_string()))
    }

    /// Get an attribute value for an entry, materializing it if necessary. On a cache miss the
    /// `load` callback is tried first; if it has nothing, the value is created and then saved.
    /// A failing callback leaves the store unchanged.
    pub fn get(&mut self, entry: usize, name: &str) -> Result<&V> {
        let key = (entry, name.to_string());
        if !self.cache.contains_key(&key) {
            let value = self.materialize(entry, name)?;
            self.cache.insert(key.clone(), value);
        }

        self.cache
            .get(&key)
            .ok_or_else(|| RaysError::Store(format!("attribute '{name}' vanished for {entry}")))
    }

    fn materialize(&self, entry: usize, name: &str) -> Result<V> {
        let attribute = self
            .attributes
            .get(name)
            .ok_or_else(|| RaysError::Store(format!("no attribute named '{name}'")))?;

        if let Some(load) = &attribute.load {
            if let Some(value) = load(entry)? {
                debug!("[AttributeStore] loaded '{name}' for entry {entry}");
                return Ok(value);
            }
        }

        let value = (attribute.create)(entry)?;
        debug!("[AttributeStore] created '{name}' for entry {entry}");
        if let Some(save) = &attribute.save {
            save(entry, &value)?;
        }
        Ok(value)
    }

    /// Insert a value directly, bypassing the callbacks
    pub fn insert(&mut self, entry: usize, name: &str, value: V) -> Result<()> {
        if !self.is_registered(name) {
            return Err(RaysError::Store(format!("no attribute named '{name}'")));
        }
        self.cache.insert((entry, name.to_string()), value);
        Ok(())
    }

    /// Drop a cached value so the next `get` materializes it again, returning the dropped value
    pub fn invalidate(&mut self, entry: usize, name: &str) -> Option<V> {
        self.cache.remove(&(entry, name.to_string()))
    }

    /// Drop every cached value
    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Grid, Reconstruction, grid_to_points};
    use crate::test_utils::small_sensor;
    use crate::{Allowance, Point3, PointCloud, points_to_grid};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[test]
    fn creates_once_and_caches() {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let mut store = AttributeStore::new();
        store.register(
            "square",
            Attribute::new(move |id| {
                counter.set(counter.get() + 1);
                Ok(id * id)
            }),
        );

        assert_eq!(*store.get(4, "square").unwrap(), 16);
        assert_eq!(*store.get(4, "square").unwrap(), 16);
        assert_eq!(*store.get(5, "square").unwrap(), 25);
        assert_eq!(calls.get(), 2);

        store.invalidate(4, "square");
        assert!(!store.is_cached(4, "square"));
        store.get(4, "square").unwrap();
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn load_takes_precedence_and_save_follows_create() {
        let saved = Rc::new(RefCell::new(HashMap::<usize, usize>::new()));
        let for_load = saved.clone();
        let for_save = saved.clone();

        let mut store = AttributeStore::new();
        store.register(
            "value",
            Attribute::new(|id| Ok(id + 100))
                .with_load(move |id| Ok(for_load.borrow().get(&id).copied()))
                .with_save(move |id, v| {
                    for_save.borrow_mut().insert(id, *v);
                    Ok(())
                }),
        );

        saved.borrow_mut().insert(1, 7);
        assert_eq!(*store.get(1, "value").unwrap(), 7);
        assert_eq!(*store.get(2, "value").unwrap(), 102);
        assert_eq!(saved.borrow().get(&2), Some(&102));
    }

    #[test]
    fn failures_leave_store_unchanged() {
        let mut store: AttributeStore<f64> = AttributeStore::new();
        store.register(
            "broken",
            Attribute::new(|_| Err(RaysError::Store("frame missing".into()))),
        );
        assert!(store.get(0, "broken").is_err());
        assert!(!store.is_cached(0, "broken"));
        assert!(matches!(store.get(0, "other"), Err(RaysError::Store(_))));
        assert!(store.insert(0, "other", 1.0).is_err());
    }

    #[test]
    fn reregistering_drops_cached_values() {
        let mut store = AttributeStore::new();
        store.register("v", Attribute::new(|_| Ok(1)));
        store.get(0, "v").unwrap();
        store.register("v", Attribute::new(|_| Ok(2)));
        assert_eq!(*store.get(0, "v").unwrap(), 2);
    }

    #[test]
    fn caches_grids_for_frames() {
        let params = Rc::new(small_sensor());
        let grid_params = params.clone();
        let mut grids: AttributeStore<Grid> = AttributeStore::new();
        grids.register(
            "small_grid",
            Attribute::new(move |id| {
                let mut cloud = PointCloud::empty(1);
                let p = Point3::from(grid_params.cell_direction(id % 8, id) * 5.0);
                cloud.push(p, &[id as f64])?;
                points_to_grid(&cloud, &grid_params, Allowance::Unbounded, None)
            }),
        );

        let grid = grids.get(3, "small_grid").unwrap();
        assert!(grid.is_valid(3, 3));
        let cloud = grid_to_points(grid, &params, None, Reconstruction::BeamDirection).unwrap();
        assert_eq!(cloud.features_of(0), &[3.0]);
    }
}
