use crate::assets::{AssetId, AssetLoadError, AssetLoader, VisualMesh};
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{error, trace};

/// Read-through cache of visual meshes keyed by [`AssetId`].
///
/// [`ModelStore::get`] always returns a mesh. When the loader fails, the error
/// is logged once and the fallback cube is cached in place of the asset, so a
/// broken file costs one load attempt, not one per frame.
pub struct ModelStore {
    loader: Box<dyn AssetLoader>,
    models: DashMap<AssetId, Arc<VisualMesh>>,
    loads: AtomicUsize,
}

impl ModelStore {
    pub fn new(loader: Box<dyn AssetLoader>) -> Self {
        ModelStore {
            loader,
            models: DashMap::new(),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn get(&self, asset: AssetId) -> Arc<VisualMesh> {
        self.models
            .entry(asset)
            .or_insert_with(|| match self.load(asset) {
                Ok(mesh) => Arc::new(mesh),
                Err(e) => {
                    error!("[Model Store] {e}. Using fallback for {asset}");
                    Arc::new(VisualMesh::fallback())
                }
            })
            .clone()
    }

    /// Loads through the store without hiding failures. Failures aren't cached.
    pub fn try_get(&self, asset: AssetId) -> Result<Arc<VisualMesh>, AssetLoadError> {
        if let Some(mesh) = self.models.get(&asset) {
            return Ok(mesh.clone());
        }

        let mesh = Arc::new(self.load(asset)?);
        Ok(self.models.entry(asset).or_insert(mesh).clone())
    }

    fn load(&self, asset: AssetId) -> Result<VisualMesh, AssetLoadError> {
        self.loads.fetch_add(1, Ordering::Relaxed);
        trace!("[Model Store] Loading {asset}");
        self.loader.load(asset)
    }

    pub fn unload(&self, asset: AssetId) -> Option<Arc<VisualMesh>> {
        let removed = self.models.remove(&asset).map(|(_, mesh)| mesh);
        if removed.is_some() {
            trace!("[Model Store] Unloaded {asset}");
        }
        removed
    }

    pub fn is_loaded(&self, asset: AssetId) -> bool {
        self.models.contains_key(&asset)
    }

    /// How many times the loader has been invoked.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }

}
