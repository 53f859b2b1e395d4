use crate::assets::{AssetId, VisualMesh};
use nalgebra::Matrix4;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::trace;

/// Where batched instances end up. One call draws one sub-mesh of `mesh` once
/// per matrix in `instances`.
pub trait InstanceDrawer {
    fn draw_instanced(
        &mut self,
        asset: AssetId,
        mesh: &Arc<VisualMesh>,
        sub_mesh: usize,
        instances: &[Matrix4<f32>],
    );
}

#[derive(Debug, Clone)]
pub struct InstanceBatch {
    pub mesh: Arc<VisualMesh>,
    pub instances: Vec<Matrix4<f32>>,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct FlushStats {
    pub draw_calls: usize,
    pub instances: usize,
}

/// Collects world matrices per asset over a frame and hands each asset's list
/// to the drawer in one go.
///
/// Batches outlive the frame. Flushing only empties the instance lists, so the
/// steady state allocates nothing.
#[derive(Debug, Default)]
pub struct InstanceBatcher {
    batches: BTreeMap<AssetId, InstanceBatch>,
}

impl InstanceBatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit(&mut self, asset: AssetId, mesh: &Arc<VisualMesh>, matrix: Matrix4<f32>) {
        let batch = self
            .batches
            .entry(asset)
            .or_insert_with(|| InstanceBatch {
                mesh: mesh.clone(),
                instances: Vec::new(),
            });

        if !Arc::ptr_eq(&batch.mesh, mesh) {
            batch.mesh = mesh.clone();
        }
        batch.instances.push(matrix);
    }

    pub fn flush(&mut self, drawer: &mut dyn InstanceDrawer) -> FlushStats {
        let mut stats = FlushStats::default();

        for (asset, batch) in self.batches.iter_mut() {
            if batch.instances.is_empty() {
                continue;
            }

            for sub_mesh in 0..batch.mesh.sub_meshes.len() {
                drawer.draw_instanced(*asset, &batch.mesh, sub_mesh, &batch.instances);
                stats.draw_calls += 1;
            }

            stats.instances += batch.instances.len();
            batch.instances.clear();
        }

        if stats.draw_calls > 0 {
            trace!(
                "Flushed {} instances in {} draw calls",
                stats.instances, stats.draw_calls
            );
        }

        stats
    }

    /// Throws away this frame's instances without drawing them.
    pub fn clear(&mut self) {
        self.batches
            .values_mut()
            .for_each(|batch| batch.instances.clear());
    }

    pub fn pending(&self, asset: AssetId) -> usize {
        self.batches.get(&asset).map_or(0, |b| b.instances.len())
    }

    pub fn total_pending(&self) -> usize {
        self.batches.values().map(|b| b.instances.len()).sum()
    }

    /// Assets that were submitted at least once.
    pub fn tracked_assets(&self) -> impl Iterator<Item = AssetId> + '_ {
        self.batches.keys().copied()
    }
}
