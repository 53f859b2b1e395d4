use crate::core::EntityId;
use crate::prefabs::Prefab;
use crate::scene::SceneWorld;
use nalgebra::Vector3;

/// Spawns a prefab on a regular 3D grid, the usual way to fill a stress test.
pub struct PropGrid<P: Prefab> {
    pub prefab: P,
    pub origin: Vector3<f32>,
    pub spacing: f32,
    /// Cells along x, y and z.
    pub cells: [usize; 3],
}

impl<P: Prefab> PropGrid<P> {
    pub fn new(prefab: P, cells: [usize; 3]) -> Self {
        PropGrid {
            prefab,
            origin: Vector3::new(0.0, 1.0, 0.0),
            spacing: 2.0,
            cells,
        }
    }

    pub fn len(&self) -> usize {
        self.cells.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cell positions, centered on the origin in x and z and stacked upwards.
    pub fn positions(&self) -> impl Iterator<Item = Vector3<f32>> + '_ {
        let [nx, ny, nz] = self.cells;
        let half_x = (nx.saturating_sub(1)) as f32 * 0.5;
        let half_z = (nz.saturating_sub(1)) as f32 * 0.5;

        (0..ny).flat_map(move |y| {
            (0..nz).flat_map(move |z| {
                (0..nx).map(move |x| {
                    self.origin
                        + Vector3::new(
                            (x as f32 - half_x) * self.spacing,
                            y as f32 * self.spacing,
                            (z as f32 - half_z) * self.spacing,
                        )
                })
            })
        })
    }

    pub fn spawn_all(&self, world: &mut SceneWorld) -> Vec<EntityId> {
        let positions: Vec<_> = self.positions().collect();
        positions
            .into_iter()
            .map(|position| self.prefab.spawn(world, position))
            .collect()
    }
}
