//! Deduplicating stores for physics resources.
//!
//! Materials, cooked collision geometry and collision shapes are expensive to
//! build and identical for every object using the same asset, so each is built
//! at most once per key and shared behind an [`Arc`]. All maps are [`DashMap`]s
//! and every miss goes through the entry API, which keeps check-then-insert
//! atomic per key even when several threads ask at once.

use crate::assets::{AssetId, MaterialId, ModelStore};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use nalgebra::{Point3, Vector3};
use rapier3d::prelude::*;
use snafu::Snafu;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{trace, warn};

/// A convex hull needs at least a tetrahedron.
const MIN_HULL_POINTS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(context(suffix(Err)))]
pub enum ResourceError {
    #[snafu(display(
        "Mesh of {asset} has only {points} distinct points, which can't form a collision hull"
    ))]
    Degenerate { asset: AssetId, points: usize },

    #[snafu(display("Convex hull computation rejected the mesh of {asset}"))]
    HullRejected { asset: AssetId },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhysicsMaterial {
    pub id: MaterialId,
    pub friction: f32,
    /// Kept for consumers. The solver only has one friction coefficient.
    pub static_friction: f32,
    pub restitution: f32,
}

impl PhysicsMaterial {
    pub fn new(id: MaterialId) -> Self {
        let props = id.properties();
        PhysicsMaterial {
            id,
            friction: props.friction,
            static_friction: props.static_friction,
            restitution: props.restitution,
        }
    }
}

/// Cooked collision representation of one asset.
pub struct CollisionGeometry {
    pub asset: AssetId,
    pub shape: SharedShape,
    /// Welded hull input, kept to rebuild the hull at other scales.
    pub points: Vec<Point3<f32>>,
}

impl CollisionGeometry {
    /// Vertices that went into the hull after welding.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.points.len()
    }
}

impl Debug for CollisionGeometry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollisionGeometry")
            .field("asset", &self.asset)
            .field("vertex_count", &self.vertex_count())
            .finish_non_exhaustive()
    }
}

/// A geometry at one scale paired with the material its surface is made of.
#[derive(Clone)]
pub struct CollisionShape {
    pub geometry: Arc<CollisionGeometry>,
    pub material: Arc<PhysicsMaterial>,
    pub scale: Vector3<f32>,
    /// The geometry's hull with `scale` baked in.
    pub shape: SharedShape,
}

impl Debug for CollisionShape {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollisionShape")
            .field("geometry", &self.geometry)
            .field("material", &self.material.id)
            .field("scale", &self.scale)
            .finish_non_exhaustive()
    }
}

impl CollisionShape {
    /// Builds a collider for this shape. Inertia follows from the shape and `mass`.
    pub fn collider(&self, mass: f32, rest_offset: f32) -> Collider {
        ColliderBuilder::new(self.shape.clone())
            .friction(self.material.friction)
            .restitution(self.material.restitution)
            .mass(mass)
            .contact_skin(rest_offset)
            .build()
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub materials_built: usize,
    pub geometries_cooked: usize,
    pub cook_failures: usize,
    pub shapes_built: usize,
    pub materials: usize,
    pub geometries: usize,
    pub shapes: usize,
}

#[derive(Default)]
struct Counters {
    materials_built: AtomicUsize,
    geometries_cooked: AtomicUsize,
    cook_failures: AtomicUsize,
    shapes_built: AtomicUsize,
}

type CookResult = Result<Arc<CollisionGeometry>, ResourceError>;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct ShapeKey {
    asset: AssetId,
    material: MaterialId,
    scale: [u32; 3],
}

impl ShapeKey {
    fn new(asset: AssetId, material: MaterialId, scale: &Vector3<f32>) -> Self {
        ShapeKey {
            asset,
            material,
            scale: [scale.x.to_bits(), scale.y.to_bits(), scale.z.to_bits()],
        }
    }
}

pub struct ResourceCache {
    weld_tolerance: f32,
    materials: DashMap<MaterialId, Arc<PhysicsMaterial>>,
    // failures are cached as well so a broken asset is cooked only once
    geometries: DashMap<AssetId, CookResult>,
    shapes: DashMap<ShapeKey, Arc<CollisionShape>>,
    counters: Counters,
}

impl ResourceCache {
    pub fn new(weld_tolerance: f32) -> Self {
        ResourceCache {
            weld_tolerance,
            materials: DashMap::new(),
            geometries: DashMap::new(),
            shapes: DashMap::new(),
            counters: Counters::default(),
        }
    }

    pub fn material(&self, id: MaterialId) -> Arc<PhysicsMaterial> {
        self.materials
            .entry(id)
            .or_insert_with(|| {
                self.counters.materials_built.fetch_add(1, Ordering::Relaxed);
                trace!("[Resource Cache] Built material {id}");
                Arc::new(PhysicsMaterial::new(id))
            })
            .clone()
    }

    /// Returns the cooked geometry of `asset`, cooking it on first request.
    pub fn geometry(&self, asset: AssetId, models: &ModelStore) -> CookResult {
        self.geometries
            .entry(asset)
            .or_insert_with(|| {
                let cooked = self.cook(asset, models);
                match &cooked {
                    Ok(_) => self.counters.geometries_cooked.fetch_add(1, Ordering::Relaxed),
                    Err(e) => {
                        warn!("[Resource Cache] {e}. {asset} has no physical footprint");
                        self.counters.cook_failures.fetch_add(1, Ordering::Relaxed)
                    }
                };
                cooked
            })
            .clone()
    }

    fn cook(&self, asset: AssetId, models: &ModelStore) -> CookResult {
        let mesh = models.get(asset);
        let points = weld_points(
            mesh.point_cloud()
                .into_iter()
                .filter(|p| p.coords.iter().all(|c| c.is_finite())),
            self.weld_tolerance,
        );

        if points.len() < MIN_HULL_POINTS {
            return DegenerateErr {
                asset,
                points: points.len(),
            }
            .fail();
        }

        let Some(shape) = SharedShape::convex_hull(&points) else {
            return HullRejectedErr { asset }.fail();
        };

        trace!(
            "[Resource Cache] Cooked {asset} from {} welded points",
            points.len()
        );

        Ok(Arc::new(CollisionGeometry {
            asset,
            shape,
            points,
        }))
    }

    /// Pairs a geometry with a material at unit scale. Both are required; a
    /// missing one is a caller error and yields `None`.
    pub fn shape(
        &self,
        geometry: Option<&Arc<CollisionGeometry>>,
        material: Option<&Arc<PhysicsMaterial>>,
    ) -> Option<Arc<CollisionShape>> {
        self.scaled_shape(geometry, material, Vector3::repeat(1.0))
    }

    /// Like [`shape`](Self::shape), with the hull scaled per axis by `scale`.
    ///
    /// Each distinct scale is built once. Non-finite or non-positive scales
    /// fall back to unit scale.
    pub fn scaled_shape(
        &self,
        geometry: Option<&Arc<CollisionGeometry>>,
        material: Option<&Arc<PhysicsMaterial>>,
        scale: Vector3<f32>,
    ) -> Option<Arc<CollisionShape>> {
        let (Some(geometry), Some(material)) = (geometry, material) else {
            warn!(
                "[Resource Cache] Shape requested without {}",
                if geometry.is_none() { "geometry" } else { "material" }
            );
            return None;
        };

        let scale = if scale.iter().all(|c| c.is_finite() && *c > 0.0) {
            scale
        } else {
            warn!(
                "[Resource Cache] Scale {scale:?} of {} is unusable, using unit scale",
                geometry.asset
            );
            Vector3::repeat(1.0)
        };

        let key = ShapeKey::new(geometry.asset, material.id, &scale);
        let shape = match self.shapes.entry(key) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let hull = scaled_hull(geometry, &scale)?;
                self.counters.shapes_built.fetch_add(1, Ordering::Relaxed);
                trace!(
                    "[Resource Cache] Built shape {} / {} at scale {scale:?}",
                    geometry.asset, material.id
                );
                let shape = Arc::new(CollisionShape {
                    geometry: geometry.clone(),
                    material: material.clone(),
                    scale,
                    shape: hull,
                });
                entry.insert(shape.clone());
                shape
            }
        };

        Some(shape)
    }

    pub fn unload_material(&self, id: MaterialId) -> bool {
        self.shapes.retain(|key, _| key.material != id);
        self.materials.remove(&id).is_some()
    }

    /// Evicts the geometry of `asset` along with every shape built on it.
    pub fn unload_geometry(&self, asset: AssetId) -> bool {
        self.shapes.retain(|key, _| key.asset != asset);
        self.geometries.remove(&asset).is_some()
    }

    /// Evicts the shapes of `asset` and `material` at every scale.
    pub fn unload_shape(&self, asset: AssetId, material: MaterialId) -> bool {
        let mut removed = false;
        self.shapes.retain(|key, _| {
            let hit = key.asset == asset && key.material == material;
            removed |= hit;
            !hit
        });
        removed
    }

    pub fn clear(&self) {
        self.shapes.clear();
        self.geometries.clear();
        self.materials.clear();
        trace!("[Resource Cache] Cleared");
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            materials_built: self.counters.materials_built.load(Ordering::Relaxed),
            geometries_cooked: self.counters.geometries_cooked.load(Ordering::Relaxed),
            cook_failures: self.counters.cook_failures.load(Ordering::Relaxed),
            shapes_built: self.counters.shapes_built.load(Ordering::Relaxed),
            materials: self.materials.len(),
            geometries: self.geometries.len(),
            shapes: self.shapes.len(),
        }
    }
}

fn scaled_hull(geometry: &CollisionGeometry, scale: &Vector3<f32>) -> Option<SharedShape> {
    if *scale == Vector3::repeat(1.0) {
        return Some(geometry.shape.clone());
    }

    let points: Vec<Point3<f32>> = geometry
        .points
        .iter()
        .map(|p| Point3::from(p.coords.component_mul(scale)))
        .collect();

    let hull = SharedShape::convex_hull(&points);
    if hull.is_none() {
        warn!(
            "[Resource Cache] Hull of {} can't be rebuilt at scale {scale:?}",
            geometry.asset
        );
    }
    hull
}

/// Merges points closer than `tolerance` to a point already kept.
fn weld_points(points: impl IntoIterator<Item = Point3<f32>>, tolerance: f32) -> Vec<Point3<f32>> {
    let tolerance = tolerance.max(f32::EPSILON);
    let cell_of = |p: &Point3<f32>| p.coords.map(|c| (c / tolerance).floor() as i64);

    let mut kept: Vec<Point3<f32>> = Vec::new();
    let mut grid: HashMap<[i64; 3], Vec<usize>> = HashMap::new();

    for point in points {
        let cell = cell_of(&point);
        let near = (-1..=1).any(|dx| {
            (-1..=1).any(|dy| {
                (-1..=1).any(|dz| {
                    grid.get(&[cell.x + dx, cell.y + dy, cell.z + dz])
                        .is_some_and(|bucket| {
                            bucket
                                .iter()
                                .any(|&i| nalgebra::distance(&kept[i], &point) < tolerance)
                        })
                })
            })
        });

        if !near {
            grid.entry([cell.x, cell.y, cell.z]).or_default().push(kept.len());
            kept.push(point);
        }
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn welding_merges_close_points() {
        let points = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0005, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];

        let welded = weld_points(points, 0.001);
        assert_eq!(welded.len(), 3);
    }

    #[test]
    fn welding_keeps_points_across_cell_borders_apart() {
        let points = [Point3::new(0.0, 0.0, 0.0), Point3::new(0.0015, 0.0, 0.0)];
        assert_eq!(weld_points(points, 0.001).len(), 2);
    }

    #[test]
    fn material_table_is_applied() {
        let material = PhysicsMaterial::new(MaterialId::Metal);
        assert_eq!(material.friction, 0.4);
        assert_eq!(material.static_friction, 0.6);
        assert_eq!(material.restitution, 0.2);
    }
}
