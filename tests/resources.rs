mod common;

use common::{MockLoader, context};
use rayforce::assets::{AssetId, MaterialId, ModelStore};
use rayforce::nalgebra::Vector3;
use rayforce::physics::{ResourceCache, ResourceError};
use std::sync::Arc;

fn store() -> (ModelStore, Arc<std::sync::Mutex<std::collections::HashMap<AssetId, usize>>>) {
    common::init_tracing();
    let (loader, loads) = MockLoader::new();
    (ModelStore::new(Box::new(loader)), loads)
}

fn loads_of(
    loads: &std::sync::Mutex<std::collections::HashMap<AssetId, usize>>,
    asset: AssetId,
) -> usize {
    loads
        .lock()
        .map(|l| l.get(&asset).copied().unwrap_or(0))
        .unwrap_or(0)
}

#[test]
fn geometry_is_cooked_once() {
    let (models, loads) = store();
    let cache = ResourceCache::new(0.001);

    let first = cache.geometry(AssetId::Cube, &models).unwrap();
    for _ in 0..10 {
        let again = cache.geometry(AssetId::Cube, &models).unwrap();
        assert!(Arc::ptr_eq(&first, &again));
    }

    assert_eq!(cache.stats().geometries_cooked, 1);
    assert_eq!(loads_of(&loads, AssetId::Cube), 1);
    // 24 cube vertices weld down to the 8 corners
    assert_eq!(first.vertex_count(), 8);
}

#[test]
fn degenerate_geometry_fails_once() {
    let (models, _) = store();
    let cache = ResourceCache::new(0.001);

    for _ in 0..3 {
        let result = cache.geometry(AssetId::DamagedHelmet, &models);
        assert_eq!(
            result.err(),
            Some(ResourceError::Degenerate {
                asset: AssetId::DamagedHelmet,
                points: 3
            })
        );
    }

    let stats = cache.stats();
    assert_eq!(stats.cook_failures, 1);
    assert_eq!(stats.geometries_cooked, 0);
}

#[test]
fn materials_are_built_once() {
    let cache = ResourceCache::new(0.001);

    let a = cache.material(MaterialId::Rubber);
    let b = cache.material(MaterialId::Rubber);
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a.restitution, 0.8);
    assert_eq!(a.static_friction, 1.0);
    assert_eq!(cache.stats().materials_built, 1);
}

#[test]
fn shapes_are_keyed_by_geometry_and_material() {
    let (models, _) = store();
    let cache = ResourceCache::new(0.001);

    let geometry = cache.geometry(AssetId::Cube, &models).unwrap();
    let basic = cache.material(MaterialId::Basic);
    let ice = cache.material(MaterialId::Ice);

    let with_basic = cache.shape(Some(&geometry), Some(&basic)).unwrap();
    let with_ice = cache.shape(Some(&geometry), Some(&ice)).unwrap();
    let basic_again = cache.shape(Some(&geometry), Some(&basic)).unwrap();

    assert!(!Arc::ptr_eq(&with_basic, &with_ice));
    assert!(Arc::ptr_eq(&with_basic, &basic_again));
    assert_eq!(with_ice.material.id, MaterialId::Ice);
    assert_eq!(cache.stats().shapes_built, 2);
}

#[test]
fn missing_shape_inputs_yield_nothing() {
    let (models, _) = store();
    let cache = ResourceCache::new(0.001);
    let geometry = cache.geometry(AssetId::Sphere, &models).unwrap();
    let material = cache.material(MaterialId::Rubber);

    assert!(cache.shape(None, Some(&material)).is_none());
    assert!(cache.shape(Some(&geometry), None).is_none());
    assert!(cache.shape(None, None).is_none());
    assert_eq!(cache.stats().shapes_built, 0);
}

#[test]
fn unloading_geometry_evicts_its_shapes() {
    let (models, _) = store();
    let cache = ResourceCache::new(0.001);

    let geometry = cache.geometry(AssetId::Cube, &models).unwrap();
    let material = cache.material(MaterialId::Basic);
    cache.shape(Some(&geometry), Some(&material)).unwrap();
    assert_eq!(cache.stats().shapes, 1);

    assert!(cache.unload_geometry(AssetId::Cube));
    let stats = cache.stats();
    assert_eq!(stats.shapes, 0);
    assert_eq!(stats.geometries, 0);
    assert!(!cache.unload_geometry(AssetId::Cube));

    let recooked = cache.geometry(AssetId::Cube, &models).unwrap();
    assert!(!Arc::ptr_eq(&geometry, &recooked));
    assert_eq!(cache.stats().geometries_cooked, 2);
}

#[test]
fn unload_material_and_shape() {
    let (models, _) = store();
    let cache = ResourceCache::new(0.001);

    let geometry = cache.geometry(AssetId::Cube, &models).unwrap();
    let metal = cache.material(MaterialId::Metal);
    cache.shape(Some(&geometry), Some(&metal)).unwrap();

    assert!(cache.unload_shape(AssetId::Cube, MaterialId::Metal));
    assert!(!cache.unload_shape(AssetId::Cube, MaterialId::Metal));

    cache.shape(Some(&geometry), Some(&metal)).unwrap();
    assert!(cache.unload_material(MaterialId::Metal));
    assert_eq!(cache.stats().shapes, 0);

    cache.clear();
    let stats = cache.stats();
    assert_eq!((stats.materials, stats.geometries, stats.shapes), (0, 0, 0));
}

#[test]
fn concurrent_requests_cook_once() {
    let ctx = context();

    std::thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| {
                for asset in AssetId::ALL {
                    let _ = ctx.resources.geometry(asset, &ctx.models);
                }
                ctx.resources.material(MaterialId::Basic);
            });
        }
    });

    let stats = ctx.resources.stats();
    assert_eq!(stats.geometries_cooked, 2);
    assert_eq!(stats.cook_failures, 1);
    assert_eq!(stats.materials_built, 1);
    assert_eq!(ctx.models.load_count(), 3);
}

#[test]
fn scaled_shapes_bake_the_scale_into_the_hull() {
    let (models, _) = store();
    let cache = ResourceCache::new(0.001);

    let geometry = cache.geometry(AssetId::Cube, &models).unwrap();
    let basic = cache.material(MaterialId::Basic);

    let unit = cache.shape(Some(&geometry), Some(&basic)).unwrap();
    let doubled = cache
        .scaled_shape(Some(&geometry), Some(&basic), Vector3::repeat(2.0))
        .unwrap();
    let doubled_again = cache
        .scaled_shape(Some(&geometry), Some(&basic), Vector3::repeat(2.0))
        .unwrap();

    assert!(!Arc::ptr_eq(&unit, &doubled));
    assert!(Arc::ptr_eq(&doubled, &doubled_again));
    assert_eq!(cache.stats().shapes_built, 2);

    let unit_top = unit.shape.compute_local_aabb().maxs.y;
    let doubled_top = doubled.shape.compute_local_aabb().maxs.y;
    assert!((unit_top - 0.5).abs() < 1e-4, "unit cube top at {unit_top}");
    assert!((doubled_top - 1.0).abs() < 1e-4, "doubled cube top at {doubled_top}");

    // every scale of the pair goes at once
    assert!(cache.unload_shape(AssetId::Cube, MaterialId::Basic));
    assert_eq!(cache.stats().shapes, 0);
}

#[test]
fn unusable_scales_fall_back_to_unit_scale() {
    let (models, _) = store();
    let cache = ResourceCache::new(0.001);

    let geometry = cache.geometry(AssetId::Cube, &models).unwrap();
    let basic = cache.material(MaterialId::Basic);
    let unit = cache.shape(Some(&geometry), Some(&basic)).unwrap();

    for scale in [
        Vector3::new(0.0, 1.0, 1.0),
        Vector3::new(-2.0, 2.0, 2.0),
        Vector3::new(f32::NAN, 1.0, 1.0),
    ] {
        let shape = cache
            .scaled_shape(Some(&geometry), Some(&basic), scale)
            .unwrap();
        assert!(Arc::ptr_eq(&unit, &shape));
    }
    assert_eq!(cache.stats().shapes_built, 1);
}
